//! Read side of the named pipe.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use crate::error::{FifoPlayError, Result};

/// Result of a single read attempt.
#[derive(Debug)]
pub enum ReadOutcome {
    /// `n > 0` bytes were written to the front of the buffer.
    Data(usize),
    /// The pipe had nothing to give (no writer connected, or writer closed).
    Idle,
    /// The read failed for a reason other than an interrupted syscall.
    Failed(std::io::Error),
}

/// Byte source feeding the buffer ring.
///
/// Normally wraps the opened FIFO, but any [`Read`] works, which is how the
/// ring is exercised without a real pipe.
#[derive(Debug)]
pub struct PipeReader<R: Read = File> {
    path: PathBuf,
    inner: R,
}

impl PipeReader<File> {
    /// Open an existing named pipe for reading.
    ///
    /// Blocks until a writer opens the other end, like any FIFO open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|source| FifoPlayError::OpenPipe {
            path: path.clone(),
            source,
        })?;
        if !metadata.file_type().is_fifo() {
            return Err(FifoPlayError::NotAPipe(path));
        }

        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|source| FifoPlayError::OpenPipe {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, inner: file })
    }
}

impl<R: Read> PipeReader<R> {
    pub fn from_reader(path: impl Into<PathBuf>, inner: R) -> Self {
        Self {
            path: path.into(),
            inner,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read once into `buf`, retrying only on `Interrupted`.
    pub fn read_into(&mut self, buf: &mut [u8]) -> ReadOutcome {
        loop {
            match self.inner.read(buf) {
                Ok(0) => return ReadOutcome::Idle,
                Ok(n) => return ReadOutcome::Data(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return ReadOutcome::Failed(err),
            }
        }
    }
}
