//! Error type shared by the pipe, format, settings and output layers.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Error type for opening the pipe and bringing up playback.
#[derive(Debug)]
pub enum FifoPlayError {
    OpenPipe {
        path: PathBuf,
        source: std::io::Error,
    },
    NotAPipe(PathBuf),
    InvalidFormat(String),
    InvalidSettings(String),
    OutputStream(String),
    Io(std::io::Error),
}

impl Display for FifoPlayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenPipe { path, source } => {
                write!(f, "failed to open fifo {}: {}", path.display(), source)
            }
            Self::NotAPipe(path) => write!(f, "{} is not a named pipe", path.display()),
            Self::InvalidFormat(err) => write!(f, "invalid pcm format: {}", err),
            Self::InvalidSettings(err) => write!(f, "invalid settings: {}", err),
            Self::OutputStream(err) => write!(f, "failed to create audio output: {}", err),
            Self::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for FifoPlayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OpenPipe { source, .. } => Some(source),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FifoPlayError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Convenience alias used across the library.
pub type Result<T> = std::result::Result<T, FifoPlayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pipe_names_the_path() {
        let err = FifoPlayError::NotAPipe(PathBuf::from("/tmp/plain.raw"));
        assert_eq!(err.to_string(), "/tmp/plain.raw is not a named pipe");
    }

    #[test]
    fn open_pipe_exposes_io_source() {
        let err = FifoPlayError::OpenPipe {
            path: PathBuf::from("/missing"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("failed to open fifo /missing"));
    }
}
