//! Fixed set of PCM buffers cycled between the pipe reader and the output.
//!
//! Buffers move over two channels: `free` (drained by the filler) and
//! `filled` (drained by the output). Only the buffers created by
//! [`buffer_ring`] ever circulate, so memory use is fixed. Both channels are
//! bounded to the ring size, which preallocates their slots: returning a
//! buffer from the output thread never allocates and never blocks.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use crate::pipe::{PipeReader, ReadOutcome};

/// One fixed-capacity chunk of raw PCM bytes.
#[derive(Debug)]
pub struct PcmBuffer {
    data: Vec<u8>,
    len: usize,
}

impl PcmBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid bytes only.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    fn clear(&mut self) {
        self.len = 0;
    }
}

/// Outcome of one fill attempt.
#[derive(Debug)]
pub enum FillOutcome {
    /// A buffer with this many bytes was queued for playback.
    Queued(usize),
    /// The read produced nothing; the buffer went back to the free list.
    Idle,
    /// The read failed; the buffer went back to the free list.
    Failed(std::io::Error),
    /// No free buffer became available in time.
    NoFreeBuffer,
    /// The output side is gone.
    Closed,
}

/// Outcome of polling the drain for the next filled buffer.
#[derive(Debug)]
pub enum DrainPoll {
    Ready(PcmBuffer),
    /// Nothing queued right now.
    Empty,
    /// The filler is gone and everything it queued has been handed out.
    Closed,
}

/// Producer half: takes free buffers, fills them from the pipe, queues them.
#[derive(Debug)]
pub struct BufferFiller {
    free: Receiver<PcmBuffer>,
    free_return: SyncSender<PcmBuffer>,
    filled: SyncSender<PcmBuffer>,
    drain_closed: Arc<AtomicBool>,
}

/// Consumer half: hands out filled buffers and takes them back when played.
#[derive(Debug)]
pub struct BufferDrain {
    filled: Receiver<PcmBuffer>,
    free: SyncSender<PcmBuffer>,
    closed: Arc<AtomicBool>,
}

/// Allocate `count` buffers of `capacity` bytes, all initially free.
pub fn buffer_ring(count: usize, capacity: usize) -> (BufferFiller, BufferDrain) {
    let slots = count.max(1);
    let (free_tx, free_rx) = mpsc::sync_channel(slots);
    let (filled_tx, filled_rx) = mpsc::sync_channel(slots);
    let drain_closed = Arc::new(AtomicBool::new(false));
    for _ in 0..count {
        // The receiver is alive and a slot is free for every buffer.
        let _ = free_tx.try_send(PcmBuffer::with_capacity(capacity));
    }

    (
        BufferFiller {
            free: free_rx,
            free_return: free_tx.clone(),
            filled: filled_tx,
            drain_closed: drain_closed.clone(),
        },
        BufferDrain {
            filled: filled_rx,
            free: free_tx,
            closed: drain_closed,
        },
    )
}

impl BufferFiller {
    /// Wait up to `wait` for a free buffer, then make one read attempt into it.
    ///
    /// Empty or failed reads never queue the buffer, so the output side
    /// cannot see stale contents.
    pub fn fill_next<R: Read>(
        &mut self,
        reader: &mut PipeReader<R>,
        wait: Duration,
    ) -> FillOutcome {
        if self.drain_closed.load(Ordering::Acquire) {
            return FillOutcome::Closed;
        }
        let mut buffer = match self.free.recv_timeout(wait) {
            Ok(buffer) => buffer,
            Err(RecvTimeoutError::Timeout) => return FillOutcome::NoFreeBuffer,
            Err(RecvTimeoutError::Disconnected) => return FillOutcome::Closed,
        };

        buffer.clear();
        match reader.read_into(&mut buffer.data) {
            ReadOutcome::Data(n) => {
                buffer.len = n;
                match self.filled.send(buffer) {
                    Ok(()) => FillOutcome::Queued(n),
                    Err(_) => FillOutcome::Closed,
                }
            }
            ReadOutcome::Idle => self.recycle(buffer, FillOutcome::Idle),
            ReadOutcome::Failed(err) => self.recycle(buffer, FillOutcome::Failed(err)),
        }
    }

    fn recycle(&self, buffer: PcmBuffer, outcome: FillOutcome) -> FillOutcome {
        match self.free_return.send(buffer) {
            Ok(()) => outcome,
            Err(_) => FillOutcome::Closed,
        }
    }
}

impl BufferDrain {
    /// Next filled buffer, if one is ready. Never blocks.
    pub fn try_next(&self) -> DrainPoll {
        match self.filled.try_recv() {
            Ok(buffer) => DrainPoll::Ready(buffer),
            Err(TryRecvError::Empty) => DrainPoll::Empty,
            Err(TryRecvError::Disconnected) => DrainPoll::Closed,
        }
    }

    /// Hand a played buffer back to the filler.
    ///
    /// Uses `try_send` into a preallocated slot, so it is safe on the output
    /// thread. A full or closed free list only happens once the filler is
    /// gone, and the buffer is dropped then.
    pub fn release(&self, mut buffer: PcmBuffer) {
        buffer.clear();
        let _ = self.free.try_send(buffer);
    }
}

impl Drop for BufferDrain {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}
