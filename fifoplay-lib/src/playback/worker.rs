//! Reader worker: blocking pipe reads, kept off the output thread.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::pipe::PipeReader;

use super::ring::{BufferFiller, FillOutcome};
use super::source::PlaybackStats;

pub(crate) const FREE_BUFFER_WAIT: Duration = Duration::from_millis(50);

/// Everything the worker thread owns for its lifetime.
pub(crate) struct WorkerContext<R: Read> {
    pub reader: PipeReader<R>,
    pub filler: BufferFiller,
    pub abort: Arc<AtomicBool>,
    pub stats: Arc<PlaybackStats>,
    pub idle_backoff: Duration,
}

/// Spawn the reader worker.
pub(crate) fn spawn_reader<R>(ctx: WorkerContext<R>) -> std::io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("fifoplay-reader".into())
        .spawn(move || run_reader(ctx))
}

/// Fill buffers until aborted or until the output side goes away.
pub(crate) fn run_reader<R: Read>(mut ctx: WorkerContext<R>) {
    debug!("reader started on {}", ctx.reader.path().display());
    let mut idle_streak = 0_u64;
    let mut error_streak = 0_u64;

    while !ctx.abort.load(Ordering::Relaxed) {
        match ctx.filler.fill_next(&mut ctx.reader, FREE_BUFFER_WAIT) {
            FillOutcome::Queued(n) => {
                ctx.stats.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
                if idle_streak > 0 || error_streak > 0 {
                    debug!("pipe resumed after {} idle read(s)", idle_streak + error_streak);
                }
                idle_streak = 0;
                error_streak = 0;
            }
            FillOutcome::Idle => {
                ctx.stats.idle_reads.fetch_add(1, Ordering::Relaxed);
                if idle_streak == 0 {
                    debug!("pipe has no data, waiting for writer");
                }
                idle_streak += 1;
                thread::sleep(ctx.idle_backoff);
            }
            FillOutcome::Failed(err) => {
                ctx.stats.read_errors.fetch_add(1, Ordering::Relaxed);
                if error_streak == 0 {
                    warn!("read from {} failed: {}", ctx.reader.path().display(), err);
                }
                error_streak += 1;
                thread::sleep(ctx.idle_backoff);
            }
            FillOutcome::NoFreeBuffer => {}
            FillOutcome::Closed => {
                info!("output closed, stopping reader");
                break;
            }
        }
    }

    debug!("reader finished");
}
