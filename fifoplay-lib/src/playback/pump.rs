//! Device-independent half of playback: the buffer ring, the reader thread
//! and the Ready → Playing → Stopped lifecycle.

use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, warn};

use crate::error::Result;
use crate::format::PcmFormat;
use crate::pipe::PipeReader;

use super::ring::{buffer_ring, BufferDrain, BufferFiller, FillOutcome};
use super::settings::PlaybackSettings;
use super::source::{PcmSource, PlaybackStats, StatsSnapshot};
use super::worker::{spawn_reader, WorkerContext, FREE_BUFFER_WAIT};

const READER_STOP_GRACE: Duration = Duration::from_millis(100);

/// Lifecycle of a [`Pump`] and of the player built on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Buffers allocated, nothing playing yet.
    Ready,
    Playing,
    Stopped,
}

/// What [`Pump::stop`] did with the reader thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The reader exited and was joined.
    Joined,
    /// The reader is blocked in `read` and was left to end with the process.
    Detached,
    /// Stopped before `start`; there was no reader thread.
    NeverStarted,
    AlreadyStopped,
}

/// Moves PCM from a pipe into the buffer ring and hands out the
/// [`PcmSource`] that drains it.
pub struct Pump<R: Read + Send + 'static = File> {
    format: PcmFormat,
    settings: PlaybackSettings,
    state: PlayerState,
    reader: Option<PipeReader<R>>,
    filler: Option<BufferFiller>,
    drain: Option<BufferDrain>,
    abort: Arc<AtomicBool>,
    stats: Arc<PlaybackStats>,
    reader_handle: Option<JoinHandle<()>>,
}

impl<R: Read + Send + 'static> Pump<R> {
    /// Validate `format` and `settings` and allocate the ring.
    pub fn new(
        reader: PipeReader<R>,
        format: PcmFormat,
        settings: PlaybackSettings,
    ) -> Result<Self> {
        format.validate()?;
        settings.validate(&format)?;

        let (filler, drain) = buffer_ring(settings.buffer_count, settings.chunk_bytes);
        debug!(
            "allocated {} buffer(s) of {} bytes",
            settings.buffer_count, settings.chunk_bytes
        );

        Ok(Self {
            format,
            settings,
            state: PlayerState::Ready,
            reader: Some(reader),
            filler: Some(filler),
            drain: Some(drain),
            abort: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(PlaybackStats::default()),
            reader_handle: None,
        })
    }

    /// One synchronous fill attempt per buffer. Only meaningful while Ready.
    pub fn prime(&mut self) -> usize {
        match (self.filler.as_mut(), self.reader.as_mut()) {
            (Some(filler), Some(reader)) => {
                let count = self.settings.buffer_count;
                let primed = prime_buffers(filler, reader, count, &self.stats);
                debug!("primed {}/{} buffer(s)", primed, count);
                primed
            }
            _ => 0,
        }
    }

    /// Spawn the reader thread and return the source for the output.
    ///
    /// Returns `None` when the pump is not Ready.
    pub fn start(&mut self) -> Result<Option<PcmSource>> {
        if self.state != PlayerState::Ready {
            return Ok(None);
        }
        let (reader, filler, drain) =
            match (self.reader.take(), self.filler.take(), self.drain.take()) {
                (Some(reader), Some(filler), Some(drain)) => (reader, filler, drain),
                _ => return Ok(None),
            };

        let handle = spawn_reader(WorkerContext {
            reader,
            filler,
            abort: self.abort.clone(),
            stats: self.stats.clone(),
            idle_backoff: self.settings.idle_backoff(),
        })?;
        self.reader_handle = Some(handle);
        self.state = PlayerState::Playing;

        Ok(Some(PcmSource::new(
            self.format,
            drain,
            self.abort.clone(),
            self.stats.clone(),
        )))
    }

    /// Abort the reader, release the buffers and wait briefly for the thread.
    ///
    /// A reader blocked inside `read` cannot be interrupted; it is detached.
    pub fn stop(&mut self) -> StopOutcome {
        if self.state == PlayerState::Stopped {
            return StopOutcome::AlreadyStopped;
        }
        self.state = PlayerState::Stopped;
        self.abort.store(true, Ordering::SeqCst);
        self.drain.take();
        self.filler.take();
        self.reader.take();

        let Some(handle) = self.reader_handle.take() else {
            return StopOutcome::NeverStarted;
        };
        let deadline = Instant::now() + self.stop_grace();
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if !handle.is_finished() {
            warn!("reader is blocked on the pipe, detaching it");
            self.reader_handle = Some(handle);
            return StopOutcome::Detached;
        }
        if handle.join().is_err() {
            error!("reader thread panicked");
        }
        StopOutcome::Joined
    }

    /// Longest time `stop` waits for a reader that is not blocked in `read`.
    fn stop_grace(&self) -> Duration {
        self.settings.idle_backoff() + FREE_BUFFER_WAIT + READER_STOP_GRACE
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// True when no reader thread is running.
    pub fn reader_finished(&self) -> bool {
        self.reader_handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }
}

impl<R: Read + Send + 'static> Drop for Pump<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One fill attempt per buffer, without waiting for free buffers.
///
/// Buffers whose attempt read nothing stay on the free list for the worker.
pub fn prime_buffers<R: Read>(
    filler: &mut BufferFiller,
    reader: &mut PipeReader<R>,
    count: usize,
    stats: &PlaybackStats,
) -> usize {
    let mut primed = 0;
    for _ in 0..count {
        match filler.fill_next(reader, Duration::ZERO) {
            FillOutcome::Queued(n) => {
                stats.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
                primed += 1;
            }
            FillOutcome::Idle => {
                stats.idle_reads.fetch_add(1, Ordering::Relaxed);
            }
            FillOutcome::Failed(err) => {
                stats.read_errors.fetch_add(1, Ordering::Relaxed);
                warn!("priming read from {} failed: {}", reader.path().display(), err);
            }
            FillOutcome::NoFreeBuffer | FillOutcome::Closed => break,
        }
    }
    primed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::ring::{DrainPoll, PcmBuffer};
    use std::io::{self, Cursor};
    use std::sync::mpsc::{self, Receiver};

    fn small_settings() -> PlaybackSettings {
        PlaybackSettings {
            chunk_bytes: 4,
            buffer_count: 3,
            idle_backoff_ms: 1,
            ..PlaybackSettings::default()
        }
    }

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
    }

    fn cursor_pump(bytes: Vec<u8>) -> Pump<Cursor<Vec<u8>>> {
        let reader = PipeReader::from_reader("mem", Cursor::new(bytes));
        Pump::new(reader, PcmFormat::s16_mono(), small_settings()).unwrap()
    }

    fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Blocks in `read` until the paired sender is dropped.
    struct BlockingReader(Receiver<()>);

    impl Read for BlockingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    fn expect_ready(drain: &BufferDrain) -> PcmBuffer {
        match drain.try_next() {
            DrainPoll::Ready(buffer) => buffer,
            other => panic!("expected a filled buffer, got {:?}", other),
        }
    }

    #[test]
    fn priming_fills_each_buffer_once() {
        let (mut filler, drain) = buffer_ring(3, 4);
        let stats = PlaybackStats::default();
        let bytes = (0_u8..32).collect::<Vec<_>>();
        let mut reader = PipeReader::from_reader("mem", Cursor::new(bytes));

        assert_eq!(prime_buffers(&mut filler, &mut reader, 3, &stats), 3);
        assert_eq!(stats.snapshot().bytes_read, 12);
        for expected in [[0_u8, 1, 2, 3], [4, 5, 6, 7], [8, 9, 10, 11]] {
            assert_eq!(expect_ready(&drain).bytes(), &expected);
        }
        assert!(matches!(drain.try_next(), DrainPoll::Empty));
    }

    #[test]
    fn priming_an_empty_pipe_queues_nothing() {
        let (mut filler, drain) = buffer_ring(3, 4);
        let stats = PlaybackStats::default();
        let mut reader = PipeReader::from_reader("mem", Cursor::new(Vec::<u8>::new()));

        assert_eq!(prime_buffers(&mut filler, &mut reader, 3, &stats), 0);
        assert_eq!(stats.snapshot().idle_reads, 3);
        assert!(matches!(drain.try_next(), DrainPoll::Empty));
    }

    #[test]
    fn priming_a_short_pipe_leaves_remaining_buffers_free() {
        let (mut filler, drain) = buffer_ring(3, 4);
        let stats = PlaybackStats::default();
        let mut reader = PipeReader::from_reader("mem", Cursor::new(vec![9_u8; 6]));

        assert_eq!(prime_buffers(&mut filler, &mut reader, 3, &stats), 2);
        assert_eq!(expect_ready(&drain).len(), 4);
        assert_eq!(expect_ready(&drain).len(), 2);
        assert!(matches!(drain.try_next(), DrainPoll::Empty));
    }

    #[test]
    fn new_rejects_invalid_settings() {
        let reader = PipeReader::from_reader("mem", Cursor::new(Vec::<u8>::new()));
        let settings = PlaybackSettings {
            buffer_count: 1,
            ..small_settings()
        };
        assert!(Pump::new(reader, PcmFormat::s16_mono(), settings).is_err());
    }

    #[test]
    fn started_source_plays_pipe_samples_in_order() {
        let input: Vec<i16> = (1..=40).map(|i| i * 700).collect();
        let mut pump = cursor_pump(pcm_bytes(&input));
        assert_eq!(pump.state(), PlayerState::Ready);
        assert_eq!(pump.prime(), 3);

        let mut source = pump.start().unwrap().expect("ready pump hands out a source");
        assert_eq!(pump.state(), PlayerState::Playing);

        let mut output = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while output.len() < input.len() {
            assert!(Instant::now() < deadline, "timed out after {:?}", output);
            match source.next() {
                Some(sample) if sample != 0.0 => output.push((sample * 32768.0) as i16),
                Some(_) => thread::sleep(Duration::from_micros(200)),
                None => panic!("source ended while the pump was playing"),
            }
        }
        assert_eq!(output, input);
        assert_eq!(pump.stats().bytes_read, input.len() as u64 * 2);

        assert_eq!(pump.stop(), StopOutcome::Joined);
        assert_eq!(pump.state(), PlayerState::Stopped);
        assert!(pump.reader_finished());
        assert_eq!(source.next(), None);
    }

    #[test]
    fn start_only_hands_out_one_source() {
        let mut pump = cursor_pump(Vec::new());
        let _source = pump.start().unwrap().unwrap();
        assert!(pump.start().unwrap().is_none());
        assert_eq!(pump.state(), PlayerState::Playing);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut pump = cursor_pump(vec![1_u8; 8]);
        let _source = pump.start().unwrap().unwrap();

        assert_eq!(pump.stop(), StopOutcome::Joined);
        assert_eq!(pump.stop(), StopOutcome::AlreadyStopped);
        assert_eq!(pump.state(), PlayerState::Stopped);
    }

    #[test]
    fn stop_before_start_releases_without_a_reader() {
        let mut pump = cursor_pump(vec![1_u8; 8]);
        assert_eq!(pump.stop(), StopOutcome::NeverStarted);
        assert_eq!(pump.prime(), 0);
        assert!(pump.start().unwrap().is_none());
        assert_eq!(pump.state(), PlayerState::Stopped);
    }

    #[test]
    fn dropping_the_source_ends_the_reader() {
        let mut pump = cursor_pump(Vec::new());
        let source = pump.start().unwrap().unwrap();
        assert!(!pump.reader_finished());

        drop(source);
        wait_for("reader to see the closed output", || pump.reader_finished());
        assert_eq!(pump.stop(), StopOutcome::Joined);
    }

    #[test]
    fn reader_blocked_in_read_is_detached() {
        let (unblock, blocked) = mpsc::channel();
        let reader = PipeReader::from_reader("blocked", BlockingReader(blocked));
        let mut pump = Pump::new(reader, PcmFormat::s16_mono(), small_settings()).unwrap();
        let _source = pump.start().unwrap().unwrap();

        let started = Instant::now();
        assert_eq!(pump.stop(), StopOutcome::Detached);
        assert!(started.elapsed() >= pump.stop_grace());
        assert_eq!(pump.state(), PlayerState::Stopped);

        drop(unblock);
        wait_for("detached reader to exit", || pump.reader_finished());
    }
}
