//! `rodio` source that plays buffers from the ring and fills gaps with silence.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::source::SeekError;
use rodio::Source;

use crate::format::{sample_from_bytes, PcmFormat};

use super::ring::{BufferDrain, DrainPoll, PcmBuffer};

/// Counters shared between the reader worker, the output and the run loop.
#[derive(Debug, Default)]
pub struct PlaybackStats {
    pub bytes_read: AtomicU64,
    pub buffers_played: AtomicU64,
    pub samples_played: AtomicU64,
    pub silent_samples: AtomicU64,
    pub idle_reads: AtomicU64,
    pub read_errors: AtomicU64,
}

/// Plain copy of [`PlaybackStats`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub bytes_read: u64,
    pub buffers_played: u64,
    pub samples_played: u64,
    pub silent_samples: u64,
    pub idle_reads: u64,
    pub read_errors: u64,
}

impl PlaybackStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            buffers_played: self.buffers_played.load(Ordering::Relaxed),
            samples_played: self.samples_played.load(Ordering::Relaxed),
            silent_samples: self.silent_samples.load(Ordering::Relaxed),
            idle_reads: self.idle_reads.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

/// Endless mono/multichannel stream decoded from queued PCM buffers.
///
/// Runs on the output thread: it only ever polls the ring, so a stalled pipe
/// turns into silence instead of a stalled device.
pub struct PcmSource {
    format: PcmFormat,
    drain: BufferDrain,
    current: Option<PcmBuffer>,
    offset: usize,
    carry: Option<u8>,
    filler_gone: bool,
    abort: Arc<AtomicBool>,
    stats: Arc<PlaybackStats>,
}

impl PcmSource {
    pub fn new(
        format: PcmFormat,
        drain: BufferDrain,
        abort: Arc<AtomicBool>,
        stats: Arc<PlaybackStats>,
    ) -> Self {
        Self {
            format,
            drain,
            current: None,
            offset: 0,
            carry: None,
            filler_gone: false,
            abort,
            stats,
        }
    }

    /// Next raw byte of queued audio, pulling a new buffer when needed.
    fn next_byte(&mut self) -> Option<u8> {
        loop {
            if let Some(buffer) = self.current.as_ref() {
                if self.offset < buffer.len() {
                    let byte = buffer.bytes()[self.offset];
                    self.offset += 1;
                    return Some(byte);
                }
            }

            if let Some(done) = self.current.take() {
                self.drain.release(done);
                self.stats.buffers_played.fetch_add(1, Ordering::Relaxed);
            }
            self.offset = 0;

            match self.drain.try_next() {
                DrainPoll::Ready(buffer) => self.current = Some(buffer),
                DrainPoll::Empty => return None,
                DrainPoll::Closed => {
                    self.filler_gone = true;
                    return None;
                }
            }
        }
    }

    fn next_sample(&mut self) -> Option<f32> {
        let low = match self.carry.take() {
            Some(byte) => byte,
            None => self.next_byte()?,
        };
        match self.next_byte() {
            Some(high) => Some(sample_from_bytes([low, high])),
            None => {
                // Half a sample so far; finish it from the next buffer.
                self.carry = Some(low);
                None
            }
        }
    }
}

impl Iterator for PcmSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.abort.load(Ordering::Relaxed) {
            return None;
        }

        match self.next_sample() {
            Some(sample) => {
                self.stats.samples_played.fetch_add(1, Ordering::Relaxed);
                Some(sample)
            }
            None if self.filler_gone => None,
            None => {
                self.stats.silent_samples.fetch_add(1, Ordering::Relaxed);
                Some(0.0)
            }
        }
    }
}

impl Source for PcmSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.format.channels
    }

    fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }

    fn try_seek(&mut self, _pos: Duration) -> Result<(), SeekError> {
        Err(SeekError::NotSupported {
            underlying_source: "PcmSource",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::PipeReader;
    use crate::playback::ring::{buffer_ring, BufferFiller, FillOutcome};
    use std::io::Cursor;

    const WAIT: Duration = Duration::from_millis(10);

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
    }

    fn to_i16(sample: f32) -> i16 {
        (sample * 32768.0) as i16
    }

    fn source_with(count: usize, capacity: usize) -> (BufferFiller, PcmSource, Arc<PlaybackStats>) {
        let (filler, drain) = buffer_ring(count, capacity);
        let stats = Arc::new(PlaybackStats::default());
        let source = PcmSource::new(
            PcmFormat::s16_mono(),
            drain,
            Arc::new(AtomicBool::new(false)),
            stats.clone(),
        );
        (filler, source, stats)
    }

    #[test]
    fn reports_stream_format() {
        let (_filler, source, _) = source_with(3, 8);
        assert_eq!(source.channels(), 1);
        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.total_duration(), None);
    }

    #[test]
    fn plays_bytes_in_order_without_duplication() {
        let input: Vec<i16> = (0..64).map(|i| (i * 517 - 16000) as i16).collect();
        let (mut filler, mut source, stats) = source_with(3, 16);
        let mut reader = PipeReader::from_reader("mem", Cursor::new(pcm_bytes(&input)));

        let mut output = Vec::new();
        while output.len() < input.len() {
            while let FillOutcome::Queued(_) = filler.fill_next(&mut reader, WAIT) {}
            for _ in 0..8 {
                output.push(to_i16(source.next().unwrap()));
            }
        }

        assert_eq!(output, input);
        assert_eq!(stats.snapshot().silent_samples, 0);
        assert_eq!(stats.snapshot().samples_played, input.len() as u64);
    }

    #[test]
    fn empty_ring_yields_silence_not_stale_audio() {
        let (mut filler, mut source, stats) = source_with(3, 4);
        let loud = pcm_bytes(&[i16::MAX, i16::MAX]);
        let mut reader = PipeReader::from_reader("mem", Cursor::new(loud));
        assert!(matches!(filler.fill_next(&mut reader, WAIT), FillOutcome::Queued(4)));

        assert!(source.next().unwrap() > 0.99);
        assert!(source.next().unwrap() > 0.99);
        for _ in 0..32 {
            assert!(matches!(filler.fill_next(&mut reader, WAIT), FillOutcome::Idle));
            assert_eq!(source.next(), Some(0.0));
        }
        assert_eq!(stats.snapshot().silent_samples, 32);
        assert_eq!(stats.snapshot().buffers_played, 1);
    }

    #[test]
    fn odd_reads_carry_half_samples_across_buffers() {
        // Capacity 3 splits every other sample over a buffer boundary.
        let input = [1000_i16, -2000, 3000, -4000];
        let (mut filler, mut source, _) = source_with(4, 3);
        let mut reader = PipeReader::from_reader("mem", Cursor::new(pcm_bytes(&input)));
        while let FillOutcome::Queued(_) = filler.fill_next(&mut reader, WAIT) {}

        let output: Vec<i16> = (0..4).map(|_| to_i16(source.next().unwrap())).collect();
        assert_eq!(output, input.to_vec());
    }

    #[test]
    fn ends_once_filler_is_gone_and_queue_is_drained() {
        let (mut filler, mut source, _) = source_with(2, 4);
        let mut reader = PipeReader::from_reader("mem", Cursor::new(pcm_bytes(&[42, 43])));
        assert!(matches!(filler.fill_next(&mut reader, WAIT), FillOutcome::Queued(4)));
        drop(filler);

        assert_eq!(to_i16(source.next().unwrap()), 42);
        assert_eq!(to_i16(source.next().unwrap()), 43);
        assert_eq!(source.next(), None);
    }

    #[test]
    fn abort_stops_the_stream() {
        let (filler, drain) = buffer_ring(2, 4);
        let abort = Arc::new(AtomicBool::new(false));
        let mut source = PcmSource::new(
            PcmFormat::s16_mono(),
            drain,
            abort.clone(),
            Arc::new(PlaybackStats::default()),
        );
        assert_eq!(source.next(), Some(0.0));
        abort.store(true, Ordering::SeqCst);
        assert_eq!(source.next(), None);
        drop(filler);
    }
}
