//! Shared constants for the fixed stream format and playback defaults.

/// Sample rate of the incoming PCM stream (Hz).
pub const SAMPLE_RATE: u32 = 44100;

/// Channel count of the incoming PCM stream.
pub const CHANNELS: u16 = 1;

/// Bit depth of a single signed linear PCM sample.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Capacity of a single ring buffer in bytes.
///
/// Each pipe read asks for at most this many bytes.
pub const CHUNK_BYTES: usize = 4096;

/// Largest accepted buffer capacity in bytes.
pub const MAX_CHUNK_BYTES: usize = 1024 * 1024;

/// Number of buffers circulating between the pipe reader and the output.
pub const BUFFER_COUNT: usize = 3;

/// Largest accepted ring size.
pub const MAX_BUFFER_COUNT: usize = 64;

/// Pause after a read returned no data, in milliseconds.
pub const IDLE_BACKOFF_MS: u64 = 10;

/// Longest accepted pause after an empty read, in milliseconds.
pub const MAX_IDLE_BACKOFF_MS: u64 = 1000;

/// Default linear output volume.
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Upper bound accepted for the linear output volume.
pub const MAX_VOLUME: f32 = 2.0;

pub(crate) const OUTPUT_STREAM_OPEN_RETRIES: usize = 20;
pub(crate) const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;
