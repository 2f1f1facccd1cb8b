//! # fifoplay
//!
//! Streams headerless PCM written to a named pipe into the default audio
//! output. A reader worker pulls fixed-size chunks from the pipe into a small
//! ring of buffers; a `rodio` source drains the ring on the output thread and
//! plays silence whenever the pipe falls behind.

pub mod constants;
pub mod error;
pub mod format;
pub mod pipe;
pub mod playback;

pub use error::{FifoPlayError, Result};
pub use format::PcmFormat;
pub use pipe::PipeReader;
pub use playback::{PlaybackSettings, Player};
