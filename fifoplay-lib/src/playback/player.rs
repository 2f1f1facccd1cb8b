//! Output queue: binds a [`Pump`] to the default output stream and a sink.

use std::fs::File;
use std::io::Read;
use std::thread;
use std::time::Duration;

use log::{info, warn};
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use crate::constants::{OUTPUT_STREAM_OPEN_RETRIES, OUTPUT_STREAM_OPEN_RETRY_MS};
use crate::error::{FifoPlayError, Result};
use crate::format::PcmFormat;
use crate::pipe::PipeReader;

use super::pump::{PlayerState, Pump, StopOutcome};
use super::settings::PlaybackSettings;
use super::source::StatsSnapshot;

/// Streams PCM from a pipe into the default output device.
///
/// Buffers are allocated in [`Player::new`], optionally primed with
/// [`Player::prime`], and released by [`Player::stop`] (or on drop).
pub struct Player<R: Read + Send + 'static = File> {
    pub format: PcmFormat,
    pump: Pump<R>,
    stream: Option<OutputStream>,
    sink: Sink,
}

impl<R: Read + Send + 'static> Player<R> {
    /// Create the output queue for `reader`.
    ///
    /// Allocates `settings.buffer_count` buffers of `settings.chunk_bytes`,
    /// then opens the default output stream (with retries) and connects a
    /// paused sink.
    pub fn new(
        reader: PipeReader<R>,
        format: PcmFormat,
        settings: PlaybackSettings,
    ) -> Result<Self> {
        let pump = Pump::new(reader, format, settings)?;

        let mut stream = open_output_stream_with_retry()?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        sink.set_volume(settings.volume);

        Ok(Self {
            format,
            pump,
            stream: Some(stream),
            sink,
        })
    }

    /// Make one synchronous fill attempt per buffer before playback starts.
    ///
    /// Returns the number of buffers that received data.
    pub fn prime(&mut self) -> usize {
        self.pump.prime()
    }

    /// Start the reader worker and unpause the output.
    pub fn start(&mut self) -> Result<()> {
        if let Some(source) = self.pump.start()? {
            self.sink.append(source);
            self.sink.play();
            info!("playback started");
        }
        Ok(())
    }

    /// Stop playback and release the output.
    pub fn stop(&mut self) {
        if self.pump.state() == PlayerState::Stopped {
            return;
        }
        self.sink.stop();
        if self.pump.stop() == StopOutcome::Detached {
            warn!("reader thread left running until exit");
        }
        self.stream.take();
        info!("playback stopped");
    }

    pub fn state(&self) -> PlayerState {
        self.pump.state()
    }

    pub fn settings(&self) -> &PlaybackSettings {
        self.pump.settings()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.pump.stats()
    }

    /// True once the source has ended (reader gone and queue drained).
    pub fn is_finished(&self) -> bool {
        self.pump.state() == PlayerState::Playing && self.sink.empty()
    }
}

impl<R: Read + Send + 'static> Drop for Player<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open the default output stream with bounded retry behavior.
fn open_output_stream_with_retry() -> Result<OutputStream> {
    let mut last_error = String::new();
    for attempt in 1..=OUTPUT_STREAM_OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                last_error = err.to_string();
                if attempt < OUTPUT_STREAM_OPEN_RETRIES {
                    warn!(
                        "open_default_stream attempt {}/{} failed: {}",
                        attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                    );
                    thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
                }
            }
        }
    }
    Err(FifoPlayError::OutputStream(format!(
        "gave up after {} attempts: {}",
        OUTPUT_STREAM_OPEN_RETRIES, last_error
    )))
}
