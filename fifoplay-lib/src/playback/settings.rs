//! Runtime knobs for the buffer ring and output sink.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BUFFER_COUNT, CHUNK_BYTES, DEFAULT_VOLUME, IDLE_BACKOFF_MS, MAX_BUFFER_COUNT,
    MAX_CHUNK_BYTES, MAX_IDLE_BACKOFF_MS, MAX_VOLUME,
};
use crate::error::{FifoPlayError, Result};
use crate::format::PcmFormat;

pub const ENV_CHUNK_BYTES: &str = "FIFOPLAY_CHUNK_BYTES";
pub const ENV_BUFFERS: &str = "FIFOPLAY_BUFFERS";
pub const ENV_IDLE_MS: &str = "FIFOPLAY_IDLE_MS";
pub const ENV_VOLUME: &str = "FIFOPLAY_VOLUME";

/// Buffer and output settings applied when the player is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub chunk_bytes: usize,
    pub buffer_count: usize,
    pub idle_backoff_ms: u64,
    pub volume: f32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            chunk_bytes: CHUNK_BYTES,
            buffer_count: BUFFER_COUNT,
            idle_backoff_ms: IDLE_BACKOFF_MS,
            volume: DEFAULT_VOLUME,
        }
    }
}

impl PlaybackSettings {
    /// Read overrides from the process environment on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(value) = lookup(ENV_CHUNK_BYTES) {
            settings.chunk_bytes = parse_value(ENV_CHUNK_BYTES, &value)?;
        }
        if let Some(value) = lookup(ENV_BUFFERS) {
            settings.buffer_count = parse_value(ENV_BUFFERS, &value)?;
        }
        if let Some(value) = lookup(ENV_IDLE_MS) {
            settings.idle_backoff_ms = parse_value(ENV_IDLE_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_VOLUME) {
            let volume: f32 = parse_value(ENV_VOLUME, &value)?;
            if !volume.is_finite() {
                return Err(FifoPlayError::InvalidSettings(format!(
                    "{} must be a finite number",
                    ENV_VOLUME
                )));
            }
            settings.volume = volume.clamp(0.0, MAX_VOLUME);
        }
        Ok(settings)
    }

    /// Check the settings against the stream format.
    pub fn validate(&self, format: &PcmFormat) -> Result<()> {
        let frame = format.bytes_per_frame as usize;
        if self.chunk_bytes == 0 || frame == 0 || self.chunk_bytes % frame != 0 {
            return Err(FifoPlayError::InvalidSettings(format!(
                "chunk size {} is not a positive multiple of the {}-byte frame",
                self.chunk_bytes, frame
            )));
        }
        if self.chunk_bytes > MAX_CHUNK_BYTES {
            return Err(FifoPlayError::InvalidSettings(format!(
                "chunk size {} exceeds the {}-byte limit",
                self.chunk_bytes, MAX_CHUNK_BYTES
            )));
        }
        if self.buffer_count < 2 || self.buffer_count > MAX_BUFFER_COUNT {
            return Err(FifoPlayError::InvalidSettings(format!(
                "buffer count must be between 2 and {}, got {}",
                MAX_BUFFER_COUNT, self.buffer_count
            )));
        }
        if self.idle_backoff_ms > MAX_IDLE_BACKOFF_MS {
            return Err(FifoPlayError::InvalidSettings(format!(
                "idle backoff {} ms exceeds the {} ms limit",
                self.idle_backoff_ms, MAX_IDLE_BACKOFF_MS
            )));
        }
        Ok(())
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    /// Serialize for diagnostics.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        FifoPlayError::InvalidSettings(format!("{} has an invalid value: {:?}", key, value))
    })
}
