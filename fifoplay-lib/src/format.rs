//! Stream format descriptor for headerless linear PCM.

use serde::{Deserialize, Serialize};

use crate::constants::{BITS_PER_SAMPLE, CHANNELS, SAMPLE_RATE};
use crate::error::{FifoPlayError, Result};

/// Description of the raw PCM arriving on the pipe.
///
/// The pipe carries no header, so both ends agree on this out of band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub signed: bool,
    pub packed: bool,
    pub frames_per_packet: u32,
    pub bytes_per_frame: u32,
    pub bytes_per_packet: u32,
}

impl PcmFormat {
    /// 44.1 kHz, signed 16-bit, mono, packed.
    pub fn s16_mono() -> Self {
        let bytes_per_frame = (BITS_PER_SAMPLE as u32 / 8) * CHANNELS as u32;
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            bits_per_sample: BITS_PER_SAMPLE,
            signed: true,
            packed: true,
            frames_per_packet: 1,
            bytes_per_frame,
            bytes_per_packet: bytes_per_frame,
        }
    }

    /// Bytes occupied by one sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Check that the descriptor is internally consistent and decodable.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(FifoPlayError::InvalidFormat("sample rate is zero".into()));
        }
        if self.channels == 0 {
            return Err(FifoPlayError::InvalidFormat("channel count is zero".into()));
        }
        if self.bits_per_sample != 16 || !self.signed {
            return Err(FifoPlayError::InvalidFormat(format!(
                "only signed 16-bit samples are supported, got {}-bit {}",
                self.bits_per_sample,
                if self.signed { "signed" } else { "unsigned" }
            )));
        }
        if !self.packed {
            return Err(FifoPlayError::InvalidFormat(
                "only packed samples are supported".into(),
            ));
        }

        let expected_frame = self.bytes_per_sample() as u32 * self.channels as u32;
        if self.bytes_per_frame != expected_frame {
            return Err(FifoPlayError::InvalidFormat(format!(
                "bytes per frame is {}, expected {}",
                self.bytes_per_frame, expected_frame
            )));
        }
        if self.frames_per_packet != 1 || self.bytes_per_packet != self.bytes_per_frame {
            return Err(FifoPlayError::InvalidFormat(
                "linear pcm must carry exactly one frame per packet".into(),
            ));
        }
        Ok(())
    }

    /// Human readable summary, e.g. `44100Hz, 16bit, Mono`.
    pub fn describe(&self) -> String {
        let layout = match self.channels {
            1 => "Mono".to_string(),
            2 => "Stereo".to_string(),
            n => format!("{} channels", n),
        };
        format!("{}Hz, {}bit, {}", self.sample_rate, self.bits_per_sample, layout)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::s16_mono()
    }
}

/// Convert two native-endian bytes of a signed 16-bit sample to `f32`.
pub fn sample_from_bytes(bytes: [u8; 2]) -> f32 {
    i16::from_ne_bytes(bytes) as f32 / 32768.0
}
