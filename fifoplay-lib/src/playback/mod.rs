//! Pipe-to-output playback: buffer ring, reader worker, output source,
//! device-free pump and the player that binds it to an output device.

pub mod player;
pub mod pump;
pub mod ring;
pub mod settings;
pub mod source;
mod worker;

pub use player::Player;
pub use pump::{PlayerState, Pump, StopOutcome};
pub use settings::PlaybackSettings;
pub use source::{PcmSource, PlaybackStats, StatsSnapshot};
