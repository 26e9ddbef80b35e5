//! Audio output trait and error types.

use std::sync::Arc;

use cs_engine::{AudioClock, VoiceSink};
use thiserror::Error;

/// Error type for audio operations.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device init error: {0}")]
    DeviceInit(String),
    #[error("Stream create error: {0}")]
    StreamCreate(String),
    #[error("Playback error: {0}")]
    Playback(String),
    #[error("No audio device available")]
    NoDevice,
}

/// A running output that owns the live mix bus.
///
/// Voices handed to `voice_sink` are mixed on the output's own thread;
/// `clock` reports the position of the sample currently being played.
pub trait AudioOutput {
    /// Get the sample rate.
    fn sample_rate(&self) -> u32;

    /// The clock the look-ahead scheduler should follow.
    fn clock(&self) -> Arc<dyn AudioClock>;

    /// A handle that forwards voices to the live mix bus.
    fn voice_sink(&self) -> Box<dyn VoiceSink + Send>;

    /// Master gain applied after the limiter (clamped to [0, 1]).
    fn set_master_volume(&mut self, volume: f32);

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback.
    fn stop(&mut self) -> Result<(), AudioError>;
}
