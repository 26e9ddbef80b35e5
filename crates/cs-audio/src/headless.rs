//! Device-free output for tests and batch tools.
//!
//! Voices are recorded instead of played, and time only moves when the
//! caller advances the manual clock.

use std::sync::{Arc, Mutex, PoisonError};

use cs_engine::{AudioClock, ManualClock, Voice, VoiceSink};
use tracing::debug;

use crate::traits::{AudioError, AudioOutput};

#[derive(Clone, Default)]
struct RecordingSink {
    voices: Arc<Mutex<Vec<Voice>>>,
}

impl VoiceSink for RecordingSink {
    fn submit(&mut self, voice: Voice) {
        self.voices.lock().unwrap_or_else(PoisonError::into_inner).push(voice);
    }
}

/// Output that records submitted voices against a manual clock.
pub struct HeadlessOutput {
    sample_rate: u32,
    clock: Arc<ManualClock>,
    sink: RecordingSink,
    master_volume: f32,
    running: bool,
}

impl HeadlessOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            clock: Arc::new(ManualClock::new(0.0)),
            sink: RecordingSink::default(),
            master_volume: 1.0,
            running: false,
        }
    }

    /// The clock handle, for advancing time from the outside.
    pub fn manual_clock(&self) -> Arc<ManualClock> {
        self.clock.clone()
    }

    /// Shared view of every voice submitted so far.
    pub fn recorded(&self) -> Arc<Mutex<Vec<Voice>>> {
        self.sink.voices.clone()
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl AudioOutput for HeadlessOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn clock(&self) -> Arc<dyn AudioClock> {
        self.clock.clone()
    }

    fn voice_sink(&self) -> Box<dyn VoiceSink + Send> {
        Box::new(self.sink.clone())
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
    }

    fn start(&mut self) -> Result<(), AudioError> {
        debug!("headless output started");
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running = false;
        Ok(())
    }
}
