//! Audio clock abstraction.
//!
//! The look-ahead scheduler reads time from whatever drives the audio
//! output. For a live device that is the stream's frame counter; tests
//! drive a manual clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonic clock in seconds.
pub trait AudioClock: Send + Sync {
    fn now(&self) -> f64;
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self { bits: AtomicU64::new(start.to_bits()) }
    }

    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Clock derived from a count of frames played at a fixed rate.
#[derive(Debug)]
pub struct FrameClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl FrameClock {
    pub fn new(frames: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self { frames, sample_rate: sample_rate.max(1) }
    }
}

impl AudioClock for FrameClock {
    fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1.0);
        clock.advance(0.5);
        assert_eq!(clock.now(), 1.5);
        clock.set(0.0);
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn frame_clock_tracks_counter() {
        let frames = Arc::new(AtomicU64::new(0));
        let clock = FrameClock::new(frames.clone(), 48000);
        frames.store(24000, Ordering::Release);
        assert_eq!(clock.now(), 0.5);
    }
}
