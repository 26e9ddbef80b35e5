//! Look-ahead beat scheduler.
//!
//! A small state machine over the audio clock. Each `advance` call emits
//! every beat whose deadline falls inside the look-ahead window, stamped
//! with its exact audio-clock time, so the voices for that beat can be
//! queued ahead of the device. Tempo and loop changes take effect the next
//! time a beat is emitted.

use cs_ir::{clamp_tempo, seconds_per_16th, LoopRegion, DEFAULT_TEMPO};
use tracing::{debug, info};

/// Seconds of audio scheduled ahead of the clock.
pub const DEFAULT_LOOKAHEAD: f64 = 0.1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// What a `start` call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// Playback began from the requested beat.
    Started,
    /// Playback continued from the paused beat.
    Resumed,
    /// Already playing; nothing changed.
    AlreadyPlaying,
}

/// Beat clock with a look-ahead window.
#[derive(Clone, Debug)]
pub struct LookAheadScheduler {
    state: TransportState,
    tempo: u16,
    current_beat: u32,
    next_deadline: f64,
    loop_region: LoopRegion,
    lookahead: f64,
}

impl Default for LookAheadScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD)
    }
}

impl LookAheadScheduler {
    pub fn new(lookahead: f64) -> Self {
        Self {
            state: TransportState::Stopped,
            tempo: DEFAULT_TEMPO,
            current_beat: 0,
            next_deadline: 0.0,
            loop_region: LoopRegion::default(),
            lookahead: if lookahead.is_finite() { lookahead.max(0.0) } else { DEFAULT_LOOKAHEAD },
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn tempo(&self) -> u16 {
        self.tempo
    }

    /// The next beat to be emitted.
    pub fn current_beat(&self) -> u32 {
        self.current_beat
    }

    pub fn next_deadline(&self) -> f64 {
        self.next_deadline
    }

    pub fn loop_region(&self) -> LoopRegion {
        self.loop_region
    }

    /// Begin or resume playback at audio time `now`.
    ///
    /// From `Stopped` playback starts at `start_beat`; from `Paused` it
    /// continues at the paused beat. Calling this while playing is a no-op.
    pub fn start(&mut self, tempo: u16, start_beat: u32, now: f64) -> StartOutcome {
        let outcome = match self.state {
            TransportState::Playing => return StartOutcome::AlreadyPlaying,
            TransportState::Paused => StartOutcome::Resumed,
            TransportState::Stopped => {
                self.current_beat = start_beat;
                StartOutcome::Started
            }
        };
        self.tempo = clamp_tempo(tempo);
        self.next_deadline = now;
        self.state = TransportState::Playing;
        info!(?outcome, beat = self.current_beat, tempo = self.tempo, "transport playing");
        outcome
    }

    /// Halt scheduling, keeping the beat position.
    pub fn pause(&mut self) {
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
            info!(beat = self.current_beat, "transport paused");
        }
    }

    /// Halt scheduling and rewind to beat 0.
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.current_beat = 0;
        info!("transport stopped");
    }

    /// Change tempo (clamped). The next emitted beat uses it.
    pub fn set_tempo(&mut self, bpm: u16) {
        self.tempo = clamp_tempo(bpm);
        debug!(tempo = self.tempo, "tempo changed");
    }

    /// Replace the loop region. The current beat is not moved; the new
    /// bounds apply at the next wrap check.
    pub fn set_loop(&mut self, start: u32, end: u32, enabled: bool) {
        self.loop_region = LoopRegion::new(start, end, enabled);
        debug!(region = ?self.loop_region, "loop region changed");
    }

    pub fn set_loop_region(&mut self, region: LoopRegion) {
        self.loop_region = region;
    }

    /// Emit every beat due before `now + lookahead`, in order.
    ///
    /// `on_beat` receives the beat index and its audio-clock start time.
    /// Returns the number of beats emitted.
    pub fn advance(&mut self, now: f64, mut on_beat: impl FnMut(u32, f64)) -> usize {
        if self.state != TransportState::Playing {
            return 0;
        }
        let horizon = now + self.lookahead;
        let mut emitted = 0;
        while self.next_deadline < horizon {
            on_beat(self.current_beat, self.next_deadline);
            self.next_deadline += seconds_per_16th(self.tempo);
            self.current_beat = self.current_beat.saturating_add(1);
            if self.loop_region.enabled() && self.current_beat >= self.loop_region.end() {
                self.current_beat = self.loop_region.start();
            }
            emitted += 1;
        }
        emitted
    }
}
