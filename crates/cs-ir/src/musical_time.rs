//! Beat-to-seconds mapping.
//!
//! A beat is one 16th note, the sequencer's scheduling quantum. Exactly one
//! mapping from beat index to seconds is in effect for a given tempo:
//! `60 / tempo / 4`, i.e. `15 / tempo` seconds per beat.

/// Slowest accepted tempo in BPM.
pub const TEMPO_MIN: u16 = 40;

/// Fastest accepted tempo in BPM.
pub const TEMPO_MAX: u16 = 240;

/// Tempo used when a snapshot does not specify one.
pub const DEFAULT_TEMPO: u16 = 120;

/// 16th-note steps per quarter-note beat.
pub const STEPS_PER_QUARTER: u32 = 4;

/// Clamp a tempo request to `[TEMPO_MIN, TEMPO_MAX]`.
pub fn clamp_tempo(bpm: u16) -> u16 {
    bpm.clamp(TEMPO_MIN, TEMPO_MAX)
}

/// Duration of one 16th-note step at `tempo` BPM.
pub fn seconds_per_16th(tempo: u16) -> f64 {
    60.0 / tempo.max(1) as f64 / STEPS_PER_QUARTER as f64
}

/// Offset in seconds of `beat` from beat zero.
pub fn beat_to_time(beat: u32, tempo: u16) -> f64 {
    beat as f64 * seconds_per_16th(tempo)
}
