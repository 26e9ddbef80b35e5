//! Core data model for the chipstep sequencer.
//!
//! This crate defines the read-only snapshot the audio core consumes:
//! tracks of notes on a 16th-note grid, per-track instrument configs,
//! tempo and loop region. It also holds the time-domain primitives shared
//! by the live and offline paths (beat-to-seconds mapping, automation
//! curves, planar audio buffers).
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_buffer;
mod automation;
mod instrument;
mod musical_time;
mod project;
mod track;

pub use audio_buffer::{AudioBuffer, BLOCK_SIZE, MAX_CHANNELS};
pub use automation::{interpolate, Automation, AutomationEvent, CurveKind};
pub use instrument::{
    Adsr, Arpeggio, Bitcrush, Effects, Glide, InstrumentConfig, Vibrato, Waveform, MAX_ARP_STEPS,
};
pub use musical_time::{
    beat_to_time, clamp_tempo, seconds_per_16th, DEFAULT_TEMPO, STEPS_PER_QUARTER,
    TEMPO_MAX, TEMPO_MIN,
};
pub use project::{LoopRegion, ProjectSnapshot};
pub use track::{Note, Track, TrackId, TrackKind};
