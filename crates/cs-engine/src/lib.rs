//! Synthesis and scheduling engine for the chipstep sequencer.
//!
//! Turns a project snapshot into voices (pulse-table oscillators, shaped
//! noise, procedural drums), mixes them through a fixed master chain, and
//! provides the look-ahead beat clock that drives live playback.

pub mod clock;
pub mod envelope;
mod frequency;
pub mod limiter;
pub mod mixer;
pub mod percussion;
pub mod render;
pub mod scheduler;
pub mod timeline;
pub mod voice;
pub mod waveform;

pub use clock::{AudioClock, FrameClock, ManualClock};
pub use envelope::{adsr_automation, release_offset, EnvelopeShape};
pub use frequency::{detune_ratio, midi_to_frequency, semitone_ratio};
pub use limiter::{Limiter, LimiterConfig};
pub use mixer::{Mixer, VoiceKey, MAX_LIVE_VOICES};
pub use percussion::{DrumVoice, DRUM_MAP};
pub use render::VoiceRenderer;
pub use scheduler::{LookAheadScheduler, StartOutcome, TransportState, DEFAULT_LOOKAHEAD};
pub use timeline::{note_event, notes_at_beat, notes_in_loop, schedule_beat, ScheduledNote};
pub use voice::{FilterKind, FilterSpec, NoteEvent, NoteOrigin, Source, Voice, VoiceFactory, VoiceSink};
pub use waveform::{build_pulse_table, generate_noise_buffer, NoiseSource, PulseBank, PulseTable, Shape};
