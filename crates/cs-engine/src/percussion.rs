//! Procedural percussion recipes.
//!
//! Each drum is built from one to three voices: pitch-swept oscillators for
//! bodies and filtered noise bursts for snares, hats, and cymbals. No
//! samples are involved; every hit draws a fresh noise buffer from the
//! factory's seeded generator.

use cs_ir::Automation;

use crate::voice::{FilterSpec, Layers, NoteOrigin, Source, Voice};
use crate::waveform::{NoiseSource, Shape};

/// Level that exponential decays head toward; effectively silence.
pub const DECAY_FLOOR: f32 = 0.001;

pub const KICK_START_HZ: f32 = 150.0;
pub const KICK_END_HZ: f32 = 40.0;
pub const KICK_SWEEP: f64 = 0.1;
pub const KICK_LENGTH: f64 = 0.3;

pub const SNARE_NOISE_HIGHPASS_HZ: f32 = 1000.0;
pub const SNARE_NOISE_LENGTH: f64 = 0.2;
pub const SNARE_TONE_START_HZ: f32 = 180.0;
pub const SNARE_TONE_END_HZ: f32 = 100.0;
pub const SNARE_TONE_LENGTH: f64 = 0.1;

pub const CLOSED_HAT_LENGTH: f64 = 0.05;
pub const HAT_HIGHPASS_HZ: f32 = 7000.0;

pub const OPEN_HAT_LENGTH: f64 = 0.2;
pub const OPEN_HAT_BANDPASS_HZ: f32 = 10_000.0;

pub const TOM_START_HZ: f32 = 200.0;
pub const TOM_END_HZ: f32 = 80.0;
pub const TOM_SWEEP: f64 = 0.15;
pub const TOM_LENGTH: f64 = 0.25;

pub const CLAP_BURSTS: usize = 3;
pub const CLAP_BURST_LENGTH: f64 = 0.08;
pub const CLAP_STAGGER: f64 = 0.01;
pub const CLAP_BANDPASS_HZ: f32 = 1500.0;

pub const CRASH_LENGTH: f64 = 0.8;
pub const CRASH_HIGHPASS_HZ: f32 = 5000.0;
pub const CRASH_PEAK_HZ: f32 = 8000.0;
pub const CRASH_PEAK_GAIN_DB: f32 = 6.0;

pub const RIM_START_HZ: f32 = 400.0;
pub const RIM_END_HZ: f32 = 200.0;
pub const RIM_SWEEP: f64 = 0.02;
pub const RIM_TONE_LENGTH: f64 = 0.05;
pub const RIM_CLICK_LENGTH: f64 = 0.015;
pub const RIM_CLICK_HIGHPASS_HZ: f32 = 5000.0;

/// Q used by the band-pass and peaking stages.
const RESONANCE: f32 = 1.0;

/// The eight procedural drum sounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrumVoice {
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
    Tom,
    Clap,
    Crash,
    Rimshot,
}

/// General-MIDI style pitch assignments for drum tracks.
pub static DRUM_MAP: [(u8, DrumVoice); 8] = [
    (36, DrumVoice::Kick),
    (38, DrumVoice::Snare),
    (42, DrumVoice::ClosedHat),
    (44, DrumVoice::Clap),
    (45, DrumVoice::Tom),
    (46, DrumVoice::OpenHat),
    (47, DrumVoice::Rimshot),
    (49, DrumVoice::Crash),
];

impl DrumVoice {
    /// Look up the drum for a pitch. Unmapped pitches play the kick.
    pub fn from_pitch(pitch: u8) -> Self {
        DRUM_MAP
            .iter()
            .find(|(p, _)| *p == pitch)
            .map_or(DrumVoice::Kick, |(_, drum)| *drum)
    }

    /// Time from the hit until the last layer stops.
    pub fn length(self) -> f64 {
        match self {
            DrumVoice::Kick => KICK_LENGTH,
            DrumVoice::Snare => SNARE_NOISE_LENGTH,
            DrumVoice::ClosedHat => CLOSED_HAT_LENGTH,
            DrumVoice::OpenHat => OPEN_HAT_LENGTH,
            DrumVoice::Tom => TOM_LENGTH,
            DrumVoice::Clap => CLAP_STAGGER * (CLAP_BURSTS - 1) as f64 + CLAP_BURST_LENGTH,
            DrumVoice::Crash => CRASH_LENGTH,
            DrumVoice::Rimshot => RIM_TONE_LENGTH,
        }
    }
}

/// Build the voices for one drum hit.
pub fn build(drum: DrumVoice, origin: NoteOrigin, noise: &mut NoiseSource) -> Layers {
    let start = origin.time;
    let gain = origin.gain;
    let mut layers = Layers::new();
    match drum {
        DrumVoice::Kick => {
            layers.push(swept_tone(origin, Shape::Sine, KICK_START_HZ, KICK_END_HZ, KICK_SWEEP, KICK_LENGTH, gain));
        }
        DrumVoice::Snare => {
            layers.push(
                noise_burst(origin, noise, start, SNARE_NOISE_LENGTH, gain)
                    .with_filter(FilterSpec::high_pass(SNARE_NOISE_HIGHPASS_HZ)),
            );
            layers.push(swept_tone(
                origin,
                Shape::Triangle,
                SNARE_TONE_START_HZ,
                SNARE_TONE_END_HZ,
                SNARE_TONE_LENGTH,
                SNARE_TONE_LENGTH,
                gain * 0.7,
            ));
        }
        DrumVoice::ClosedHat => {
            layers.push(
                noise_burst(origin, noise, start, CLOSED_HAT_LENGTH, gain * 0.6)
                    .with_filter(FilterSpec::high_pass(HAT_HIGHPASS_HZ)),
            );
        }
        DrumVoice::OpenHat => {
            layers.push(
                noise_burst(origin, noise, start, OPEN_HAT_LENGTH, gain * 0.5)
                    .with_filter(FilterSpec::band_pass(OPEN_HAT_BANDPASS_HZ, RESONANCE))
                    .with_filter(FilterSpec::high_pass(HAT_HIGHPASS_HZ)),
            );
        }
        DrumVoice::Tom => {
            layers.push(swept_tone(origin, Shape::Sine, TOM_START_HZ, TOM_END_HZ, TOM_SWEEP, TOM_LENGTH, gain));
        }
        DrumVoice::Clap => {
            for i in 0..CLAP_BURSTS {
                let burst_start = start + i as f64 * CLAP_STAGGER;
                layers.push(
                    noise_burst(origin, noise, burst_start, CLAP_BURST_LENGTH, gain * 0.8)
                        .with_filter(FilterSpec::band_pass(CLAP_BANDPASS_HZ, RESONANCE)),
                );
            }
        }
        DrumVoice::Crash => {
            layers.push(
                noise_burst(origin, noise, start, CRASH_LENGTH, gain * 0.5)
                    .with_filter(FilterSpec::high_pass(CRASH_HIGHPASS_HZ))
                    .with_filter(FilterSpec::peaking(CRASH_PEAK_HZ, RESONANCE, CRASH_PEAK_GAIN_DB)),
            );
        }
        DrumVoice::Rimshot => {
            layers.push(swept_tone(
                origin,
                Shape::Triangle,
                RIM_START_HZ,
                RIM_END_HZ,
                RIM_SWEEP,
                RIM_TONE_LENGTH,
                gain * 0.8,
            ));
            layers.push(
                noise_burst(origin, noise, start, RIM_CLICK_LENGTH, gain * 0.5)
                    .with_filter(FilterSpec::high_pass(RIM_CLICK_HIGHPASS_HZ)),
            );
        }
    }
    layers
}

/// Gain that jumps to `peak` at `start` and decays exponentially to the
/// floor over `length`.
fn decay(start: f64, length: f64, peak: f32) -> Automation {
    let mut gain = Automation::new(0.0);
    gain.set_value_at(peak, start).exponential_ramp_to(DECAY_FLOOR.min(peak), start + length);
    gain
}

fn swept_tone(
    origin: NoteOrigin,
    shape: Shape,
    from_hz: f32,
    to_hz: f32,
    sweep: f64,
    length: f64,
    peak: f32,
) -> Voice {
    let start = origin.time;
    let mut voice = Voice::new(origin, Source::Oscillator(shape), start, start + length);
    voice.frequency = Automation::new(from_hz);
    voice.frequency.set_value_at(from_hz, start).exponential_ramp_to(to_hz, start + sweep);
    voice.gain = decay(start, length, peak);
    voice
}

fn noise_burst(origin: NoteOrigin, noise: &mut NoiseSource, start: f64, length: f64, peak: f32) -> Voice {
    let mut voice = Voice::new(origin, Source::Noise(noise.buffer(length)), start, start + length);
    voice.gain = decay(start, length, peak);
    voice
}
