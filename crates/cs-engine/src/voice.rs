//! Voice scheduling: turns a note event plus its instrument into voices.
//!
//! A `Voice` is a self-contained description of one sounding event: its
//! source, gain and frequency automation, filter chain, and start/stop
//! times. Voices are built here and handed to a `VoiceSink`, which is the
//! audio thread's queue during live playback, the render mixer offline, or
//! a plain `Vec` in tests. The factory never knows which.

use std::f32::consts::FRAC_1_SQRT_2;
use std::sync::Arc;

use arrayvec::ArrayVec;
use cs_ir::{Automation, Bitcrush, InstrumentConfig, TrackKind, Vibrato, Waveform};
use tracing::warn;

use crate::envelope;
use crate::frequency::{detune_ratio, midi_to_frequency, semitone_ratio};
use crate::percussion::{self, DrumVoice};
use crate::waveform::{NoiseSource, PulseBank, Shape};

/// Filters one voice can carry.
pub const MAX_FILTERS: usize = 2;

/// Sub-voices one note can produce (a clap is three bursts).
pub const MAX_LAYERS: usize = 3;

/// Extra time a pitched voice keeps running after its release ends.
pub const STOP_PADDING: f64 = 0.05;

/// Upper bound on arpeggio steps written into one frequency curve.
const MAX_ARP_EVENTS: usize = 4096;

/// What a voice plays.
#[derive(Clone, Debug)]
pub enum Source {
    Oscillator(Shape),
    /// A pre-generated noise buffer played once from the voice start.
    Noise(Arc<[f32]>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterKind {
    HighPass,
    BandPass,
    Peaking { gain_db: f32 },
}

/// One biquad stage in a voice's filter chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub frequency: f32,
    pub q: f32,
}

impl FilterSpec {
    pub fn high_pass(frequency: f32) -> Self {
        Self { kind: FilterKind::HighPass, frequency, q: FRAC_1_SQRT_2 }
    }

    pub fn band_pass(frequency: f32, q: f32) -> Self {
        Self { kind: FilterKind::BandPass, frequency, q }
    }

    pub fn peaking(frequency: f32, q: f32, gain_db: f32) -> Self {
        Self { kind: FilterKind::Peaking { gain_db }, frequency, q }
    }
}

/// The note a voice was dispatched for. Sub-voices of one drum hit share it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteOrigin {
    pub pitch: u8,
    /// Scheduled start in seconds.
    pub time: f64,
    /// Peak gain after instrument, track, and velocity scaling.
    pub gain: f32,
}

/// A transient sounding event.
///
/// Owned by the mixer from submission until `stop`; never reused.
#[derive(Clone, Debug)]
pub struct Voice {
    pub origin: NoteOrigin,
    pub source: Source,
    /// Oscillator frequency in Hz (ignored by noise sources).
    pub frequency: Automation,
    pub gain: Automation,
    pub filters: heapless::Vec<FilterSpec, MAX_FILTERS>,
    pub vibrato: Option<Vibrato>,
    pub bitcrush: Option<Bitcrush>,
    pub start: f64,
    pub stop: f64,
}

impl Voice {
    /// A silent voice over `[start, stop)`; callers fill in the curves.
    pub fn new(origin: NoteOrigin, source: Source, start: f64, stop: f64) -> Self {
        Self {
            origin,
            source,
            frequency: Automation::constant(0.0),
            gain: Automation::constant(0.0),
            filters: heapless::Vec::new(),
            vibrato: None,
            bitcrush: None,
            start,
            stop: stop.max(start),
        }
    }

    pub fn with_filter(mut self, spec: FilterSpec) -> Self {
        if self.filters.push(spec).is_err() {
            warn!(?spec, "filter chain full, dropping stage");
        }
        self
    }

    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }
}

/// Voices produced by a single note.
pub type Layers = ArrayVec<Voice, MAX_LAYERS>;

/// Destination for scheduled voices.
pub trait VoiceSink {
    fn submit(&mut self, voice: Voice);
}

impl VoiceSink for Vec<Voice> {
    fn submit(&mut self, voice: Voice) {
        self.push(voice);
    }
}

/// A note resolved to absolute time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    /// Start time in seconds.
    pub start: f64,
    /// Length in seconds.
    pub duration: f64,
    /// Peak gain.
    pub gain: f32,
}

impl NoteEvent {
    fn sanitized(&self) -> Self {
        let finite_or_zero = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            pitch: self.pitch.min(127),
            start: finite_or_zero(self.start),
            duration: finite_or_zero(self.duration),
            gain: if self.gain.is_finite() { self.gain.max(0.0) } else { 0.0 },
        }
    }

    fn origin(&self) -> NoteOrigin {
        NoteOrigin { pitch: self.pitch, time: self.start, gain: self.gain }
    }
}

/// Builds voices for notes. Holds the shared pulse tables and the noise RNG.
pub struct VoiceFactory {
    pulses: Arc<PulseBank>,
    noise: NoiseSource,
}

impl VoiceFactory {
    pub fn new(pulses: Arc<PulseBank>, sample_rate: u32, seed: u64) -> Self {
        Self { pulses, noise: NoiseSource::new(sample_rate, seed) }
    }

    pub fn sample_rate(&self) -> u32 {
        self.noise.sample_rate()
    }

    /// Build the voices for one note and submit them to `sink`.
    ///
    /// Returns the number of voices submitted.
    pub fn schedule_note(
        &mut self,
        event: &NoteEvent,
        config: &InstrumentConfig,
        kind: TrackKind,
        sink: &mut dyn VoiceSink,
    ) -> usize {
        let layers = self.build_note(event, config, kind);
        let count = layers.len();
        for voice in layers {
            sink.submit(voice);
        }
        count
    }

    /// Build the voices for one note.
    pub fn build_note(&mut self, event: &NoteEvent, config: &InstrumentConfig, kind: TrackKind) -> Layers {
        let event = event.sanitized();
        let mut layers = Layers::new();
        match kind {
            TrackKind::Drums => {
                let drum = DrumVoice::from_pitch(event.pitch);
                return percussion::build(drum, event.origin(), &mut self.noise);
            }
            TrackKind::Synth if config.waveform == Waveform::Noise => {
                layers.push(self.noise_voice(&event, config));
            }
            TrackKind::Synth => {
                layers.push(self.pitched_voice(&event, config));
            }
        }
        layers
    }

    fn noise_voice(&mut self, event: &NoteEvent, config: &InstrumentConfig) -> Voice {
        let adsr = config.adsr.clamped();
        let shape = envelope::shape(event.start, event.duration, &adsr, event.gain);
        let stop = stop_time(event, &adsr);
        let buffer = self.noise.buffer(stop - event.start);
        let mut voice = Voice::new(event.origin(), Source::Noise(buffer), event.start, stop);
        voice.gain = shape.automation();
        voice.bitcrush = config.effects.bitcrush;
        voice
    }

    fn pitched_voice(&self, event: &NoteEvent, config: &InstrumentConfig) -> Voice {
        let adsr = config.adsr.clamped();
        let shape = match config.waveform {
            Waveform::Square => Shape::Square,
            Waveform::Triangle => Shape::Triangle,
            Waveform::Sawtooth => Shape::Sawtooth,
            Waveform::Pulse | Waveform::Noise => Shape::Pulse(self.pulses.nearest(config.pulse_width).clone()),
        };
        let stop = stop_time(event, &adsr);
        let base = midi_to_frequency(event.pitch) * detune_ratio(config.detune);

        let mut voice = Voice::new(event.origin(), Source::Oscillator(shape), event.start, stop);
        voice.gain = envelope::adsr_automation(event.start, event.duration, &adsr, event.gain);
        voice.frequency = frequency_curve(base, event.start, stop, config);
        voice.vibrato = config
            .effects
            .vibrato
            .filter(|v| {
                v.rate_hz.is_finite() && v.rate_hz > 0.0 && v.depth_cents.is_finite() && v.depth_cents != 0.0
            });
        voice.bitcrush = config.effects.bitcrush;
        voice
    }
}

fn stop_time(event: &NoteEvent, adsr: &cs_ir::Adsr) -> f64 {
    event.start + event.duration + adsr.release as f64 + STOP_PADDING
}

/// Frequency automation for a pitched voice. An arpeggio takes precedence
/// over a glide; with neither the curve is constant.
fn frequency_curve(base: f32, start: f64, stop: f64, config: &InstrumentConfig) -> Automation {
    let mut curve = Automation::new(base);
    if let Some(arp) = config
        .effects
        .arpeggio
        .as_ref()
        .filter(|a| !a.semitones.is_empty() && a.rate_hz.is_finite() && a.rate_hz > 0.0)
    {
        let step = 1.0 / arp.rate_hz as f64;
        for (i, &semis) in arp.semitones.iter().cycle().take(MAX_ARP_EVENTS).enumerate() {
            let time = start + i as f64 * step;
            if time >= stop {
                break;
            }
            curve.set_value_at(base * semitone_ratio(semis as f32), time);
        }
        return curve;
    }
    if let Some(glide) = config.effects.glide.filter(|g| g.time.is_finite() && g.time > 0.0) {
        curve
            .set_value_at(base * semitone_ratio(glide.from_semitones), start)
            .exponential_ramp_to(base, start + glide.time as f64);
        return curve;
    }
    curve.set_value_at(base, start);
    curve
}
