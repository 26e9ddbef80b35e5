//! Instrument configuration: waveform, envelope, and per-voice effects.

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

/// Maximum semitone offsets in an arpeggio pattern.
pub const MAX_ARP_STEPS: usize = 8;

/// Oscillator shape used by a track's voices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Square,
    Triangle,
    Sawtooth,
    /// Band-limited pulse wave with variable duty cycle.
    Pulse,
    /// White noise (drum tracks always use procedural percussion).
    Noise,
}

/// Attack-decay-sustain-release amplitude envelope.
///
/// Times are in seconds; `sustain` is a level relative to the peak gain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adsr {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for Adsr {
    fn default() -> Self {
        Self { attack: 0.01, decay: 0.1, sustain: 0.7, release: 0.2 }
    }
}

impl Adsr {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self { attack, decay, sustain, release }
    }

    /// Negative or non-finite times become zero; sustain is clamped to [0, 1].
    pub fn clamped(self) -> Self {
        fn time(v: f32) -> f32 {
            if v.is_finite() { v.max(0.0) } else { 0.0 }
        }
        let sustain = if self.sustain.is_finite() { self.sustain.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            attack: time(self.attack),
            decay: time(self.decay),
            sustain,
            release: time(self.release),
        }
    }
}

/// Cycle the note through semitone offsets at a fixed rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arpeggio {
    pub semitones: ArrayVec<i8, MAX_ARP_STEPS>,
    pub rate_hz: f32,
}

/// Sine pitch modulation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vibrato {
    pub rate_hz: f32,
    pub depth_cents: f32,
}

/// Slide into the note from an offset pitch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Glide {
    /// Starting offset from the target pitch.
    pub from_semitones: f32,
    /// Seconds to reach the target pitch.
    pub time: f32,
}

/// Output quantization to a reduced bit depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitcrush {
    pub bits: u8,
}

/// Optional per-voice effects.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Effects {
    pub arpeggio: Option<Arpeggio>,
    pub vibrato: Option<Vibrato>,
    pub glide: Option<Glide>,
    pub bitcrush: Option<Bitcrush>,
}

/// Sound settings for one track, looked up by track id at schedule time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstrumentConfig {
    pub waveform: Waveform,
    pub adsr: Adsr,
    /// Pulse duty cycle (0..1), only used by `Waveform::Pulse`.
    pub pulse_width: f32,
    /// Detune in cents.
    pub detune: f32,
    /// Instrument gain (0..1).
    pub gain: f32,
    pub effects: Effects,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::Square,
            adsr: Adsr::default(),
            pulse_width: 0.5,
            detune: 0.0,
            gain: 0.8,
            effects: Effects::default(),
        }
    }
}

impl InstrumentConfig {
    /// A config with the given waveform and defaults elsewhere.
    pub fn with_waveform(waveform: Waveform) -> Self {
        Self { waveform, ..Self::default() }
    }

    /// Default settings for a drum track.
    pub fn drum_kit() -> Self {
        Self {
            waveform: Waveform::Noise,
            adsr: Adsr::new(0.001, 0.05, 0.0, 0.05),
            ..Self::default()
        }
    }

    /// Gain clamped to [0, 1].
    pub fn clamped_gain(&self) -> f32 {
        if self.gain.is_finite() { self.gain.clamp(0.0, 1.0) } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adsr_clamps_negative_times_and_sustain() {
        let adsr = Adsr::new(-0.5, 0.1, 1.5, f32::NAN).clamped();
        assert_eq!(adsr, Adsr::new(0.0, 0.1, 1.0, 0.0));
    }

    #[test]
    fn clamped_gain() {
        let mut cfg = InstrumentConfig::default();
        cfg.gain = 2.0;
        assert_eq!(cfg.clamped_gain(), 1.0);
        cfg.gain = -1.0;
        assert_eq!(cfg.clamped_gain(), 0.0);
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: InstrumentConfig =
            serde_json::from_str(r#"{"waveform":"pulse","pulseWidth":0.25}"#).unwrap();
        assert_eq!(cfg.waveform, Waveform::Pulse);
        assert_eq!(cfg.pulse_width, 0.25);
        assert_eq!(cfg.adsr, Adsr::default());
        assert!(cfg.effects.arpeggio.is_none());
    }

    #[test]
    fn deserializes_effects() {
        let cfg: InstrumentConfig = serde_json::from_str(
            r#"{"effects":{"arpeggio":{"semitones":[0,4,7],"rateHz":12.0},"bitcrush":{"bits":4}}}"#,
        )
        .unwrap();
        let arp = cfg.effects.arpeggio.unwrap();
        assert_eq!(arp.semitones.as_slice(), &[0, 4, 7]);
        assert_eq!(cfg.effects.bitcrush, Some(Bitcrush { bits: 4 }));
    }
}
