//! Pitch-to-frequency conversion.
//!
//! Equal temperament with A4 (MIDI 69) at 440 Hz. Detune and arpeggio
//! offsets are expressed as frequency ratios so they compose by
//! multiplication.

/// MIDI note number of concert A.
const A4_NOTE: f64 = 69.0;

/// Frequency of concert A in Hz.
const A4_HZ: f64 = 440.0;

/// Convert a MIDI note number to its frequency in Hz.
pub fn midi_to_frequency(pitch: u8) -> f32 {
    (A4_HZ * 2f64.powf((pitch as f64 - A4_NOTE) / 12.0)) as f32
}

/// Frequency ratio for a detune in cents.
pub fn detune_ratio(cents: f32) -> f32 {
    if !cents.is_finite() {
        return 1.0;
    }
    2f32.powf(cents / 1200.0)
}

/// Frequency ratio for an offset in semitones.
pub fn semitone_ratio(semitones: f32) -> f32 {
    detune_ratio(semitones * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_440() {
        assert!((midi_to_frequency(69) - 440.0).abs() < 1e-3);
    }

    #[test]
    fn octaves_double() {
        assert!((midi_to_frequency(81) - 880.0).abs() < 1e-2);
        assert!((midi_to_frequency(57) - 220.0).abs() < 1e-3);
    }

    #[test]
    fn middle_c() {
        assert!((midi_to_frequency(60) - 261.6256).abs() < 1e-2);
    }

    #[test]
    fn detune_100_cents_is_one_semitone() {
        let up = midi_to_frequency(69) * detune_ratio(100.0);
        assert!((up - midi_to_frequency(70)).abs() < 1e-2);
        assert_eq!(detune_ratio(0.0), 1.0);
        assert_eq!(detune_ratio(f32::NAN), 1.0);
    }

    #[test]
    fn semitone_ratio_octave() {
        assert!((semitone_ratio(12.0) - 2.0).abs() < 1e-5);
        assert!((semitone_ratio(-12.0) - 0.5).abs() < 1e-5);
    }
}
