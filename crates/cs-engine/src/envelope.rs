//! ADSR envelope shaping.
//!
//! Turns `(start, duration, adsr, peak)` into gain automation: linear
//! attack to the peak, linear decay to the sustain level, a hold, then a
//! linear release to zero. The release never starts before the decay stage
//! has finished, so notes shorter than `attack + decay` still get a complete
//! attack and decay.

use cs_ir::{Adsr, Automation};

/// Breakpoint times (absolute seconds) and levels of one shaped envelope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeShape {
    pub start: f64,
    pub attack_end: f64,
    pub decay_end: f64,
    pub release_start: f64,
    pub release_end: f64,
    pub peak: f32,
    pub sustain_level: f32,
}

/// Offset from note start at which the release ramp begins:
/// `max(duration - release, attack + decay)`.
pub fn release_offset(duration: f64, adsr: &Adsr) -> f64 {
    let adsr = adsr.clamped();
    let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
    let attack_decay = adsr.attack as f64 + adsr.decay as f64;
    (duration - adsr.release as f64).max(attack_decay)
}

/// Compute the envelope breakpoints for one note.
pub fn shape(start: f64, duration: f64, adsr: &Adsr, peak: f32) -> EnvelopeShape {
    let adsr = adsr.clamped();
    let start = if start.is_finite() { start.max(0.0) } else { 0.0 };
    let peak = if peak.is_finite() { peak.max(0.0) } else { 0.0 };
    let attack_end = start + adsr.attack as f64;
    let decay_end = attack_end + adsr.decay as f64;
    let release_start = start + release_offset(duration, &adsr);
    EnvelopeShape {
        start,
        attack_end,
        decay_end,
        release_start,
        release_end: release_start + adsr.release as f64,
        peak,
        sustain_level: peak * adsr.sustain,
    }
}

impl EnvelopeShape {
    /// Gain automation for this shape.
    pub fn automation(&self) -> Automation {
        let mut gain = Automation::new(0.0);
        gain.set_value_at(0.0, self.start)
            .linear_ramp_to(self.peak, self.attack_end)
            .linear_ramp_to(self.sustain_level, self.decay_end)
            .set_value_at(self.sustain_level, self.release_start)
            .linear_ramp_to(0.0, self.release_end);
        gain
    }
}

/// Shape an envelope and return it as gain automation.
pub fn adsr_automation(start: f64, duration: f64, adsr: &Adsr, peak: f32) -> Automation {
    shape(start, duration, adsr, peak).automation()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn long_note_releases_before_end() {
        let adsr = Adsr::new(0.01, 0.1, 0.7, 0.2);
        let s = shape(0.0, 1.0, &adsr, 0.8);
        assert!((s.release_start - 0.8).abs() < 1e-6);
        assert!((s.release_end - 1.0).abs() < 1e-6);
        assert!(close(s.sustain_level, 0.56));
    }

    #[test]
    fn short_note_release_waits_for_decay() {
        let adsr = Adsr::new(0.05, 0.1, 0.5, 0.3);
        for duration in [0.0, 0.01, 0.1, 0.149] {
            let offset = release_offset(duration, &adsr);
            assert!((offset - 0.15).abs() < 1e-6, "duration {} -> {}", duration, offset);
        }
    }

    #[test]
    fn short_note_property_sweep() {
        for a in [0.0f32, 0.001, 0.02, 0.3] {
            for d in [0.0f32, 0.05, 0.4] {
                for r in [0.0f32, 0.1, 1.0] {
                    let adsr = Adsr::new(a, d, 0.6, r);
                    let ad = a as f64 + d as f64;
                    let mut duration = 0.0;
                    while duration < ad {
                        let offset = release_offset(duration, &adsr);
                        assert!((offset - ad).abs() < 1e-6);
                        assert!(offset >= 0.0);
                        duration += 0.01;
                    }
                }
            }
        }
    }

    #[test]
    fn negative_duration_is_clamped() {
        let adsr = Adsr::new(0.01, 0.02, 0.5, 0.1);
        assert!((release_offset(-5.0, &adsr) - 0.03).abs() < 1e-6);
    }

    #[test]
    fn automation_follows_four_segments() {
        let adsr = Adsr::new(0.01, 0.1, 0.7, 0.2);
        let gain = adsr_automation(0.0, 1.0, &adsr, 0.8);
        assert!(close(gain.value_at(0.0), 0.0));
        assert!(close(gain.value_at(0.005), 0.4));
        assert!(close(gain.value_at(0.01), 0.8));
        assert!(close(gain.value_at(0.11), 0.56));
        assert!(close(gain.value_at(0.5), 0.56));
        assert!(close(gain.value_at(0.8), 0.56));
        assert!(close(gain.value_at(0.9), 0.28));
        assert!(close(gain.value_at(1.0), 0.0));
        assert!(close(gain.value_at(2.0), 0.0));
    }

    #[test]
    fn short_note_automation_completes_decay() {
        let adsr = Adsr::new(0.05, 0.1, 0.5, 0.1);
        let gain = adsr_automation(2.0, 0.02, &adsr, 1.0);
        assert!(close(gain.value_at(2.05), 1.0));
        assert!(close(gain.value_at(2.15), 0.5));
        assert!(close(gain.value_at(2.20), 0.25));
        assert!(close(gain.value_at(2.25), 0.0));
    }

    #[test]
    fn zero_attack_starts_at_peak() {
        let adsr = Adsr::new(0.0, 0.1, 0.5, 0.1);
        let gain = adsr_automation(1.0, 1.0, &adsr, 1.0);
        assert!(close(gain.value_at(1.0), 1.0));
    }
}
