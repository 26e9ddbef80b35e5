//! Master-bus dynamics compressor.
//!
//! A feed-forward soft-knee compressor with separate attack and release
//! smoothing of the gain reduction. It sits between the voice sum and the
//! master gain on both the live and offline buses.

use serde::{Deserialize, Serialize};

/// Compressor settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Level (dBFS) where compression begins.
    pub threshold_db: f32,
    /// Width (dB) of the soft knee centered on the threshold.
    pub knee_db: f32,
    /// Input/output slope above the knee.
    pub ratio: f32,
    /// Seconds for the gain reduction to rise.
    pub attack: f32,
    /// Seconds for the gain reduction to recover.
    pub release: f32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self { threshold_db: -3.0, knee_db: 6.0, ratio: 12.0, attack: 0.003, release: 0.25 }
    }
}

impl LimiterConfig {
    /// Static gain reduction (positive dB) for an input level.
    pub fn gain_reduction_db(&self, level_db: f32) -> f32 {
        let ratio = self.ratio.max(1.0);
        let knee = self.knee_db.max(0.0);
        let over = level_db - self.threshold_db;
        let slope = 1.0 - 1.0 / ratio;
        if 2.0 * over < -knee {
            0.0
        } else if knee > 0.0 && 2.0 * over.abs() <= knee {
            let x = over + knee / 2.0;
            slope * x * x / (2.0 * knee)
        } else {
            slope * over
        }
    }
}

fn smoothing(seconds: f32, sample_rate: u32) -> f32 {
    let samples = seconds.max(0.0) * sample_rate as f32;
    if samples < 1.0 { 0.0 } else { (-1.0 / samples).exp() }
}

fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.max(1e-6).log10()
}

/// Running compressor state.
#[derive(Clone, Debug)]
pub struct Limiter {
    config: LimiterConfig,
    attack_coeff: f32,
    release_coeff: f32,
    reduction_db: f32,
}

impl Limiter {
    pub fn new(config: LimiterConfig, sample_rate: u32) -> Self {
        Self {
            config,
            attack_coeff: smoothing(config.attack, sample_rate),
            release_coeff: smoothing(config.release, sample_rate),
            reduction_db: 0.0,
        }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Current smoothed gain reduction in dB.
    pub fn reduction_db(&self) -> f32 {
        self.reduction_db
    }

    /// Compress `block` in place.
    pub fn process(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            let target = self.config.gain_reduction_db(gain_to_db(sample.abs()));
            let coeff = if target > self.reduction_db { self.attack_coeff } else { self.release_coeff };
            self.reduction_db = target + coeff * (self.reduction_db - target);
            *sample *= db_to_gain(-self.reduction_db);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_signal_passes_untouched() {
        let mut limiter = Limiter::new(LimiterConfig::default(), 44100);
        let mut block = vec![0.1f32; 512];
        limiter.process(&mut block);
        assert!(block.iter().all(|&s| (s - 0.1).abs() < 1e-6));
    }

    #[test]
    fn static_curve_is_continuous_at_knee_edges() {
        let cfg = LimiterConfig::default();
        assert_eq!(cfg.gain_reduction_db(-10.0), 0.0);
        assert!(cfg.gain_reduction_db(-6.0).abs() < 1e-6);
        let upper = cfg.gain_reduction_db(0.0);
        let slope = 1.0 - 1.0 / cfg.ratio;
        assert!((upper - slope * 3.0).abs() < 1e-4);
    }

    #[test]
    fn loud_signal_is_reduced() {
        let mut limiter = Limiter::new(LimiterConfig::default(), 44100);
        let mut block = vec![2.0f32; 4410];
        limiter.process(&mut block);
        let last = *block.last().unwrap();
        assert!(last < 1.0, "last sample {}", last);
        assert!(limiter.reduction_db() > 6.0);
    }

    #[test]
    fn ratio_below_one_is_treated_as_unity() {
        let cfg = LimiterConfig { ratio: 0.5, ..LimiterConfig::default() };
        assert_eq!(cfg.gain_reduction_db(20.0), 0.0);
    }
}
