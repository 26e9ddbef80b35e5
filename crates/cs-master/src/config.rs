//! Engine configuration.

use std::time::Duration;

use cs_engine::{LimiterConfig, DEFAULT_LOOKAHEAD};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Default seed for the noise generators.
pub const DEFAULT_NOISE_SEED: u64 = 0x8B17_C41F;

/// Tunables for live playback and offline rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate of offline renders.
    pub render_sample_rate: u32,
    /// Channel count of offline renders.
    pub render_channels: u16,
    /// Seconds of audio the live scheduler queues ahead of the clock.
    pub lookahead_secs: f64,
    /// Sleep between scheduling ticks.
    pub schedule_interval_ms: u64,
    /// Sleep between visual-sync ticks.
    pub visual_interval_ms: u64,
    pub master_volume: f32,
    pub noise_seed: u64,
    pub limiter: LimiterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            render_sample_rate: 44100,
            render_channels: 2,
            lookahead_secs: DEFAULT_LOOKAHEAD,
            schedule_interval_ms: 25,
            visual_interval_ms: 16,
            master_volume: 0.8,
            noise_seed: DEFAULT_NOISE_SEED,
            limiter: LimiterConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a config, filling unspecified fields with defaults.
    pub fn from_json(data: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_millis(self.schedule_interval_ms.max(1))
    }

    pub fn visual_interval(&self) -> Duration {
        Duration::from_millis(self.visual_interval_ms.max(1))
    }
}
