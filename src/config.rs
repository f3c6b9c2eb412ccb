// SPDX-License-Identifier: MPL-2.0

//! Startup-time configuration.
//!
//! Every field has a literal default, so an absent or partial JSON file is
//! fine. The file is read once at startup; there is no live reload.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the JSON config file.
pub const CONFIG_ENV: &str = "GPU_GLOW_CONFIG";

/// Which telemetry backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderPreference {
    /// NVML when available, otherwise nvidia-smi.
    #[default]
    Auto,
    Nvml,
    Smi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hardware poll period.
    pub sample_interval_ms: u64,
    /// Animation frame period.
    pub animation_tick_ms: u64,
    /// Upper bound for a single device read.
    pub read_timeout_ms: u64,
    /// Time for one full revolution through the seven colors.
    pub cycle_period_ms: u64,
    /// Cumulative rise from the base temperature that counts as a trend.
    pub rise_threshold_c: f32,
    /// Cumulative fall from the base temperature that counts as a trend.
    pub fall_threshold_c: f32,
    /// Single-tick change that triggers immediately.
    pub sudden_delta_c: f32,
    /// Number of tick-to-tick deltas kept per device.
    pub trend_window: usize,
    /// Counter-trend delta still tolerated inside a continuous trend.
    pub trend_tolerance_c: f32,
    /// Deltas smaller than this let the base temperature follow ambient drift.
    pub flat_band_c: f32,
    /// Consecutive missed reads before a device is dropped.
    pub max_consecutive_failures: u32,
    pub provider: ProviderPreference,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
            animation_tick_ms: 20,
            read_timeout_ms: 800,
            cycle_period_ms: 3000,
            rise_threshold_c: 5.0,
            fall_threshold_c: 5.0,
            sudden_delta_c: 3.0,
            trend_window: 5,
            trend_tolerance_c: 0.5,
            flat_band_c: 1.0,
            max_consecutive_failures: 3,
            provider: ProviderPreference::Auto,
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Config {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = Self::from_json(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".into(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &'static str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        };

        if self.sample_interval_ms == 0 {
            return invalid("sample_interval_ms", "must be greater than zero");
        }
        if self.animation_tick_ms == 0 {
            return invalid("animation_tick_ms", "must be greater than zero");
        }
        if self.read_timeout_ms == 0 {
            return invalid("read_timeout_ms", "must be greater than zero");
        }
        if self.cycle_period_ms == 0 {
            return invalid("cycle_period_ms", "must be greater than zero");
        }
        if self.trend_window == 0 {
            return invalid("trend_window", "must hold at least one delta");
        }
        if self.max_consecutive_failures == 0 {
            return invalid("max_consecutive_failures", "must be at least 1");
        }
        for (field, value) in [
            ("rise_threshold_c", self.rise_threshold_c),
            ("fall_threshold_c", self.fall_threshold_c),
            ("sudden_delta_c", self.sudden_delta_c),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(field, "must be a positive number");
            }
        }
        for (field, value) in [
            ("trend_tolerance_c", self.trend_tolerance_c),
            ("flat_band_c", self.flat_band_c),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(field, "must not be negative");
            }
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn animation_tick(&self) -> Duration {
        Duration::from_millis(self.animation_tick_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn cycle_period(&self) -> Duration {
        Duration::from_millis(self.cycle_period_ms)
    }
}
