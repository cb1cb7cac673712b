// crates/mtp-sim/src/sim/config.rs

use crate::error::ConfigError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "simconfig.json";

const DEFAULT_UPDATE_INTERVAL_MS: u64 = 1000;

/// Tunables of the simulation engine.
///
/// Stored as camelCase JSON. PascalCase keys written by older tools are
/// accepted on load; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationConfig {
    /// Time between two ticks, in milliseconds.
    #[serde(alias = "UpdateIntervalMs")]
    pub update_interval_ms: f64,
    /// Half-width of the uniform noise added to every generated value.
    #[serde(alias = "NoiseAmplitude")]
    pub noise_amplitude: f64,
    /// Step for ramp signals. The sine generator does not use it.
    #[serde(alias = "RampStep")]
    pub ramp_step: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS as f64,
            noise_amplitude: 0.1,
            ramp_step: 0.5,
        }
    }
}

impl SimulationConfig {
    /// Reads a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Reads a config file, falling back to defaults if it is missing or corrupt.
    /// Never fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                "[Config] {} not found, using default simulation settings",
                path.display()
            );
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "[Config] Could not read {} ({}), using default simulation settings",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Writes the config as indented JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// The tick interval. Non-finite or sub-millisecond settings are clamped to 1 ms;
    /// settings too large for a `Duration` fall back to the default interval.
    pub fn update_interval(&self) -> Duration {
        let ms = self.update_interval_ms;
        if !ms.is_finite() || ms < 1.0 {
            return Duration::from_millis(1);
        }
        match Duration::try_from_secs_f64(ms / 1000.0) {
            Ok(interval) => interval,
            Err(_) => {
                warn!(
                    "[Config] Update interval of {} ms is out of range, using {} ms",
                    ms, DEFAULT_UPDATE_INTERVAL_MS
                );
                Duration::from_millis(DEFAULT_UPDATE_INTERVAL_MS)
            }
        }
    }

    /// Noise half-width; negative settings count by magnitude.
    pub fn noise(&self) -> f64 {
        if self.noise_amplitude.is_finite() {
            self.noise_amplitude.abs()
        } else {
            0.0
        }
    }
}
