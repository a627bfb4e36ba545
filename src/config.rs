//! Configuration loading and validation errors

use serde::Deserialize;

use crate::controller::ControllerTuning;
use crate::plant::ProcessParameters;

// ============================================================================
// CONFIG ERROR - Rejected tuning/parameter updates
// ============================================================================

/// Reason a configuration update was refused. The previous configuration
/// stays in effect whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Parameter is NaN or infinite.
    NotFinite(&'static str),
    /// Parameter is outside its allowed range.
    OutOfRange(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFinite(param) => write!(f, "parameter {} is not finite", param),
            ConfigError::OutOfRange(param) => write!(f, "parameter {} is out of range", param),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// RUNTIME CONFIG - TOML file loading
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Nominal tick period of the control loop.
    pub tick_period_ms: u64,
    /// Seed for the injected noise source.
    pub noise_seed: u64,
    /// Demo session length.
    pub run_seconds: u64,
    /// Initial setpoint, percent of span.
    pub setpoint: f64,
    pub tuning: ControllerTuning,
    pub process: ProcessParameters,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 100,
            noise_seed: 42,
            run_seconds: 10,
            setpoint: 46.7681,
            tuning: ControllerTuning::default(),
            process: ProcessParameters::default(),
        }
    }
}

/// Load the simulation config from a TOML file, falling back to defaults
/// when the file is missing or malformed.
pub fn load_config(path: &str) -> SimConfig {
    match std::fs::read_to_string(path) {
        Ok(s) => toml::from_str::<SimConfig>(&s).unwrap_or_default(),
        Err(_) => SimConfig::default(),
    }
}
