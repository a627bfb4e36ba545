//! Plant model - first-order process response with deadtime and noise

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

// ============================================================================
// PROCESS PARAMETERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessParameters {
    /// Process gain multiplier applied to the controller output.
    pub static_gain: f64,
    /// First-order time constant, seconds. Must be > 0.
    pub lag: f64,
    /// Transport delay before a computed response reaches the level, seconds.
    pub deadtime: f64,
    /// Constant disturbance added to the controller output.
    pub load: f64,
    /// Error magnitude below which controller output is attenuated.
    pub deadband: f64,
    /// Amplitude of the measurement perturbation.
    pub sensor_noise: f64,
    /// Amplitude of the plant response perturbation.
    pub plant_noise: f64,
    /// Level the simulation holds while stopped, percent of span.
    pub initial_pv: f64,
    /// Smoothing coefficient shared by the measurement filter, the output
    /// low-pass and the plant response. In (0, 1]; lower is smoother.
    pub filter_coeff: f64,
}

impl Default for ProcessParameters {
    fn default() -> Self {
        Self {
            static_gain: 2.5,
            lag: 2.5,
            deadtime: 0.0,
            load: 0.0,
            deadband: 0.0,
            sensor_noise: 0.0,
            plant_noise: 0.0,
            initial_pv: 30.0,
            filter_coeff: 0.2,
        }
    }
}

impl ProcessParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            (self.static_gain, "static_gain"),
            (self.lag, "lag"),
            (self.deadtime, "deadtime"),
            (self.load, "load"),
            (self.deadband, "deadband"),
            (self.sensor_noise, "sensor_noise"),
            (self.plant_noise, "plant_noise"),
            (self.initial_pv, "initial_pv"),
            (self.filter_coeff, "filter_coeff"),
        ];
        for (value, name) in fields {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite(name));
            }
        }
        if self.lag <= 0.0 {
            return Err(ConfigError::OutOfRange("lag"));
        }
        if self.deadtime < 0.0 {
            return Err(ConfigError::OutOfRange("deadtime"));
        }
        if self.deadband < 0.0 {
            return Err(ConfigError::OutOfRange("deadband"));
        }
        if self.sensor_noise < 0.0 {
            return Err(ConfigError::OutOfRange("sensor_noise"));
        }
        if self.plant_noise < 0.0 {
            return Err(ConfigError::OutOfRange("plant_noise"));
        }
        if !(0.0..=100.0).contains(&self.initial_pv) {
            return Err(ConfigError::OutOfRange("initial_pv"));
        }
        if self.filter_coeff <= 0.0 || self.filter_coeff > 1.0 {
            return Err(ConfigError::OutOfRange("filter_coeff"));
        }
        Ok(())
    }
}

// ============================================================================
// NOISE SOURCE - Injectable randomness for reproducible runs
// ============================================================================

/// Zero-mean uniform perturbation source. Injected into the controller and
/// plant so tests can substitute a deterministic generator.
pub trait NoiseSource: Send {
    /// One sample in (-0.5, 0.5).
    fn uniform(&mut self) -> f64;
}

/// Seeded pseudo-random noise.
pub struct SeededNoise {
    rng: StdRng,
}

impl SeededNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl NoiseSource for SeededNoise {
    fn uniform(&mut self) -> f64 {
        self.rng.gen_range(-0.5..0.5)
    }
}

/// Noise-free source.
pub struct NoNoise;

impl NoiseSource for NoNoise {
    fn uniform(&mut self) -> f64 {
        0.0
    }
}

// ============================================================================
// PLANT MODEL - First-order response behind a transport delay
// ============================================================================

/// A level scheduled to become the process variable once its due time on the
/// simulation clock has passed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct PendingLevel {
    due: f64,
    level: f64,
}

/// Simulated tank response. Each `advance` computes a smoothed first-order
/// step toward the controller output and schedules it `deadtime` seconds
/// ahead on an ordered queue; a newer pending level never overtakes an older
/// one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlantModel {
    pending: VecDeque<PendingLevel>,
}

impl PlantModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the plant by `dt` seconds of simulation time ending at `now`.
    /// Returns the process variable after applying every pending level that
    /// has come due, in the order it was scheduled.
    pub fn advance(
        &mut self,
        current_pv: f64,
        control: f64,
        dt: f64,
        now: f64,
        params: &ProcessParameters,
        noise: &mut dyn NoiseSource,
    ) -> f64 {
        let fc = params.filter_coeff;
        let response = (control - current_pv) * (dt / params.lag);
        let wobble = noise.uniform() * params.plant_noise * fc;
        let candidate = current_pv + response + wobble;
        let smoothed = (fc * candidate + (1.0 - fc) * current_pv).clamp(0.0, 100.0);

        self.pending.push_back(PendingLevel {
            due: now + params.deadtime,
            level: smoothed,
        });

        let mut pv = current_pv;
        while let Some(front) = self.pending.front() {
            if front.due > now {
                break;
            }
            if let Some(applied) = self.pending.pop_front() {
                pv = applied.level;
            }
        }
        pv
    }

    /// Cancel every scheduled level that has not yet been applied.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
