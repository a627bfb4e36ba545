//! PID controller - filtered measurement, anti-windup, smoothed output

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::plant::{NoiseSource, ProcessParameters};

// ============================================================================
// CONTROLLER TUNING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerTuning {
    /// Proportional gain, Kc. Any sign.
    pub proportional_gain: f64,
    /// Integral time, Ti, minutes. Zero disables integral action.
    pub integral_time: f64,
    /// Derivative time, Td, minutes. Zero disables derivative action.
    pub derivative_time: f64,
}

impl Default for ControllerTuning {
    fn default() -> Self {
        Self {
            proportional_gain: 0.5,
            integral_time: 1.0,
            derivative_time: 0.1,
        }
    }
}

impl ControllerTuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.proportional_gain.is_finite() {
            return Err(ConfigError::NotFinite("proportional_gain"));
        }
        if !self.integral_time.is_finite() {
            return Err(ConfigError::NotFinite("integral_time"));
        }
        if !self.derivative_time.is_finite() {
            return Err(ConfigError::NotFinite("derivative_time"));
        }
        if self.integral_time < 0.0 {
            return Err(ConfigError::OutOfRange("integral_time"));
        }
        if self.derivative_time < 0.0 {
            return Err(ConfigError::OutOfRange("derivative_time"));
        }
        Ok(())
    }
}

// ============================================================================
// CONTROLLER STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    /// Integral accumulator, clamped to the anti-windup bound.
    pub integral: f64,
    /// Most recent error, retained for diagnostics.
    pub last_error: f64,
    /// Exponentially smoothed process variable.
    pub filtered_pv: f64,
    /// Previous smoothed output, pre-clamp.
    pub last_output: f64,
}

// ============================================================================
// PID CONTROLLER
// ============================================================================

/// Discrete PID with measurement filtering, integral anti-windup, deadband
/// attenuation and output smoothing. The derivative acts on the filtered
/// measurement with a negative sign, damping level movement rather than
/// reacting to setpoint changes.
pub struct PidController {
    state: ControllerState,
}

impl PidController {
    pub fn new(initial_pv: f64) -> Self {
        Self {
            state: ControllerState {
                integral: 0.0,
                last_error: 0.0,
                filtered_pv: initial_pv,
                last_output: 0.0,
            },
        }
    }

    /// Run one evaluation. `dt` is elapsed wall time in seconds and must be
    /// positive; the caller skips ticks whose clock did not advance.
    /// Returns the control output clamped to [0, 100].
    pub fn compute(
        &mut self,
        measured_pv: f64,
        setpoint: f64,
        dt: f64,
        tuning: &ControllerTuning,
        params: &ProcessParameters,
        noise: &mut dyn NoiseSource,
    ) -> f64 {
        let fc = params.filter_coeff;
        let filtered_pv = fc * measured_pv + (1.0 - fc) * self.state.filtered_pv;
        let error = setpoint - filtered_pv;

        let kc = tuning.proportional_gain;
        let ti = tuning.integral_time;
        let td = tuning.derivative_time;

        let p = kc * error;

        // Kc*Ti == 0 leaves the accumulator untouched; the bound 100/(Kc*Ti)
        // is undefined there and the integral term contributes nothing.
        let i = if kc * ti != 0.0 {
            let max_integral = (100.0 / (kc * ti)).abs();
            self.state.integral =
                (self.state.integral + error * dt).clamp(-max_integral, max_integral);
            kc * self.state.integral / ti
        } else {
            0.0
        };

        let d_error = (filtered_pv - self.state.filtered_pv) / dt;
        let d = -td * kc * d_error;

        self.state.filtered_pv = filtered_pv;
        self.state.last_error = error;

        let mut output = (p + i + d) * params.static_gain;

        if params.deadband > 0.0 && error.abs() < params.deadband {
            output *= error.abs() / params.deadband;
        }

        output += noise.uniform() * params.sensor_noise * fc + params.load * fc;

        let smoothed = fc * output + (1.0 - fc) * self.state.last_output;
        self.state.last_output = smoothed;

        smoothed.clamp(0.0, 100.0)
    }

    pub fn last_error(&self) -> f64 {
        self.state.last_error
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn restore(&mut self, state: ControllerState) {
        self.state = state;
    }

    /// Accumulator reset applied when tuning or process parameters change.
    /// The measurement and output filters keep their values so the loop
    /// resumes without a bump.
    pub fn reset_accumulators(&mut self) {
        self.state.integral = 0.0;
        self.state.last_error = 0.0;
    }

    /// Full reset applied when the loop starts.
    pub fn reset(&mut self, initial_pv: f64) {
        self.state = ControllerState {
            integral: 0.0,
            last_error: 0.0,
            filtered_pv: initial_pv,
            last_output: 0.0,
        };
    }
}
