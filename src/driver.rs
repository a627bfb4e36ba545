//! Loop driver - owns the simulation state machine and composes the
//! controller and plant once per tick

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::controller::{ControllerState, ControllerTuning, PidController};
use crate::ipc::{LoopCommand, TrendBuffer};
use crate::plant::{NoiseSource, PlantModel, ProcessParameters};

/// Depth of the rolling trend history, matching the 100-sample charts the
/// display layer draws.
pub const TREND_DEPTH: usize = 100;

// ============================================================================
// SIMULATION STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Automatic,
    Manual,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Automatic => write!(f, "Automatic"),
            Mode::Manual => write!(f, "Manual"),
        }
    }
}

/// Source of truth for the loop, doubling as the read-only snapshot handed
/// to display layers. All levels stay within [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub process_variable: f64,
    pub setpoint: f64,
    pub control_output: f64,
    pub mode: Mode,
    pub running: bool,
}

/// One completed tick, broadcast to subscribers and kept in the trend buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickSample {
    pub tick: u64,
    /// Simulation-clock seconds accumulated from tick deltas.
    pub elapsed: f64,
    pub process_variable: f64,
    pub setpoint: f64,
    pub control_output: f64,
}

/// Serializable image of a paused simulation. Restoring one and replaying
/// the same inputs through an equivalently seeded noise source reproduces
/// the run bit-for-bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub sim_time: f64,
    pub tick_count: u64,
    pub simulation: SimulationState,
    pub controller: ControllerState,
    pub tuning: ControllerTuning,
    pub params: ProcessParameters,
    pub plant: PlantModel,
}

// ============================================================================
// LOOP DRIVER
// ============================================================================

/// Owns the tick state machine. The scheduler on top supplies real elapsed
/// time per tick; the driver itself never reads a clock, which keeps it
/// deterministic under test.
pub struct LoopDriver {
    tuning: ControllerTuning,
    params: ProcessParameters,
    state: SimulationState,
    controller: PidController,
    plant: PlantModel,
    noise: Box<dyn NoiseSource>,
    subscribers: Vec<Sender<TickSample>>,
    trend: TrendBuffer,
    sim_time: f64,
    tick_count: u64,
}

impl LoopDriver {
    pub fn new(
        tuning: ControllerTuning,
        params: ProcessParameters,
        setpoint: f64,
        noise: Box<dyn NoiseSource>,
    ) -> Result<Self, ConfigError> {
        tuning.validate()?;
        params.validate()?;
        Ok(Self {
            tuning,
            params,
            state: SimulationState {
                process_variable: params.initial_pv,
                setpoint: setpoint.clamp(0.0, 100.0),
                control_output: 0.0,
                mode: Mode::Automatic,
                running: false,
            },
            controller: PidController::new(params.initial_pv),
            plant: PlantModel::new(),
            noise,
            subscribers: Vec::new(),
            trend: TrendBuffer::new(TREND_DEPTH),
            sim_time: 0.0,
            tick_count: 0,
        })
    }

    pub fn with_defaults(noise: Box<dyn NoiseSource>) -> Self {
        // Defaults always validate.
        match Self::new(
            ControllerTuning::default(),
            ProcessParameters::default(),
            46.7681,
            noise,
        ) {
            Ok(driver) => driver,
            Err(_) => unreachable!("default configuration is valid"),
        }
    }

    // ------------------------------------------------------------------
    // Operator intents
    // ------------------------------------------------------------------

    /// Begin ticking. Controller state is rebuilt from scratch so a stale
    /// integral or filter value from a previous run cannot kick the output.
    pub fn start(&mut self) {
        if self.state.running {
            return;
        }
        self.controller.reset(self.params.initial_pv);
        self.plant.clear_pending();
        self.state.process_variable = self.params.initial_pv;
        self.state.running = true;
    }

    /// Halt ticking, force the level back to `initial_pv`, cancel pending
    /// deadtime applications and clear the trend history. Idempotent.
    pub fn stop(&mut self) {
        self.state.running = false;
        self.state.process_variable = self.params.initial_pv;
        self.plant.clear_pending();
        self.trend.clear();
    }

    /// Switch between automatic and manual. Deliberately does not reset
    /// controller state; only tuning/parameter changes do.
    pub fn set_mode(&mut self, mode: Mode) {
        self.state.mode = mode;
    }

    /// Move the setpoint. Effective only in automatic mode.
    pub fn set_setpoint(&mut self, value: f64) {
        if self.state.mode == Mode::Automatic {
            self.state.setpoint = value.clamp(0.0, 100.0);
        }
    }

    /// Drive the output and level directly. Effective only in manual mode.
    pub fn set_manual_output(&mut self, value: f64) {
        if self.state.mode == Mode::Manual {
            let clamped = value.clamp(0.0, 100.0);
            self.state.control_output = clamped;
            self.state.process_variable = clamped;
        }
    }

    /// Replace the tuning. Refused (previous tuning retained) when invalid;
    /// on success the integral accumulator and last error are cleared.
    pub fn set_tuning(&mut self, tuning: ControllerTuning) -> Result<(), ConfigError> {
        tuning.validate()?;
        self.tuning = tuning;
        self.controller.reset_accumulators();
        Ok(())
    }

    /// Replace the process parameters with the same refuse-and-retain
    /// contract. While stopped, a changed `initial_pv` re-seeds the level.
    pub fn set_process_params(&mut self, params: ProcessParameters) -> Result<(), ConfigError> {
        params.validate()?;
        self.params = params;
        self.controller.reset_accumulators();
        if !self.state.running {
            self.state.process_variable = params.initial_pv;
            self.trend.clear();
        }
        Ok(())
    }

    /// Dispatch a queued operator intent. Shared by both scheduler
    /// front-ends so threaded and async hosts behave identically.
    pub fn apply(&mut self, command: LoopCommand) -> Result<(), ConfigError> {
        match command {
            LoopCommand::Start => self.start(),
            LoopCommand::Stop => self.stop(),
            LoopCommand::SetMode(mode) => self.set_mode(mode),
            LoopCommand::SetSetpoint(value) => self.set_setpoint(value),
            LoopCommand::SetManualOutput(value) => self.set_manual_output(value),
            LoopCommand::SetTuning(tuning) => self.set_tuning(tuning)?,
            LoopCommand::SetProcessParams(params) => self.set_process_params(params)?,
            LoopCommand::Subscribe(tx) => self.add_subscriber(tx),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> SimulationState {
        self.state
    }

    pub fn tuning(&self) -> ControllerTuning {
        self.tuning
    }

    pub fn params(&self) -> ProcessParameters {
        self.params
    }

    pub fn controller_state(&self) -> ControllerState {
        self.controller.state()
    }

    /// Handle to the rolling history this driver maintains.
    pub fn trend(&self) -> TrendBuffer {
        self.trend.clone()
    }

    /// Register a per-tick sample receiver. Samples are sent without
    /// blocking; a full channel drops the sample, a disconnected receiver is
    /// pruned on the next tick.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<TickSample> {
        let (tx, rx) = bounded(capacity.max(1));
        self.subscribers.push(tx);
        rx
    }

    pub fn add_subscriber(&mut self, tx: Sender<TickSample>) {
        self.subscribers.push(tx);
    }

    // ------------------------------------------------------------------
    // Tick evaluation
    // ------------------------------------------------------------------

    /// Advance the loop by `dt` seconds of real elapsed time. Returns false
    /// without touching state when stopped or when the clock did not advance.
    pub fn tick(&mut self, dt: f64) -> bool {
        if !self.state.running || !dt.is_finite() || dt <= 0.0 {
            return false;
        }
        self.sim_time += dt;
        self.tick_count += 1;

        if self.state.mode == Mode::Automatic {
            let output = self.controller.compute(
                self.state.process_variable,
                self.state.setpoint,
                dt,
                &self.tuning,
                &self.params,
                self.noise.as_mut(),
            );
            self.state.control_output = output;
            self.state.process_variable = self.plant.advance(
                self.state.process_variable,
                output,
                dt,
                self.sim_time,
                &self.params,
                self.noise.as_mut(),
            );
        }
        // Manual mode: level and output stay wherever the operator put them;
        // the tick only records history.

        let sample = TickSample {
            tick: self.tick_count,
            elapsed: self.sim_time,
            process_variable: self.state.process_variable,
            setpoint: self.state.setpoint,
            control_output: self.state.control_output,
        };
        self.trend.push(sample);
        self.subscribers.retain(|tx| match tx.try_send(sample) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        true
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub fn save(&self) -> SavedState {
        SavedState {
            sim_time: self.sim_time,
            tick_count: self.tick_count,
            simulation: self.state,
            controller: self.controller.state(),
            tuning: self.tuning,
            params: self.params,
            plant: self.plant.clone(),
        }
    }

    /// Install a previously saved simulation image. The configuration inside
    /// is validated the same way live updates are; the noise source already
    /// injected into this driver is kept.
    pub fn restore(&mut self, saved: SavedState) -> Result<(), ConfigError> {
        saved.tuning.validate()?;
        saved.params.validate()?;
        self.tuning = saved.tuning;
        self.params = saved.params;
        self.state = saved.simulation;
        self.controller.restore(saved.controller);
        self.plant = saved.plant;
        self.sim_time = saved.sim_time;
        self.tick_count = saved.tick_count;
        Ok(())
    }
}
