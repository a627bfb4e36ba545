pub mod async_impl;
pub mod config;
pub mod controller;
pub mod driver;
pub mod ipc;
pub mod metrics;
pub mod plant;
pub mod threaded_impl;
pub mod visualization;

pub use config::{load_config, ConfigError, SimConfig};
pub use controller::{ControllerState, ControllerTuning, PidController};
pub use driver::{LoopDriver, Mode, SavedState, SimulationState, TickSample, TREND_DEPTH};
pub use ipc::{EventLog, LoopCommand, SharedSnapshot, TrendBuffer};
pub use metrics::{LoopStats, TickMetrics, TickReport};
pub use plant::{NoNoise, NoiseSource, PlantModel, ProcessParameters, SeededNoise};
pub use threaded_impl::{spawn_loop_thread, LoopHandle};
