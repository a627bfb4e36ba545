//! IPC - operator intents, shared snapshots, trend history, event log

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam::channel::Sender;
use parking_lot::RwLock;

use crate::controller::ControllerTuning;
use crate::driver::{Mode, SimulationState, TickSample};
use crate::plant::ProcessParameters;

// ============================================================================
// LOOP COMMANDS - Intents submitted by the display/operator layer
// ============================================================================

/// Everything the outside world may ask of the loop. Commands are queued and
/// applied between ticks, never mid-evaluation.
#[derive(Clone)]
pub enum LoopCommand {
    Start,
    Stop,
    SetMode(Mode),
    SetSetpoint(f64),
    SetManualOutput(f64),
    SetTuning(ControllerTuning),
    SetProcessParams(ProcessParameters),
    Subscribe(Sender<TickSample>),
}

// ============================================================================
// SHARED SNAPSHOT - Consistent read-only view of the last completed tick
// ============================================================================

#[derive(Clone)]
pub struct SharedSnapshot {
    data: Arc<RwLock<SimulationState>>,
}

impl SharedSnapshot {
    pub fn new(initial: SimulationState) -> Self {
        Self {
            data: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn set(&self, state: SimulationState) {
        *self.data.write() = state;
    }

    pub fn get(&self) -> SimulationState {
        *self.data.read()
    }
}

// ============================================================================
// TREND BUFFER - Rolling history of tick samples for charting
// ============================================================================

#[derive(Clone)]
pub struct TrendBuffer {
    samples: Arc<RwLock<VecDeque<TickSample>>>,
    capacity: usize,
}

impl TrendBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, sample: TickSample) {
        let mut buf = self.samples.write();
        buf.push_back(sample);
        if buf.len() > self.capacity {
            buf.pop_front();
        }
    }

    pub fn samples(&self) -> Vec<TickSample> {
        self.samples.read().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    pub fn clear(&self) {
        self.samples.write().clear();
    }
}

// ============================================================================
// EVENT LOG - Bounded diagnostic log written by the loop
// ============================================================================

#[derive(Clone)]
pub struct EventLog {
    entries: Arc<RwLock<VecDeque<String>>>,
    max_size: usize,
}

impl EventLog {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_size))),
            max_size,
        }
    }

    /// Record an event stamped with elapsed run time in seconds.
    pub fn write(&self, elapsed_secs: f64, message: &str) {
        let mut log = self.entries.write();
        log.push_back(format!("[{:8.3}s] {}", elapsed_secs, message));
        if log.len() > self.max_size {
            log.pop_front();
        }
    }

    pub fn read_all(&self) -> Vec<String> {
        self.entries.read().iter().cloned().collect()
    }
}
