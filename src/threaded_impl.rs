//! Threaded scheduler - the control loop on a dedicated OS thread

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};

use crate::config::ConfigError;
use crate::controller::ControllerTuning;
use crate::driver::{LoopDriver, Mode, SimulationState, TickSample};
use crate::ipc::{EventLog, LoopCommand, SharedSnapshot};
use crate::metrics::{LoopStats, TickMetrics};
use crate::plant::ProcessParameters;

/// Spawn the loop on its own thread. Commands are drained between ticks, the
/// actual elapsed time between iterations feeds the integration, and the
/// thread sleeps away whatever remains of the nominal period. Set the stats'
/// shutdown flag to wind the thread down.
pub fn spawn_loop_thread(
    mut driver: LoopDriver,
    commands: Receiver<LoopCommand>,
    snapshot: SharedSnapshot,
    log: EventLog,
    metrics: TickMetrics,
    period: Duration,
) -> (thread::JoinHandle<()>, Arc<LoopStats>) {
    let stats = LoopStats::new();
    let stats_clone = stats.clone();

    let handle = thread::spawn(move || {
        let run_start = Instant::now();
        let mut last_tick = Instant::now();

        loop {
            if stats_clone.shutdown.load(Ordering::Relaxed) {
                log.write(run_start.elapsed().as_secs_f64(), "[LOOP] Shutting down");
                break;
            }

            // Apply queued intents before evaluating, never mid-tick.
            loop {
                match commands.try_recv() {
                    Ok(command) => {
                        let elapsed = run_start.elapsed().as_secs_f64();
                        describe_command(&log, elapsed, &command);
                        if let Err(err) = driver.apply(command) {
                            log.write(elapsed, &format!("[LOOP] Config rejected: {}", err));
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        log.write(
                            run_start.elapsed().as_secs_f64(),
                            "[LOOP] Command channel closed",
                        );
                        stats_clone.shutdown.store(true, Ordering::Relaxed);
                        break;
                    }
                }
            }

            let cycle_start = Instant::now();
            let dt = cycle_start.duration_since(last_tick).as_secs_f64();
            last_tick = cycle_start;
            metrics.record_cycle_jitter((dt * 1e9) as u64);

            if driver.tick(dt) {
                stats_clone.total_ticks.fetch_add(1, Ordering::Relaxed);

                let eval = cycle_start.elapsed();
                metrics.record_eval(eval);
                if eval > period {
                    stats_clone.overrun_ticks.fetch_add(1, Ordering::Relaxed);
                    log.write(
                        run_start.elapsed().as_secs_f64(),
                        &format!("[LOOP] Tick overran its {:?} period ({:?})", period, eval),
                    );
                }

                let state = driver.snapshot();
                let ticks = stats_clone.total_ticks.load(Ordering::Relaxed);
                if ticks % 50 == 0 {
                    log.write(
                        run_start.elapsed().as_secs_f64(),
                        &format!(
                            "[LOOP] Tick #{:<5} PV: {:.2}, SP: {:.2}, LCV: {:.2} ({})",
                            ticks,
                            state.process_variable,
                            state.setpoint,
                            state.control_output,
                            state.mode
                        ),
                    );
                }
            } else if driver.snapshot().running {
                stats_clone.skipped_ticks.fetch_add(1, Ordering::Relaxed);
            }

            snapshot.set(driver.snapshot());

            let elapsed = cycle_start.elapsed();
            if elapsed < period {
                thread::sleep(period - elapsed);
            }
        }
    });

    (handle, stats)
}

fn describe_command(log: &EventLog, elapsed: f64, command: &LoopCommand) {
    match command {
        LoopCommand::Start => log.write(elapsed, "[LOOP] Start"),
        LoopCommand::Stop => log.write(elapsed, "[LOOP] Stop"),
        LoopCommand::SetMode(mode) => log.write(elapsed, &format!("[LOOP] Mode -> {}", mode)),
        LoopCommand::SetSetpoint(value) => {
            log.write(elapsed, &format!("[LOOP] Setpoint -> {:.4}", value))
        }
        LoopCommand::SetManualOutput(value) => {
            log.write(elapsed, &format!("[LOOP] Manual output -> {:.2}", value))
        }
        LoopCommand::SetTuning(_) => log.write(elapsed, "[LOOP] Tuning update"),
        LoopCommand::SetProcessParams(_) => log.write(elapsed, "[LOOP] Process parameter update"),
        LoopCommand::Subscribe(_) => log.write(elapsed, "[LOOP] Subscriber attached"),
    }
}

// ============================================================================
// LOOP HANDLE - Client side of the command channel
// ============================================================================

/// What the display layer holds: a way to submit intents and a consistent
/// snapshot to read. Configuration is validated here so the caller learns of
/// a rejection immediately; the driver re-checks on apply.
#[derive(Clone)]
pub struct LoopHandle {
    commands: Sender<LoopCommand>,
    snapshot: SharedSnapshot,
}

impl LoopHandle {
    pub fn new(commands: Sender<LoopCommand>, snapshot: SharedSnapshot) -> Self {
        Self { commands, snapshot }
    }

    pub fn start(&self) {
        let _ = self.commands.send(LoopCommand::Start);
    }

    pub fn stop(&self) {
        let _ = self.commands.send(LoopCommand::Stop);
    }

    pub fn set_mode(&self, mode: Mode) {
        let _ = self.commands.send(LoopCommand::SetMode(mode));
    }

    pub fn set_setpoint(&self, value: f64) {
        let _ = self.commands.send(LoopCommand::SetSetpoint(value));
    }

    pub fn set_manual_output(&self, value: f64) {
        let _ = self.commands.send(LoopCommand::SetManualOutput(value));
    }

    pub fn set_tuning(&self, tuning: ControllerTuning) -> Result<(), ConfigError> {
        tuning.validate()?;
        let _ = self.commands.send(LoopCommand::SetTuning(tuning));
        Ok(())
    }

    pub fn set_process_params(&self, params: ProcessParameters) -> Result<(), ConfigError> {
        params.validate()?;
        let _ = self.commands.send(LoopCommand::SetProcessParams(params));
        Ok(())
    }

    /// Receive one sample per tick. The channel holds at most `capacity`
    /// pending samples; the loop never blocks on a slow subscriber.
    pub fn subscribe(&self, capacity: usize) -> Receiver<TickSample> {
        let (tx, rx) = bounded(capacity.max(1));
        let _ = self.commands.send(LoopCommand::Subscribe(tx));
        rx
    }

    pub fn snapshot(&self) -> SimulationState {
        self.snapshot.get()
    }
}
