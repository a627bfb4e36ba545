//! Async scheduler - the same control loop on a tokio interval

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, TryRecvError};

use crate::driver::LoopDriver;
use crate::ipc::{EventLog, LoopCommand, SharedSnapshot};
use crate::metrics::{LoopStats, TickMetrics};

/// Drive the loop from a tokio interval for async hosts. Semantics match the
/// threaded scheduler: intents drain between ticks, dt comes from measured
/// elapsed time, and the stats' shutdown flag ends the task.
pub async fn loop_task(
    mut driver: LoopDriver,
    commands: Receiver<LoopCommand>,
    snapshot: SharedSnapshot,
    log: EventLog,
    metrics: TickMetrics,
    stats: Arc<LoopStats>,
    period: Duration,
) {
    let run_start = Instant::now();
    let mut last_tick = Instant::now();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if stats.shutdown.load(Ordering::Relaxed) {
            log.write(run_start.elapsed().as_secs_f64(), "[LOOP] Shutting down");
            break;
        }

        loop {
            match commands.try_recv() {
                Ok(command) => {
                    let elapsed = run_start.elapsed().as_secs_f64();
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
                    stats.shutdown.store(true, Ordering::Relaxed);
                    break;
                }
            }
        }

        let cycle_start = Instant::now();
        let dt = cycle_start.duration_since(last_tick).as_secs_f64();
        last_tick = cycle_start;
        metrics.record_cycle_jitter((dt * 1e9) as u64);

        if driver.tick(dt) {
            stats.total_ticks.fetch_add(1, Ordering::Relaxed);
            let eval = cycle_start.elapsed();
            metrics.record_eval(eval);
            if eval > period {
                stats.overrun_ticks.fetch_add(1, Ordering::Relaxed);
            }
        } else if driver.snapshot().running {
            stats.skipped_ticks.fetch_add(1, Ordering::Relaxed);
        }

        snapshot.set(driver.snapshot());
    }
}
