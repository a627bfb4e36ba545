use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::bounded;

use tank_level_sim::async_impl::loop_task;
use tank_level_sim::visualization::render_trend_chart;
use tank_level_sim::{
    load_config, spawn_loop_thread, EventLog, LoopDriver, LoopHandle, LoopStats, SeededNoise,
    SharedSnapshot, SimConfig, TickMetrics, TrendBuffer,
};

fn main() {
    println!("==========================================");
    println!("Starting Liquid Level Control Simulation");
    println!("==========================================\n");

    let use_async = std::env::args().any(|arg| arg == "--async");
    let cfg = load_config("config/simulation.toml");

    let noise = Box::new(SeededNoise::new(cfg.noise_seed));
    let driver = match LoopDriver::new(cfg.tuning, cfg.process, cfg.setpoint, noise) {
        Ok(driver) => driver,
        Err(err) => {
            println!("[FATAL] Invalid configuration: {}", err);
            return;
        }
    };

    let trend = driver.trend();
    let snapshot = SharedSnapshot::new(driver.snapshot());
    let log = EventLog::new(2000);
    let metrics = TickMetrics::new();
    let (command_tx, command_rx) = bounded(64);
    let handle = LoopHandle::new(command_tx, snapshot.clone());
    let period = Duration::from_millis(cfg.tick_period_ms);

    if use_async {
        println!("[MAIN] Scheduler: tokio interval\n");
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
        {
            Ok(rt) => rt,
            Err(err) => {
                // The one fatal startup condition: no timer environment.
                println!("[FATAL] Could not start the tick scheduler: {}", err);
                return;
            }
        };

        let stats = LoopStats::new();
        runtime.spawn(loop_task(
            driver,
            command_rx,
            snapshot,
            log.clone(),
            metrics.clone(),
            stats.clone(),
            period,
        ));

        run_session(&handle, &trend, &cfg);
        stats.shutdown.store(true, Ordering::Relaxed);
        runtime.shutdown_timeout(Duration::from_secs(1));

        print_report(&stats, &metrics, &log);
    } else {
        println!("[MAIN] Scheduler: dedicated thread\n");
        let (join_handle, stats) = spawn_loop_thread(
            driver,
            command_rx,
            snapshot,
            log.clone(),
            metrics.clone(),
            period,
        );

        run_session(&handle, &trend, &cfg);
        stats.shutdown.store(true, Ordering::Relaxed);
        let _ = join_handle.join();

        print_report(&stats, &metrics, &log);
    }
}

/// Scripted operator session: start, watch the level settle, step the
/// setpoint halfway through, render the trend, stop.
fn run_session(handle: &LoopHandle, trend: &TrendBuffer, cfg: &SimConfig) {
    handle.start();
    println!("[MAIN] Loop running for {} seconds...", cfg.run_seconds);

    let halfway = (cfg.run_seconds / 2).max(1);
    for second in 1..=cfg.run_seconds {
        std::thread::sleep(Duration::from_secs(1));
        let state = handle.snapshot();
        println!(
            "[MAIN] t={:3}s  PV: {:6.2}  SP: {:6.2}  LCV: {:6.2}  ({}{})",
            second,
            state.process_variable,
            state.setpoint,
            state.control_output,
            state.mode,
            if state.running { "" } else { ", stopped" },
        );
        if second == halfway {
            handle.set_setpoint(60.0);
            println!("[MAIN] Setpoint stepped to 60.00");
        }
    }

    // Chart from the driver's history before stop clears it.
    let samples = trend.samples();
    match render_trend_chart(&samples, "trend.png") {
        Ok(()) => println!("\n[MAIN] Trend chart written to trend.png ({} samples)", samples.len()),
        Err(err) => println!("\n[MAIN] Chart rendering failed: {}", err),
    }

    handle.stop();
    std::thread::sleep(Duration::from_millis(300));
    let state = handle.snapshot();
    println!(
        "[MAIN] Stopped, level held at initial PV: {:.2}\n",
        state.process_variable
    );
}

fn print_report(stats: &Arc<LoopStats>, metrics: &TickMetrics, log: &EventLog) {
    let total = stats.total_ticks.load(Ordering::Relaxed);
    let skipped = stats.skipped_ticks.load(Ordering::Relaxed);
    let overruns = stats.overrun_ticks.load(Ordering::Relaxed);

    println!("==========================================");
    println!("FINAL LOOP RESULTS");
    println!("==========================================");
    println!("Ticks evaluated: {}", total);
    println!("Ticks skipped (clock did not advance): {}", skipped);
    println!("Period overruns: {}", overruns);

    let report = metrics.report();
    println!("\n=== Timing ===");
    println!("Eval P50: {:?}, P99: {:?}", report.eval_p50, report.eval_p99);
    println!(
        "Jitter P50: {:?}, P99: {:?}",
        report.jitter_p50, report.jitter_p99
    );

    println!("\n=== Event log (tail) ===");
    let entries = log.read_all();
    let tail = entries.len().saturating_sub(8);
    for entry in &entries[tail..] {
        println!("{}", entry);
    }
}
