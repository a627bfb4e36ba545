//! Metrics - tick timing histograms and loop counters

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;

// ============================================================================
// TICK METRICS - Evaluation latency and scheduling jitter
// ============================================================================

#[derive(Clone)]
pub struct TickMetrics {
    eval_hist: Arc<Mutex<Histogram<u64>>>,
    jitter_hist: Arc<Mutex<Histogram<u64>>>,
    last_cycle_ns: Arc<AtomicU64>,
}

impl TickMetrics {
    pub fn new() -> Self {
        Self {
            eval_hist: Arc::new(Mutex::new(Histogram::new(3).unwrap())),
            jitter_hist: Arc::new(Mutex::new(Histogram::new(3).unwrap())),
            last_cycle_ns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record how long one tick evaluation took.
    pub fn record_eval(&self, duration: Duration) {
        self.eval_hist.lock().record(duration.as_nanos() as u64).ok();
    }

    /// Record jitter as the difference between consecutive cycle durations.
    pub fn record_cycle_jitter(&self, cycle_duration_ns: u64) {
        let last = self.last_cycle_ns.swap(cycle_duration_ns, Ordering::Relaxed);
        if last > 0 {
            let jitter = cycle_duration_ns.abs_diff(last);
            self.jitter_hist.lock().record(jitter).ok();
        }
    }

    pub fn report(&self) -> TickReport {
        let eval = self.eval_hist.lock();
        let jitter = self.jitter_hist.lock();

        TickReport {
            eval_p50: Duration::from_nanos(eval.value_at_quantile(0.5)),
            eval_p99: Duration::from_nanos(eval.value_at_quantile(0.99)),
            jitter_p50: Duration::from_nanos(jitter.value_at_quantile(0.5)),
            jitter_p99: Duration::from_nanos(jitter.value_at_quantile(0.99)),
        }
    }
}

impl Default for TickMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct TickReport {
    pub eval_p50: Duration,
    pub eval_p99: Duration,
    pub jitter_p50: Duration,
    pub jitter_p99: Duration,
}

// ============================================================================
// LOOP STATS - Counters shared between the loop and its host
// ============================================================================

pub struct LoopStats {
    /// Ticks that evaluated.
    pub total_ticks: AtomicU64,
    /// Ticks skipped because the clock did not advance while running.
    pub skipped_ticks: AtomicU64,
    /// Evaluations that exceeded the nominal period.
    pub overrun_ticks: AtomicU64,
    /// Set by the host to wind the loop down.
    pub shutdown: AtomicBool,
}

impl LoopStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_ticks: AtomicU64::new(0),
            skipped_ticks: AtomicU64::new(0),
            overrun_ticks: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        })
    }
}
