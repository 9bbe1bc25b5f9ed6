// Dispatch metrics
//
// Lightweight counters kept per run loop, so the cost of cross-thread posting
// can be checked in logs without a profiler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-run-loop dispatch counters
///
/// Uses relaxed atomics: the numbers are for logging, not for synchronization.
#[derive(Debug)]
pub struct DispatchMetrics {
    /// Tasks handed to `post` (every mode)
    pub posted: AtomicU64,

    /// Tasks executed synchronously by the `Auto` fast path
    pub executed_inline: AtomicU64,

    /// Tasks executed from the loop queue
    pub executed_queued: AtomicU64,

    /// Tasks resolved with `ThreadUnavailable` because the loop had stopped
    pub abandoned: AtomicU64,

    /// Tasks whose closure panicked
    pub panicked: AtomicU64,

    /// Loop creation time
    start_time: Instant,
}

impl DispatchMetrics {
    /// Create a zeroed set of counters
    pub fn new() -> Self {
        Self {
            posted: AtomicU64::new(0),
            executed_inline: AtomicU64::new(0),
            executed_queued: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_posted(&self) {
        self.posted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inline(&self) {
        self.executed_inline.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.executed_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self, count: u64) {
        self.abandoned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Total number of tasks that have run, inline or queued
    pub fn executed(&self) -> u64 {
        self.executed_inline.load(Ordering::Relaxed) + self.executed_queued.load(Ordering::Relaxed)
    }

    /// Time since the loop was created
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log a one-shot summary, typically when the loop stops
    pub fn log_summary(&self, loop_name: &str) {
        tracing::info!(
            "Run loop '{}' metrics: {} posted, {} inline, {} queued, {} abandoned, {} panicked, uptime {:.2}s",
            loop_name,
            self.posted.load(Ordering::Relaxed),
            self.executed_inline.load(Ordering::Relaxed),
            self.executed_queued.load(Ordering::Relaxed),
            self.abandoned.load(Ordering::Relaxed),
            self.panicked.load(Ordering::Relaxed),
            self.uptime().as_secs_f64()
        );
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}
