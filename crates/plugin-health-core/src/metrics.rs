//! Global atomic counters for the probe and score engines.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (the engines do so at the end of each pass).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    probes_executed: AtomicU64,
    probes_skipped: AtomicU64,
    probes_failed: AtomicU64,
    plugins_processed: AtomicU64,
    scores_computed: AtomicU64,
    scores_reused: AtomicU64,
    save_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn bump(counter: &AtomicU64, name: &'static str) {
    counter.fetch_add(1, Ordering::Relaxed);
    tracing::trace!(metric = name, "counter incremented");
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            probes_executed: AtomicU64::new(0),
            probes_skipped: AtomicU64::new(0),
            probes_failed: AtomicU64::new(0),
            plugins_processed: AtomicU64::new(0),
            scores_computed: AtomicU64::new(0),
            scores_reused: AtomicU64::new(0),
            save_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_probes_executed(&self) {
        bump(&self.probes_executed, "probes_executed");
    }

    pub fn inc_probes_skipped(&self) {
        bump(&self.probes_skipped, "probes_skipped");
    }

    pub fn inc_probes_failed(&self) {
        bump(&self.probes_failed, "probes_failed");
    }

    pub fn inc_plugins_processed(&self) {
        bump(&self.plugins_processed, "plugins_processed");
    }

    pub fn inc_scores_computed(&self) {
        bump(&self.scores_computed, "scores_computed");
    }

    pub fn inc_scores_reused(&self) {
        bump(&self.scores_reused, "scores_reused");
    }

    pub fn inc_save_failures(&self) {
        bump(&self.save_failures, "save_failures");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            probes_executed = self.probes_executed(),
            probes_skipped = self.probes_skipped(),
            probes_failed = self.probes_failed(),
            plugins_processed = self.plugins_processed(),
            scores_computed = self.scores_computed(),
            scores_reused = self.scores_reused(),
            save_failures = self.save_failures(),
        );
    }

    pub fn probes_executed(&self) -> u64 {
        self.probes_executed.load(Ordering::Relaxed)
    }

    pub fn probes_skipped(&self) -> u64 {
        self.probes_skipped.load(Ordering::Relaxed)
    }

    pub fn probes_failed(&self) -> u64 {
        self.probes_failed.load(Ordering::Relaxed)
    }

    pub fn plugins_processed(&self) -> u64 {
        self.plugins_processed.load(Ordering::Relaxed)
    }

    pub fn scores_computed(&self) -> u64 {
        self.scores_computed.load(Ordering::Relaxed)
    }

    pub fn scores_reused(&self) -> u64 {
        self.scores_reused.load(Ordering::Relaxed)
    }

    pub fn save_failures(&self) -> u64 {
        self.save_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for c in [
            &self.probes_executed,
            &self.probes_skipped,
            &self.probes_failed,
            &self.plugins_processed,
            &self.scores_computed,
            &self.scores_reused,
            &self.save_failures,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}
