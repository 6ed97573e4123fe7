//! Global atomic counters for release runs.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a CLI command).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    runs_started: AtomicU64,
    runs_failed: AtomicU64,
    baselines_promoted: AtomicU64,
    releases_cancelled: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            baselines_promoted: AtomicU64::new(0),
            releases_cancelled: AtomicU64::new(0),
        }
    }

    pub fn inc_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_started", "counter incremented");
    }

    pub fn inc_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_failed", "counter incremented");
    }

    pub fn inc_baselines_promoted(&self) {
        self.baselines_promoted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "baselines_promoted", "counter incremented");
    }

    pub fn inc_releases_cancelled(&self) {
        self.releases_cancelled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "releases_cancelled", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_started = self.runs_started(),
            runs_failed = self.runs_failed(),
            baselines_promoted = self.baselines_promoted(),
            releases_cancelled = self.releases_cancelled(),
        );
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }

    pub fn baselines_promoted(&self) -> u64 {
        self.baselines_promoted.load(Ordering::Relaxed)
    }

    pub fn releases_cancelled(&self) -> u64 {
        self.releases_cancelled.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.runs_started.store(0, Ordering::Relaxed);
        self.runs_failed.store(0, Ordering::Relaxed);
        self.baselines_promoted.store(0, Ordering::Relaxed);
        self.releases_cancelled.store(0, Ordering::Relaxed);
    }
}
