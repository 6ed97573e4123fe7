//! Structured lifecycle events for release runs.
//!
//! - `RunSpan` tags everything a run logs with its owner and workflow
//! - `emit_*` functions record the key transitions at `info!` level

use std::future::Future;

use release_state::{Baseline, BuildRef, PromotionLevel};
use tracing::instrument::Instrumented;
use tracing::{info, Instrument};

/// Run-scoped tracing span.
///
/// Runs execute on spawned tasks, so the span is attached to the run's
/// future instead of being entered on the current thread.
pub struct RunSpan {
    span: tracing::Span,
}

impl RunSpan {
    pub fn new(owner: &BuildRef, workflow: &str) -> Self {
        Self {
            span: tracing::info_span!("release.run", owner = %owner, workflow = %workflow),
        }
    }

    /// Attach the span to a future.
    pub fn wrap<F: Future>(self, fut: F) -> Instrumented<F> {
        fut.instrument(self.span)
    }
}

pub fn emit_run_submitted(owner: &BuildRef, workflow: &str) {
    info!(event = "run.submitted", owner = %owner, workflow = %workflow);
}

/// Emit event: run finished with duration and outcome.
pub fn emit_run_finished(owner: &BuildRef, workflow: &str, duration_ms: u64, outcome: &str) {
    info!(
        event = "run.finished",
        owner = %owner,
        workflow = %workflow,
        duration_ms = duration_ms,
        outcome = %outcome,
    );
}

pub fn emit_baseline_promoted(baseline: &Baseline, level: &PromotionLevel) {
    info!(event = "baseline.promoted", baseline = %baseline, level = %level);
}

/// Emit event: a release record was withdrawn from its build.
pub fn emit_release_cancelled(owner: &BuildRef, restored: usize, failed: usize) {
    info!(
        event = "release.cancelled",
        owner = %owner,
        restored = restored,
        failed = failed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_span_wraps_future() {
        // Just ensure the span can be created and carried across an await
        let span = RunSpan::new(&BuildRef::new("job", 1), "composite");
        let value = span.wrap(async { 7 }).await;
        assert_eq!(value, 7);
    }
}
