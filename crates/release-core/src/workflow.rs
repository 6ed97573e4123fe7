//! Workflow variants, outcomes and the per-run log.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use release_state::{BuildHost, BuildRef, ReleaseRecord, RepositoryProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ReleaseConfig;
use crate::error::Result;
use crate::{cancellation, promotion};

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a run needs from the outside world.
#[derive(Clone)]
pub struct ReleaseContext {
    pub host: Arc<dyn BuildHost>,
    pub repos: Arc<dyn RepositoryProvider>,
    pub config: ReleaseConfig,
}

impl ReleaseContext {
    pub fn new(
        host: Arc<dyn BuildHost>,
        repos: Arc<dyn RepositoryProvider>,
        config: ReleaseConfig,
    ) -> Self {
        Self {
            host,
            repos,
            config,
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// One release operation, owned by a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workflow {
    /// Promote the job's composite baseline produced by `build`.
    Composite { build: BuildRef },
    /// Promote the latest baselines of the job's stream, owned by `build`.
    Batch { build: BuildRef },
    /// Withdraw `record` from `build`.
    Cancel {
        build: BuildRef,
        record: ReleaseRecord,
    },
}

impl Workflow {
    pub fn owner(&self) -> &BuildRef {
        match self {
            Workflow::Composite { build }
            | Workflow::Batch { build }
            | Workflow::Cancel { build, .. } => build,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Workflow::Composite { .. } => "composite",
            Workflow::Batch { .. } => "batch",
            Workflow::Cancel { .. } => "cancel",
        }
    }

    /// Run the workflow to completion.
    pub async fn execute(&self, ctx: &ReleaseContext, log: &RunLog) -> Result<Outcome> {
        match self {
            Workflow::Composite { build } => promotion::composite_release(ctx, build, log).await,
            Workflow::Batch { build } => promotion::batch_release(ctx, build, log).await,
            Workflow::Cancel { build, record } => {
                cancellation::cancel_release(ctx, build, record, log).await
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a run ended without changing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// The composite baseline is not at `BUILT`.
    NotBuilt,
    NoCompositeConfigured,
    /// The job does not build from a UCM stream.
    UnsupportedScm,
    NoSuccessfulBuild,
    /// No latest baseline sits on a modifiable component.
    NothingToRelease,
    /// The owning build already carries an active release.
    AlreadyReleased,
    NoActiveRelease,
}

impl NoOpReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoOpReason::NotBuilt => "not built",
            NoOpReason::NoCompositeConfigured => "no composite baseline configured",
            NoOpReason::UnsupportedScm => "job does not build from a UCM stream",
            NoOpReason::NoSuccessfulBuild => "no successful build",
            NoOpReason::NothingToRelease => "nothing to release",
            NoOpReason::AlreadyReleased => "already released",
            NoOpReason::NoActiveRelease => "no active release",
        }
    }
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    NoOp { reason: NoOpReason },
    Failed,
}

impl Outcome {
    pub fn no_op(reason: NoOpReason) -> Self {
        Outcome::NoOp { reason }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Succeeded => "succeeded",
            Outcome::NoOp { .. } => "no_op",
            Outcome::Failed => "failed",
        }
    }
}

/// Lifecycle of the runs of one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub owner: BuildRef,
    pub workflow: String,
    pub outcome: Outcome,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// A report for a request resolved without starting a run.
    pub fn immediate(owner: BuildRef, workflow: &str, reason: NoOpReason) -> Self {
        let now = Utc::now();
        Self {
            owner,
            workflow: workflow.to_string(),
            outcome: Outcome::no_op(reason),
            message: reason.to_string(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn state(&self) -> RunState {
        if self.outcome.is_failed() {
            RunState::Failed
        } else {
            RunState::Succeeded
        }
    }
}

// ---------------------------------------------------------------------------
// RunLog
// ---------------------------------------------------------------------------

/// Human-readable log of one run, shared with pollers.
///
/// Every line is also emitted as a tracing event.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    buffer: Arc<Mutex<String>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!(target: "release::run", "{}", message);
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.push_str(message);
        buffer.push('\n');
    }

    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use release_state::PromotionLevel;

    use super::*;

    #[test]
    fn owner_and_kind() {
        let build = BuildRef::new("ProjectA", 4);
        let record = ReleaseRecord::new(build.clone(), "d", vec![], PromotionLevel::Released);
        let cancel = Workflow::Cancel {
            build: build.clone(),
            record,
        };
        assert_eq!(cancel.owner(), &build);
        assert_eq!(cancel.kind(), "cancel");
        assert_eq!(Workflow::Batch { build }.kind(), "batch");
    }

    #[test]
    fn outcome_serializes_with_reason() {
        let json = serde_json::to_value(Outcome::no_op(NoOpReason::NothingToRelease)).unwrap();
        assert_eq!(json["status"], "no_op");
        assert_eq!(json["reason"], "nothing_to_release");
    }

    #[test]
    fn immediate_report_is_succeeded_no_op() {
        let report = RunReport::immediate(BuildRef::new("job", 1), "cancel", NoOpReason::NoActiveRelease);
        assert_eq!(report.state(), RunState::Succeeded);
        assert_eq!(report.message, "no active release");
    }

    #[test]
    fn run_log_accumulates_lines() {
        let log = RunLog::new();
        let shared = log.clone();
        log.line("first");
        shared.line("second");
        assert_eq!(log.contents(), "first\nsecond\n");
    }
}
