//! Background execution of release workflows.
//!
//! Each submitted workflow runs on its own tokio task. The runner keeps one
//! slot per owning build: a second submit while the slot is taken is
//! rejected, and the slot is released when the run ends, whatever the
//! outcome. Failures and panics inside a run are turned into a `Failed`
//! report here and never reach the submitter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use release_state::BuildRef;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{error, warn};

use crate::error::{ReleaseError, Result};
use crate::metrics::METRICS;
use crate::obs::{emit_run_finished, emit_run_submitted, RunSpan};
use crate::workflow::{Outcome, ReleaseContext, RunLog, RunReport, RunState, Workflow};

/// Page a UI should render for an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunView {
    InProgress,
    Index,
}

struct ActiveRun {
    log: RunLog,
}

struct FinishedRun {
    report: RunReport,
    log: RunLog,
}

#[derive(Default)]
struct OwnerSlot {
    active: Option<ActiveRun>,
    last: Option<FinishedRun>,
}

type SlotMap = Arc<Mutex<HashMap<BuildRef, OwnerSlot>>>;

fn lock(slots: &SlotMap) -> MutexGuard<'_, HashMap<BuildRef, OwnerSlot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the owner's slot when the supervising task ends.
struct SlotGuard {
    slots: SlotMap,
    owner: BuildRef,
    log: RunLog,
}

impl SlotGuard {
    fn finish(self, report: RunReport) {
        let mut slots = lock(&self.slots);
        let slot = slots.entry(self.owner.clone()).or_default();
        slot.active = None;
        slot.last = Some(FinishedRun {
            report,
            log: self.log.clone(),
        });
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(slot) = lock(&self.slots).get_mut(&self.owner) {
            slot.active = None;
        }
    }
}

/// Handle on a submitted run.
#[derive(Debug)]
pub struct RunHandle {
    owner: BuildRef,
    rx: oneshot::Receiver<RunReport>,
}

impl RunHandle {
    /// A handle whose report is already known.
    pub(crate) fn ready(report: RunReport) -> Self {
        let (tx, rx) = oneshot::channel();
        let owner = report.owner.clone();
        let _ = tx.send(report);
        Self { owner, rx }
    }

    pub fn owner(&self) -> &BuildRef {
        &self.owner
    }

    /// Wait for the run to end.
    pub async fn wait(self) -> Result<RunReport> {
        let RunHandle { owner, rx } = self;
        rx.await.map_err(|_| ReleaseError::RunLost { owner })
    }
}

/// Per-owner serialising runner.
#[derive(Clone)]
pub struct TaskRunner {
    ctx: ReleaseContext,
    slots: SlotMap,
}

impl TaskRunner {
    pub fn new(ctx: ReleaseContext) -> Self {
        Self {
            ctx,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn context(&self) -> &ReleaseContext {
        &self.ctx
    }

    /// Start `workflow` in the background.
    ///
    /// Fails with `AlreadyRunning` if its owner has an active run.
    pub fn submit(&self, workflow: Workflow) -> Result<RunHandle> {
        let owner = workflow.owner().clone();
        let log = RunLog::new();
        {
            let mut slots = lock(&self.slots);
            let slot = slots.entry(owner.clone()).or_default();
            if slot.active.is_some() {
                warn!(owner = %owner, "release run already active");
                return Err(ReleaseError::AlreadyRunning { owner });
            }
            slot.active = Some(ActiveRun { log: log.clone() });
        }

        let kind = workflow.kind();
        METRICS.inc_runs_started();
        emit_run_submitted(&owner, kind);

        let guard = SlotGuard {
            slots: Arc::clone(&self.slots),
            owner: owner.clone(),
            log: log.clone(),
        };
        let ctx = self.ctx.clone();
        let span = RunSpan::new(&owner, kind);
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let started_at = Utc::now();
            let start = Instant::now();

            let run_log = log.clone();
            let worker = tokio::spawn(span.wrap(async move {
                workflow.execute(&ctx, &run_log).await
            }));

            let (outcome, message) = match worker.await {
                Ok(Ok(outcome)) => {
                    let message = match &outcome {
                        Outcome::NoOp { reason } => reason.to_string(),
                        _ => "release workflow completed".to_string(),
                    };
                    (outcome, message)
                }
                Ok(Err(e)) => {
                    error!(owner = %guard.owner, error = %e, "release run failed");
                    log.line(format!("Release failed: {e}"));
                    (Outcome::Failed, e.to_string())
                }
                Err(join) => {
                    let message = if join.is_panic() {
                        "release workflow panicked"
                    } else {
                        "release workflow was aborted"
                    };
                    error!(owner = %guard.owner, "{}", message);
                    log.line(message);
                    (Outcome::Failed, message.to_string())
                }
            };

            if outcome.is_failed() {
                METRICS.inc_runs_failed();
            }
            let duration_ms = start.elapsed().as_millis() as u64;
            emit_run_finished(&guard.owner, kind, duration_ms, outcome.label());

            let report = RunReport {
                owner: guard.owner.clone(),
                workflow: kind.to_string(),
                outcome,
                message,
                started_at,
                finished_at: Utc::now(),
            };
            guard.finish(report.clone());
            let _ = tx.send(report);
        });

        Ok(RunHandle { owner, rx })
    }

    pub fn is_running(&self, owner: &BuildRef) -> bool {
        lock(&self.slots)
            .get(owner)
            .is_some_and(|slot| slot.active.is_some())
    }

    pub fn state(&self, owner: &BuildRef) -> RunState {
        match lock(&self.slots).get(owner) {
            Some(slot) if slot.active.is_some() => RunState::Running,
            Some(OwnerSlot {
                last: Some(finished),
                ..
            }) => finished.report.state(),
            _ => RunState::Idle,
        }
    }

    /// Log of the active run, or of the last finished one.
    pub fn log(&self, owner: &BuildRef) -> Option<String> {
        let slots = lock(&self.slots);
        let slot = slots.get(owner)?;
        match (&slot.active, &slot.last) {
            (Some(active), _) => Some(active.log.contents()),
            (None, Some(finished)) => Some(finished.log.contents()),
            (None, None) => None,
        }
    }

    pub fn last_report(&self, owner: &BuildRef) -> Option<RunReport> {
        lock(&self.slots)
            .get(owner)
            .and_then(|slot| slot.last.as_ref())
            .map(|finished| finished.report.clone())
    }

    pub fn view(&self, owner: &BuildRef) -> RunView {
        if self.is_running(owner) {
            RunView::InProgress
        } else {
            RunView::Index
        }
    }
}
