//! Entry points that start release runs.
//!
//! - build completion starts a composite release
//! - interactive requests are checked against a caller-supplied permission check
//! - commands address a build by job name and build number

use std::fmt;

use release_state::BuildRef;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ReleaseError, Result};
use crate::task_runner::{RunHandle, TaskRunner};
use crate::workflow::{NoOpReason, RunReport, Workflow};

/// Job permission a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Create tags/baselines on the job's VCS (promotions).
    Tag,
    /// Start builds of the job (cancellation).
    Build,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Tag => f.write_str("Tag"),
            Permission::Build => f.write_str("Build"),
        }
    }
}

/// Decides whether the caller holds a permission on a job.
pub trait PermissionCheck: Send + Sync {
    fn has_permission(&self, job: &str, permission: Permission) -> bool;
}

impl<F> PermissionCheck for F
where
    F: Fn(&str, Permission) -> bool + Send + Sync,
{
    fn has_permission(&self, job: &str, permission: Permission) -> bool {
        self(job, permission)
    }
}

/// Grants everything; for callers without an access model.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionCheck for AllowAll {
    fn has_permission(&self, _job: &str, _permission: Permission) -> bool {
        true
    }
}

impl Workflow {
    pub fn required_permission(&self) -> Permission {
        match self {
            Workflow::Composite { .. } | Workflow::Batch { .. } => Permission::Tag,
            Workflow::Cancel { .. } => Permission::Build,
        }
    }
}

impl TaskRunner {
    /// Build-completion hook: release the composite baseline of `build`.
    pub fn on_build_completed(&self, build: &BuildRef) -> Result<RunHandle> {
        info!(build = %build, "build completed, submitting composite release");
        self.submit(Workflow::Composite {
            build: build.clone(),
        })
    }

    /// Submit on behalf of an interactive caller.
    pub fn submit_checked(
        &self,
        workflow: Workflow,
        check: &dyn PermissionCheck,
    ) -> Result<RunHandle> {
        let permission = workflow.required_permission();
        let job = &workflow.owner().job;
        if !check.has_permission(job, permission) {
            return Err(ReleaseError::PermissionDenied {
                job: job.clone(),
                permission,
            });
        }
        self.submit(workflow)
    }

    /// Resolve `job#number`, failing if the build does not exist.
    async fn resolve_build(&self, job: &str, number: u32) -> Result<BuildRef> {
        let build = BuildRef::new(job, number);
        self.context().host.actions(&build).await?;
        Ok(build)
    }

    /// Command: promote the composite baseline of `job#number`.
    pub async fn promote_composite(
        &self,
        job: &str,
        number: u32,
        check: &dyn PermissionCheck,
    ) -> Result<RunHandle> {
        let build = self.resolve_build(job, number).await?;
        self.submit_checked(Workflow::Composite { build }, check)
    }

    /// Command: promote the latest baselines, owned by the job's last
    /// successful build.
    ///
    /// Without a successful build the returned handle is already complete.
    pub async fn promote_latest(&self, job: &str, check: &dyn PermissionCheck) -> Result<RunHandle> {
        match self.context().host.last_successful_build(job).await? {
            Some(build) => self.submit_checked(Workflow::Batch { build }, check),
            None => {
                info!(job = %job, "no successful build to release");
                Ok(RunHandle::ready(RunReport::immediate(
                    BuildRef::new(job, 0),
                    "batch",
                    NoOpReason::NoSuccessfulBuild,
                )))
            }
        }
    }

    /// Command: cancel the release attached to `job#number`.
    ///
    /// Without an active release the returned handle is already complete.
    pub async fn cancel(
        &self,
        job: &str,
        number: u32,
        check: &dyn PermissionCheck,
    ) -> Result<RunHandle> {
        let build = self.resolve_build(job, number).await?;
        match self.context().host.active_release(&build).await? {
            Some(record) => self.submit_checked(Workflow::Cancel { build, record }, check),
            None => Ok(RunHandle::ready(RunReport::immediate(
                build,
                "cancel",
                NoOpReason::NoActiveRelease,
            ))),
        }
    }
}
