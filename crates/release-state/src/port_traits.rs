//! Port definitions for release workflows
//!
//! These traits are the only way the workflows touch the outside world:
//! - `BaselineRepository`: queries and mutations against the VCS backend
//! - `RepositoryProvider`: opens a repository rooted at a build workspace
//! - `BuildHost`: the job/build host the release record is attached to
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{BackendError, HostError};
use crate::model::{
    Baseline, BuildAction, BuildRef, Component, CompositeConfig, PromotionLevel, ReleaseBadge,
    ReleaseRecord, ScmSource, Stream,
};

/// Result type for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Result type for host operations
pub type HostResult<T> = std::result::Result<T, HostError>;

// ---------------------------------------------------------------------------
// BaselineRepository: VCS backend
// ---------------------------------------------------------------------------

/// Baseline queries and mutations.
///
/// Guarantees:
/// - `get_promotion_level` never fails on unrecognized level text; it yields
///   `PromotionLevel::Other`.
/// - `set_promotion_level` is idempotent.
/// - `list_latest_baselines` returns one baseline per component, in backend
///   order.
#[async_trait]
pub trait BaselineRepository: Send + Sync {
    /// Current promotion level of a baseline.
    async fn get_promotion_level(&self, baseline: &Baseline) -> BackendResult<PromotionLevel>;

    /// Change the promotion level of a baseline.
    async fn set_promotion_level(
        &self,
        baseline: &Baseline,
        level: &PromotionLevel,
    ) -> BackendResult<()>;

    /// Latest baseline of every component visible on the stream.
    async fn list_latest_baselines(&self, stream: &Stream) -> BackendResult<Vec<Baseline>>;

    /// Components the stream is allowed to modify.
    async fn list_modifiable_components(&self, stream: &Stream)
        -> BackendResult<HashSet<Component>>;

    /// Component owning a baseline.
    async fn get_component(&self, baseline: &Baseline) -> BackendResult<Component>;
}

/// Opens a repository for a build workspace.
pub trait RepositoryProvider: Send + Sync {
    fn open(&self, workspace_root: &Path) -> Arc<dyn BaselineRepository>;
}

/// A shared repository ignores the workspace and serves every run.
impl<R> RepositoryProvider for Arc<R>
where
    R: BaselineRepository + 'static,
{
    fn open(&self, _workspace_root: &Path) -> Arc<dyn BaselineRepository> {
        self.clone()
    }
}

// ---------------------------------------------------------------------------
// BuildHost: job scheduler
// ---------------------------------------------------------------------------

/// The job/build host.
///
/// Semantics:
/// - `add_action` / `remove_action` change the in-memory build; `save`
///   persists it.
/// - `keep_log(true)` exempts the build from log rotation until
///   `keep_log(false)`.
/// - `scm_source` is `None` when the job has no VCS configured.
#[async_trait]
pub trait BuildHost: Send + Sync {
    /// Workspace directory backend commands run in.
    async fn workspace_root(&self, build: &BuildRef) -> HostResult<PathBuf>;

    /// Build environment used for macro expansion.
    async fn environment(&self, build: &BuildRef) -> HostResult<BTreeMap<String, String>>;

    /// VCS source configured on the job.
    async fn scm_source(&self, job: &str) -> HostResult<Option<ScmSource>>;

    /// Composite baseline configured on the job.
    async fn composite_config(&self, job: &str) -> HostResult<Option<CompositeConfig>>;

    /// Most recent successful build of the job.
    async fn last_successful_build(&self, job: &str) -> HostResult<Option<BuildRef>>;

    /// Actions attached to a build, in attachment order.
    async fn actions(&self, build: &BuildRef) -> HostResult<Vec<BuildAction>>;

    /// Attach an action to a build.
    async fn add_action(&self, build: &BuildRef, action: BuildAction) -> HostResult<()>;

    /// Detach an action. Returns `false` if it was not attached.
    async fn remove_action(&self, build: &BuildRef, action: &BuildAction) -> HostResult<bool>;

    /// Set or lift the retention lock.
    async fn keep_log(&self, build: &BuildRef, keep: bool) -> HostResult<()>;

    /// Whether the build is currently kept.
    async fn is_kept(&self, build: &BuildRef) -> HostResult<bool>;

    /// Persist the build.
    async fn save(&self, build: &BuildRef) -> HostResult<()>;

    /// The active release record of a build, if any.
    async fn active_release(&self, build: &BuildRef) -> HostResult<Option<ReleaseRecord>> {
        Ok(self.actions(build).await?.into_iter().find_map(|a| match a {
            BuildAction::Release(record) => Some(record),
            _ => None,
        }))
    }

    /// The badge attached for a release record, if any.
    async fn release_badge(
        &self,
        build: &BuildRef,
        release_id: Uuid,
    ) -> HostResult<Option<ReleaseBadge>> {
        Ok(self.actions(build).await?.into_iter().find_map(|a| match a {
            BuildAction::Badge(badge) if badge.release_id == release_id => Some(badge),
            _ => None,
        }))
    }

    /// Value of a build parameter, if any.
    async fn parameter(&self, build: &BuildRef, name: &str) -> HostResult<Option<String>> {
        Ok(self.actions(build).await?.into_iter().find_map(|a| match a {
            BuildAction::Parameters { parameters } => parameters
                .into_iter()
                .find(|p| p.name == name)
                .map(|p| p.value),
            _ => None,
        }))
    }
}
