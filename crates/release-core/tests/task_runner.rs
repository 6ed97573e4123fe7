//! Task runner: per-owner mutual exclusion, failure isolation, polling and
//! the permission-checked entry points.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use release_core::{
    AllowAll, NoOpReason, Outcome, Permission, ReleaseConfig, ReleaseContext, ReleaseError,
    RunState, RunView, TaskRunner, Workflow,
};
use release_state::fakes::{MemoryBaselineRepository, MemoryBuildHost};
use release_state::{
    BackendResult, Baseline, BaselineRepository, BuildRef, Component, CompositeConfig, HostError,
    PromotionLevel, ReleaseRecord, Stream,
};
use tokio::sync::{Notify, Semaphore};

const JOB: &str = "ProjectA";

fn baseline(build: u32) -> Baseline {
    format!("REL_{build}@\\P").parse().unwrap()
}

fn host(builds: &[u32]) -> MemoryBuildHost {
    let mut host = MemoryBuildHost::new().with_job(
        JOB,
        None,
        Some(CompositeConfig {
            name_pattern: "REL_$BUILD".to_string(),
            stream_selector: "int@\\P".to_string(),
        }),
    );
    for n in builds {
        let number = n.to_string();
        host = host.with_build(&BuildRef::new(JOB, *n), true, &[("BUILD", number.as_str())]);
    }
    host
}

/// Repository whose level query blocks until the test opens the gate.
struct GatedRepository {
    inner: MemoryBaselineRepository,
    gate: Semaphore,
    entered: Notify,
}

impl GatedRepository {
    fn new(inner: MemoryBaselineRepository) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            entered: Notify::new(),
        }
    }
}

#[async_trait]
impl BaselineRepository for GatedRepository {
    async fn get_promotion_level(&self, baseline: &Baseline) -> BackendResult<PromotionLevel> {
        self.entered.notify_one();
        let _permit = self.gate.acquire().await.unwrap();
        self.inner.get_promotion_level(baseline).await
    }

    async fn set_promotion_level(
        &self,
        baseline: &Baseline,
        level: &PromotionLevel,
    ) -> BackendResult<()> {
        self.inner.set_promotion_level(baseline, level).await
    }

    async fn list_latest_baselines(&self, stream: &Stream) -> BackendResult<Vec<Baseline>> {
        self.inner.list_latest_baselines(stream).await
    }

    async fn list_modifiable_components(
        &self,
        stream: &Stream,
    ) -> BackendResult<HashSet<Component>> {
        self.inner.list_modifiable_components(stream).await
    }

    async fn get_component(&self, baseline: &Baseline) -> BackendResult<Component> {
        self.inner.get_component(baseline).await
    }
}

/// Repository that panics on any level query.
struct PanickingRepository;

#[async_trait]
impl BaselineRepository for PanickingRepository {
    async fn get_promotion_level(&self, _baseline: &Baseline) -> BackendResult<PromotionLevel> {
        panic!("backend blew up");
    }

    async fn set_promotion_level(
        &self,
        _baseline: &Baseline,
        _level: &PromotionLevel,
    ) -> BackendResult<()> {
        Ok(())
    }

    async fn list_latest_baselines(&self, _stream: &Stream) -> BackendResult<Vec<Baseline>> {
        Ok(Vec::new())
    }

    async fn list_modifiable_components(
        &self,
        _stream: &Stream,
    ) -> BackendResult<HashSet<Component>> {
        Ok(HashSet::new())
    }

    async fn get_component(&self, _baseline: &Baseline) -> BackendResult<Component> {
        Ok(Component::new("c"))
    }
}

fn gated_runner(builds: &[u32]) -> (TaskRunner, Arc<GatedRepository>) {
    let mut inner = MemoryBaselineRepository::new();
    for n in builds {
        inner = inner.with_baseline(&baseline(*n), "c", PromotionLevel::Built);
    }
    let repo = Arc::new(GatedRepository::new(inner));
    let ctx = ReleaseContext::new(
        Arc::new(host(builds)),
        Arc::new(repo.clone()),
        ReleaseConfig::default(),
    );
    (TaskRunner::new(ctx), repo)
}

#[tokio::test]
async fn second_submit_for_same_owner_is_rejected_while_active() {
    let (runner, repo) = gated_runner(&[7]);
    let owner = BuildRef::new(JOB, 7);

    let first = runner.on_build_completed(&owner).unwrap();
    assert!(runner.is_running(&owner));
    assert_eq!(runner.state(&owner), RunState::Running);
    assert_eq!(runner.view(&owner), RunView::InProgress);

    let err = runner.on_build_completed(&owner).unwrap_err();
    assert!(matches!(err, ReleaseError::AlreadyRunning { owner: o } if o == owner));

    repo.gate.add_permits(1);
    let report = first.wait().await.unwrap();
    assert_eq!(report.outcome, Outcome::Succeeded);

    assert!(!runner.is_running(&owner));
    assert_eq!(runner.state(&owner), RunState::Succeeded);
    assert_eq!(runner.view(&owner), RunView::Index);

    // The slot accepts a new run once the first one is done.
    repo.gate.add_permits(1);
    let again = runner.on_build_completed(&owner).unwrap().wait().await.unwrap();
    assert_eq!(again.outcome, Outcome::no_op(NoOpReason::AlreadyReleased));
}

#[tokio::test]
async fn different_owners_run_concurrently() {
    let (runner, repo) = gated_runner(&[7, 8]);

    let a = runner.on_build_completed(&BuildRef::new(JOB, 7)).unwrap();
    let b = runner.on_build_completed(&BuildRef::new(JOB, 8)).unwrap();
    assert!(runner.is_running(a.owner()));
    assert!(runner.is_running(b.owner()));

    repo.gate.add_permits(2);
    let (ra, rb) = (a.wait().await.unwrap(), b.wait().await.unwrap());
    assert_eq!(ra.outcome, Outcome::Succeeded);
    assert_eq!(rb.outcome, Outcome::Succeeded);
    assert_eq!(repo.inner.level(&baseline(8)), Some(PromotionLevel::Released));
}

#[tokio::test]
async fn log_is_readable_while_the_run_is_active() {
    let (runner, repo) = gated_runner(&[7]);
    let owner = BuildRef::new(JOB, 7);

    let handle = runner.on_build_completed(&owner).unwrap();
    repo.entered.notified().await;

    let log = runner.log(&owner).unwrap();
    assert!(log.contains("Composite baseline: REL_7@\\P"));

    repo.gate.add_permits(1);
    handle.wait().await.unwrap();
    assert!(runner.log(&owner).unwrap().contains("recorded on ProjectA#7"));
    assert!(runner.last_report(&owner).is_some());
}

#[tokio::test]
async fn failed_run_releases_the_slot() {
    let ctx = ReleaseContext::new(
        Arc::new(host(&[7])),
        // Unknown baseline: the level query fails.
        Arc::new(Arc::new(MemoryBaselineRepository::new())),
        ReleaseConfig::default(),
    );
    let runner = TaskRunner::new(ctx);
    let owner = BuildRef::new(JOB, 7);

    let report = runner.on_build_completed(&owner).unwrap().wait().await.unwrap();
    assert_eq!(report.outcome, Outcome::Failed);
    assert_eq!(runner.state(&owner), RunState::Failed);
    assert!(!runner.is_running(&owner));

    assert!(runner.on_build_completed(&owner).is_ok());
}

#[tokio::test]
async fn panicking_run_is_reported_as_failed() {
    let ctx = ReleaseContext::new(
        Arc::new(host(&[7])),
        Arc::new(Arc::new(PanickingRepository)),
        ReleaseConfig::default(),
    );
    let runner = TaskRunner::new(ctx);
    let owner = BuildRef::new(JOB, 7);

    let report = runner.on_build_completed(&owner).unwrap().wait().await.unwrap();

    assert_eq!(report.outcome, Outcome::Failed);
    assert!(report.message.contains("panicked"));
    assert!(!runner.is_running(&owner));
    assert!(runner.log(&owner).unwrap().contains("panicked"));
}

#[tokio::test]
async fn permission_check_guards_interactive_submits() {
    let (runner, repo) = gated_runner(&[7]);
    let owner = BuildRef::new(JOB, 7);
    let build_only = |_: &str, p: Permission| p == Permission::Build;

    let err = runner
        .submit_checked(Workflow::Composite { build: owner.clone() }, &build_only)
        .unwrap_err();
    assert!(matches!(
        err,
        ReleaseError::PermissionDenied {
            permission: Permission::Tag,
            ..
        }
    ));
    assert!(!runner.is_running(&owner));

    let record = ReleaseRecord::new(owner.clone(), "d", vec![], PromotionLevel::Released);
    let cancel = Workflow::Cancel {
        build: owner.clone(),
        record,
    };
    assert_eq!(cancel.required_permission(), Permission::Build);
    let handle = runner.submit_checked(cancel, &build_only).unwrap();
    repo.gate.add_permits(1);
    assert_eq!(handle.wait().await.unwrap().outcome, Outcome::Succeeded);
}

#[tokio::test]
async fn commands_reject_unknown_builds() {
    let (runner, _repo) = gated_runner(&[7]);

    let err = runner.promote_composite(JOB, 99, &AllowAll).await.unwrap_err();
    assert!(matches!(
        err,
        ReleaseError::Host(HostError::BuildNotFound { .. })
    ));

    let err = runner.cancel("NoSuchJob", 1, &AllowAll).await.unwrap_err();
    assert!(matches!(err, ReleaseError::Host(_)));
}

#[tokio::test]
async fn command_promote_composite_resolves_build() {
    let (runner, repo) = gated_runner(&[7]);
    repo.gate.add_permits(1);

    let handle = runner.promote_composite(JOB, 7, &AllowAll).await.unwrap();
    assert_eq!(handle.owner(), &BuildRef::new(JOB, 7));
    assert_eq!(handle.wait().await.unwrap().outcome, Outcome::Succeeded);

    let cancelled = runner
        .cancel(JOB, 7, &AllowAll)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(cancelled.outcome, Outcome::Succeeded);
    assert_eq!(repo.inner.level(&baseline(7)), Some(PromotionLevel::Built));
}
