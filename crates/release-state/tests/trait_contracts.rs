//! Trait contract tests for BaselineRepository and BuildHost.
//!
//! These tests verify the behavioral contracts of the ports using the
//! in-memory fakes. Any conforming implementation must pass these.

use std::sync::Arc;

use release_state::fakes::{MemoryBaselineRepository, MemoryBuildHost};
use release_state::port_traits::*;
use release_state::*;

fn bl(s: &str) -> Baseline {
    s.parse().unwrap()
}

fn stream() -> Stream {
    "int_stream@\\P_ORC".parse().unwrap()
}

// ===========================================================================
// BaselineRepository contract tests
// ===========================================================================

#[tokio::test]
async fn repo_get_level_returns_registered_level() {
    let a = bl("A@\\P_ORC");
    let repo = MemoryBaselineRepository::new().with_baseline(&a, "c1", PromotionLevel::Built);

    assert_eq!(
        repo.get_promotion_level(&a).await.unwrap(),
        PromotionLevel::Built
    );
}

#[tokio::test]
async fn repo_set_level_is_idempotent() {
    let a = bl("A@\\P_ORC");
    let repo = MemoryBaselineRepository::new().with_baseline(&a, "c1", PromotionLevel::Built);

    repo.set_promotion_level(&a, &PromotionLevel::Released)
        .await
        .unwrap();
    repo.set_promotion_level(&a, &PromotionLevel::Released)
        .await
        .unwrap();

    assert_eq!(repo.level(&a), Some(PromotionLevel::Released));
    assert_eq!(repo.set_calls().len(), 2);
}

#[tokio::test]
async fn repo_unknown_baseline_is_backend_error() {
    let repo = MemoryBaselineRepository::new();
    let err = repo.get_component(&bl("ghost@\\P")).await.unwrap_err();

    assert!(matches!(err, BackendError::NonZeroExit { .. }));
}

#[tokio::test]
async fn repo_latest_baselines_keep_backend_order() {
    let (a, b, c) = (bl("A@\\P"), bl("B@\\P"), bl("C@\\P"));
    let repo = MemoryBaselineRepository::new().with_stream(
        &stream(),
        &[c.clone(), a.clone(), b.clone()],
        &["c1"],
    );

    assert_eq!(
        repo.list_latest_baselines(&stream()).await.unwrap(),
        vec![c, a, b]
    );
    let modifiable = repo.list_modifiable_components(&stream()).await.unwrap();
    assert!(modifiable.contains(&Component::new("c1")));
}

#[tokio::test]
async fn repo_injected_failure_leaves_level_untouched() {
    let a = bl("A@\\P");
    let repo = MemoryBaselineRepository::new().with_baseline(&a, "c1", PromotionLevel::Built);
    repo.fail_set_on(
        &a,
        BackendError::Interrupted {
            command: "chbl".to_string(),
        },
    );

    let err = repo
        .set_promotion_level(&a, &PromotionLevel::Released)
        .await
        .unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(repo.level(&a), Some(PromotionLevel::Built));
}

#[tokio::test]
async fn shared_repository_is_its_own_provider() {
    let a = bl("A@\\P");
    let repo =
        Arc::new(MemoryBaselineRepository::new().with_baseline(&a, "c1", PromotionLevel::Built));

    let opened = repo.open(std::path::Path::new("/anywhere"));
    opened
        .set_promotion_level(&a, &PromotionLevel::Released)
        .await
        .unwrap();
    assert_eq!(repo.level(&a), Some(PromotionLevel::Released));
}

// ===========================================================================
// BuildHost contract tests
// ===========================================================================

fn host_with_build(build: &BuildRef) -> MemoryBuildHost {
    MemoryBuildHost::new()
        .with_job(&build.job, None, None)
        .with_build(build, true, &[("VERSION", "4.3.0")])
}

#[tokio::test]
async fn host_add_then_remove_action() {
    let build = BuildRef::new("job", 1);
    let host = host_with_build(&build);
    let record = ReleaseRecord::new(build.clone(), "d", vec![], PromotionLevel::Released);
    let badge = BuildAction::Badge(record.badge());

    host.add_action(&build, badge.clone()).await.unwrap();
    host.add_action(&build, BuildAction::Release(record.clone()))
        .await
        .unwrap();

    assert_eq!(host.active_release(&build).await.unwrap(), Some(record.clone()));
    assert!(host
        .release_badge(&build, record.id)
        .await
        .unwrap()
        .is_some());

    assert!(host.remove_action(&build, &badge).await.unwrap());
    assert!(!host.remove_action(&build, &badge).await.unwrap());
    assert!(host.release_badge(&build, record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn host_keep_log_toggles() {
    let build = BuildRef::new("job", 1);
    let host = host_with_build(&build);

    assert!(!host.is_kept(&build).await.unwrap());
    host.keep_log(&build, true).await.unwrap();
    assert!(host.is_kept(&build).await.unwrap());
    host.keep_log(&build, false).await.unwrap();
    assert!(!host.is_kept(&build).await.unwrap());
}

#[tokio::test]
async fn host_parameter_lookup() {
    let build = BuildRef::new("job", 1);
    let host = host_with_build(&build);
    host.add_action(
        &build,
        BuildAction::Parameters {
            parameters: vec![BuildParameter::new(LATEST_BASELINE_PARAM, "A;C")],
        },
    )
    .await
    .unwrap();

    assert_eq!(
        host.parameter(&build, LATEST_BASELINE_PARAM).await.unwrap(),
        Some("A;C".to_string())
    );
    assert_eq!(host.parameter(&build, "OTHER").await.unwrap(), None);
}

#[tokio::test]
async fn host_unknown_build_is_not_found() {
    let host = MemoryBuildHost::new();
    let err = host.actions(&BuildRef::new("job", 9)).await.unwrap_err();

    assert!(matches!(err, HostError::BuildNotFound { .. }));
}

#[tokio::test]
async fn host_last_successful_build_is_newest_success() {
    let host = MemoryBuildHost::new()
        .with_job("job", None, None)
        .with_build(&BuildRef::new("job", 1), true, &[])
        .with_build(&BuildRef::new("job", 2), true, &[])
        .with_build(&BuildRef::new("job", 3), false, &[]);

    assert_eq!(
        host.last_successful_build("job").await.unwrap(),
        Some(BuildRef::new("job", 2))
    );
}

#[tokio::test]
async fn host_environment_is_per_build() {
    let build = BuildRef::new("job", 1);
    let host = host_with_build(&build);
    let env = host.environment(&build).await.unwrap();

    assert_eq!(env.get("VERSION").map(String::as_str), Some("4.3.0"));
}
