//! Composite and batch promotion.

use release_state::{
    BackendResult, Baseline, BaselineRepository, BuildAction, BuildParameter, BuildRef,
    PromotionLevel, ReleaseRecord, ScmSource, Stream, LATEST_BASELINE_PARAM,
};

use crate::error::Result;
use crate::macros::expand_macros;
use crate::metrics::METRICS;
use crate::obs::emit_baseline_promoted;
use crate::selector::select;
use crate::workflow::{NoOpReason, Outcome, ReleaseContext, RunLog};

/// Badge text of a batch release.
pub const BATCH_DESCRIPTION: &str = "The latest baselines have been released";

/// Change one baseline's level.
pub(crate) async fn change_level(
    repo: &dyn BaselineRepository,
    baseline: &Baseline,
    level: &PromotionLevel,
    log: &RunLog,
) -> BackendResult<()> {
    log.line(format!("Changing {baseline} to {level}"));
    repo.set_promotion_level(baseline, level).await
}

async fn promote(
    repo: &dyn BaselineRepository,
    baseline: &Baseline,
    target: &PromotionLevel,
    log: &RunLog,
) -> BackendResult<()> {
    change_level(repo, baseline, target, log).await?;
    emit_baseline_promoted(baseline, target);
    METRICS.inc_baselines_promoted();
    Ok(())
}

/// Attach badge, record and extra actions, keep the build and save it.
async fn record_release(
    ctx: &ReleaseContext,
    build: &BuildRef,
    record: ReleaseRecord,
    extra: Vec<BuildAction>,
    log: &RunLog,
) -> Result<()> {
    let host = &ctx.host;
    host.add_action(build, BuildAction::Badge(record.badge())).await?;
    for action in extra {
        host.add_action(build, action).await?;
    }
    let id = record.id;
    host.add_action(build, BuildAction::Release(record)).await?;
    host.keep_log(build, true).await?;
    host.save(build).await?;
    log.line(format!("Release {id} recorded on {build}"));
    Ok(())
}

async fn already_released(ctx: &ReleaseContext, build: &BuildRef, log: &RunLog) -> Result<bool> {
    match ctx.host.active_release(build).await? {
        Some(record) => {
            log.line(format!(
                "{build} already carries release {} ({}); cancel it first",
                record.id, record.description
            ));
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Promote the composite baseline produced by `build`.
pub async fn composite_release(
    ctx: &ReleaseContext,
    build: &BuildRef,
    log: &RunLog,
) -> Result<Outcome> {
    let Some(composite) = ctx.host.composite_config(&build.job).await? else {
        log.line(format!("No composite baseline configured for {}", build.job));
        return Ok(Outcome::no_op(NoOpReason::NoCompositeConfigured));
    };
    if already_released(ctx, build, log).await? {
        return Ok(Outcome::no_op(NoOpReason::AlreadyReleased));
    }

    let env = ctx.host.environment(build).await?;
    let name = expand_macros(&composite.name_pattern, &env);
    let stream: Stream = composite.stream_selector.parse()?;
    let baseline = Baseline::new(name, stream.qualifier().map(str::to_string));

    let repo = ctx.repos.open(&ctx.host.workspace_root(build).await?);
    log.line(format!("Composite baseline: {baseline}"));

    let level = repo.get_promotion_level(&baseline).await?;
    if level != PromotionLevel::Built {
        log.line(format!(
            "{baseline} is at {level}; only a BUILT baseline can be released"
        ));
        return Ok(Outcome::no_op(NoOpReason::NotBuilt));
    }

    let target = ctx.config.target_level();
    promote(repo.as_ref(), &baseline, &target, log).await?;

    let record = ReleaseRecord::new(
        build.clone(),
        format!("{baseline}:{target}"),
        vec![baseline],
        target,
    );
    record_release(ctx, build, record, Vec::new(), log).await?;
    Ok(Outcome::Succeeded)
}

/// Promote every latest baseline of a modifiable component.
///
/// The first failing promotion aborts the run; baselines promoted before it
/// stay promoted and no record is attached.
pub async fn batch_release(
    ctx: &ReleaseContext,
    build: &BuildRef,
    log: &RunLog,
) -> Result<Outcome> {
    let stream = match ctx.host.scm_source(&build.job).await? {
        Some(ScmSource::Ucm { stream }) => stream,
        _ => {
            log.line(format!("{} does not build from a UCM stream", build.job));
            return Ok(Outcome::no_op(NoOpReason::UnsupportedScm));
        }
    };
    if already_released(ctx, build, log).await? {
        return Ok(Outcome::no_op(NoOpReason::AlreadyReleased));
    }

    let repo = ctx.repos.open(&ctx.host.workspace_root(build).await?);
    log.line(format!("Releasing the latest baselines of {stream}"));

    let latest = repo.list_latest_baselines(&stream).await?;
    let modifiable = repo.list_modifiable_components(&stream).await?;
    let selected = select(&latest, &modifiable, repo.as_ref()).await?;
    if selected.is_empty() {
        log.line("There is no baseline to release");
        return Ok(Outcome::no_op(NoOpReason::NothingToRelease));
    }

    let target = ctx.config.target_level();
    for baseline in &selected {
        promote(repo.as_ref(), baseline, &target, log).await?;
    }

    let summary = selected
        .iter()
        .map(Baseline::to_string)
        .collect::<Vec<_>>()
        .join(";");
    log.line(format!("{LATEST_BASELINE_PARAM}={summary}"));

    let parameters = BuildAction::Parameters {
        parameters: vec![BuildParameter::new(LATEST_BASELINE_PARAM, summary)],
    };
    let record = ReleaseRecord::new(build.clone(), BATCH_DESCRIPTION, selected, target);
    record_release(ctx, build, record, vec![parameters], log).await?;
    Ok(Outcome::Succeeded)
}
