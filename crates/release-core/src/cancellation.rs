//! Withdrawal of a recorded release.

use release_state::{BuildAction, BuildRef, PromotionLevel, ReleaseRecord, LATEST_BASELINE_PARAM};
use tracing::warn;

use crate::error::{ReleaseError, Result};
use crate::metrics::METRICS;
use crate::obs::emit_release_cancelled;
use crate::promotion::change_level;
use crate::workflow::{Outcome, ReleaseContext, RunLog};

fn is_latest_baseline(action: &BuildAction) -> bool {
    matches!(action, BuildAction::Parameters { parameters }
        if parameters.iter().any(|p| p.name == LATEST_BASELINE_PARAM))
}

/// Restore every baseline of `record` to `BUILT` and detach the release,
/// along with the `LATEST_BASELINE` parameter of a batch release.
///
/// A baseline that cannot be restored is logged and counted; the others are
/// still processed and the build is always cleaned up. The run fails if any
/// baseline was left behind.
pub async fn cancel_release(
    ctx: &ReleaseContext,
    build: &BuildRef,
    record: &ReleaseRecord,
    log: &RunLog,
) -> Result<Outcome> {
    let repo = ctx.repos.open(&ctx.host.workspace_root(build).await?);
    log.line(format!("Cancelling release {} on {build}", record.id));

    let mut failed = 0;
    for baseline in &record.baselines {
        if let Err(e) = change_level(repo.as_ref(), baseline, &PromotionLevel::Built, log).await {
            warn!(baseline = %baseline, error = %e, "baseline not restored");
            log.line(format!("Failed to restore {baseline}: {e}"));
            failed += 1;
        }
    }

    if let Some(badge) = ctx.host.release_badge(build, record.id).await? {
        ctx.host.remove_action(build, &BuildAction::Badge(badge)).await?;
    }
    ctx.host
        .remove_action(build, &BuildAction::Release(record.clone()))
        .await?;
    for action in ctx.host.actions(build).await? {
        if is_latest_baseline(&action) {
            ctx.host.remove_action(build, &action).await?;
        }
    }
    ctx.host.keep_log(build, false).await?;
    ctx.host.save(build).await?;

    let total = record.baselines.len();
    emit_release_cancelled(build, total - failed, failed);
    if failed > 0 {
        return Err(ReleaseError::CancelIncomplete { failed, total });
    }
    METRICS.inc_releases_cancelled();
    log.line(format!("Release {} cancelled", record.id));
    Ok(Outcome::Succeeded)
}
