//! Baseline selection for batch releases.

use std::collections::HashSet;

use release_state::{BackendResult, Baseline, BaselineRepository, Component};
use tracing::debug;

/// Keep the latest baselines whose component the stream may modify.
///
/// The result is a subsequence of `latest`. A failing component lookup
/// aborts the selection.
pub async fn select(
    latest: &[Baseline],
    modifiable: &HashSet<Component>,
    repo: &dyn BaselineRepository,
) -> BackendResult<Vec<Baseline>> {
    let mut selected = Vec::new();
    for baseline in latest {
        let component = repo.get_component(baseline).await?;
        let keep = modifiable.contains(&component);
        debug!(baseline = %baseline, component = %component, keep, "baseline filtered");
        if keep {
            selected.push(baseline.clone());
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use release_state::fakes::MemoryBaselineRepository;
    use release_state::{BackendError, PromotionLevel};

    use super::*;

    fn bl(s: &str) -> Baseline {
        s.parse().unwrap()
    }

    fn comps(names: &[&str]) -> HashSet<Component> {
        names.iter().map(|n| Component::new(*n)).collect()
    }

    fn repo() -> MemoryBaselineRepository {
        MemoryBaselineRepository::new()
            .with_baseline(&bl("A"), "c1", PromotionLevel::Built)
            .with_baseline(&bl("B"), "c2", PromotionLevel::Built)
            .with_baseline(&bl("C"), "c3", PromotionLevel::Built)
    }

    #[tokio::test]
    async fn keeps_modifiable_in_order() {
        let latest = vec![bl("C"), bl("B"), bl("A")];
        let selected = select(&latest, &comps(&["c1", "c3"]), &repo()).await.unwrap();
        assert_eq!(selected, vec![bl("C"), bl("A")]);
    }

    #[tokio::test]
    async fn nothing_modifiable_is_empty() {
        let latest = vec![bl("A"), bl("B")];
        let selected = select(&latest, &comps(&["c9"]), &repo()).await.unwrap();
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn unknown_component_aborts() {
        let latest = vec![bl("A"), bl("ghost")];
        let err = select(&latest, &comps(&["c1"]), &repo()).await.unwrap_err();
        assert!(matches!(err, BackendError::NonZeroExit { .. }));
    }
}
