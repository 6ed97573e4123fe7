//! cleartool command definitions.

use release_state::{Baseline, PromotionLevel, Stream};

/// The cleartool invocations the baseline repository needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearToolCommand {
    /// cleartool lsbl -fmt %[plevel]p <baseline>
    BaselineLevel(Baseline),

    /// cleartool chbl -level <level> <baseline>
    ChangeLevel {
        baseline: Baseline,
        level: PromotionLevel,
    },

    /// cleartool lsstream -fmt %[latest_bls]CXp <stream>
    LatestBaselines(Stream),

    /// cleartool lsstream -fmt %[mod_comps]p <stream>
    ModifiableComponents(Stream),

    /// cleartool lsbl -fmt %[component]p <baseline>
    BaselineComponent(Baseline),
}

impl ClearToolCommand {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ClearToolCommand::BaselineLevel(_) => "baseline_level",
            ClearToolCommand::ChangeLevel { .. } => "change_level",
            ClearToolCommand::LatestBaselines(_) => "latest_baselines",
            ClearToolCommand::ModifiableComponents(_) => "modifiable_components",
            ClearToolCommand::BaselineComponent(_) => "baseline_component",
        }
    }

    /// Argument list, without the executable.
    pub fn args(&self) -> Vec<String> {
        match self {
            ClearToolCommand::BaselineLevel(baseline) => vec![
                "lsbl".to_string(),
                "-fmt".to_string(),
                "%[plevel]p".to_string(),
                baseline.to_string(),
            ],
            ClearToolCommand::ChangeLevel { baseline, level } => vec![
                "chbl".to_string(),
                "-level".to_string(),
                level.to_string(),
                baseline.to_string(),
            ],
            ClearToolCommand::LatestBaselines(stream) => vec![
                "lsstream".to_string(),
                "-fmt".to_string(),
                "%[latest_bls]CXp".to_string(),
                stream.to_string(),
            ],
            ClearToolCommand::ModifiableComponents(stream) => vec![
                "lsstream".to_string(),
                "-fmt".to_string(),
                "%[mod_comps]p".to_string(),
                stream.to_string(),
            ],
            ClearToolCommand::BaselineComponent(baseline) => vec![
                "lsbl".to_string(),
                "-fmt".to_string(),
                "%[component]p".to_string(),
                baseline.to_string(),
            ],
        }
    }

    /// Whether the command changes backend state.
    pub fn is_mutation(&self) -> bool {
        matches!(self, ClearToolCommand::ChangeLevel { .. })
    }
}
