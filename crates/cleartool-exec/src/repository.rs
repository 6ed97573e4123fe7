//! `BaselineRepository` backed by the cleartool command line.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use release_state::{
    BackendError, BackendResult, Baseline, BaselineRepository, Component, PromotionLevel,
    RepositoryProvider, Stream,
};
use tracing::{debug, info};

use crate::command::ClearToolCommand;
use crate::launcher::CommandLauncher;

/// Runs cleartool in a build workspace.
pub struct ClearToolRepository {
    launcher: Arc<dyn CommandLauncher>,
    exe: String,
    work_dir: PathBuf,
}

impl ClearToolRepository {
    pub fn new(
        launcher: Arc<dyn CommandLauncher>,
        exe: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            launcher,
            exe: exe.into(),
            work_dir: work_dir.into(),
        }
    }

    async fn execute(&self, cmd: &ClearToolCommand) -> BackendResult<String> {
        let args = cmd.args();
        debug!(command = cmd.name(), work_dir = %self.work_dir.display(), "running cleartool");
        let out = self.launcher.run(&self.exe, &args, &self.work_dir).await?;
        if cmd.is_mutation() {
            info!(command = cmd.name(), args = ?args, "cleartool mutation applied");
        }
        Ok(out)
    }
}

fn unexpected(cmd: &ClearToolCommand, output: &str) -> BackendError {
    BackendError::UnexpectedOutput {
        command: cmd.args().join(" "),
        output: output.to_string(),
    }
}

/// Split backend list output on commas and whitespace.
fn tokens(output: &str) -> impl Iterator<Item = &str> {
    output
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
}

pub(crate) fn parse_level(cmd: &ClearToolCommand, output: &str) -> BackendResult<PromotionLevel> {
    if output.trim().trim_matches('"').trim().is_empty() {
        return Err(unexpected(cmd, output));
    }
    Ok(PromotionLevel::parse(output))
}

pub(crate) fn parse_baselines(cmd: &ClearToolCommand, output: &str) -> BackendResult<Vec<Baseline>> {
    tokens(output)
        .map(|token| token.parse::<Baseline>().map_err(|_| unexpected(cmd, output)))
        .collect()
}

pub(crate) fn parse_components(
    cmd: &ClearToolCommand,
    output: &str,
) -> BackendResult<HashSet<Component>> {
    tokens(output)
        .map(|token| Component::from_backend(token).ok_or_else(|| unexpected(cmd, output)))
        .collect()
}

pub(crate) fn parse_component(cmd: &ClearToolCommand, output: &str) -> BackendResult<Component> {
    Component::from_backend(output).ok_or_else(|| unexpected(cmd, output))
}

#[async_trait]
impl BaselineRepository for ClearToolRepository {
    async fn get_promotion_level(&self, baseline: &Baseline) -> BackendResult<PromotionLevel> {
        let cmd = ClearToolCommand::BaselineLevel(baseline.clone());
        let out = self.execute(&cmd).await?;
        parse_level(&cmd, &out)
    }

    async fn set_promotion_level(
        &self,
        baseline: &Baseline,
        level: &PromotionLevel,
    ) -> BackendResult<()> {
        let cmd = ClearToolCommand::ChangeLevel {
            baseline: baseline.clone(),
            level: level.clone(),
        };
        self.execute(&cmd).await.map(|_| ())
    }

    async fn list_latest_baselines(&self, stream: &Stream) -> BackendResult<Vec<Baseline>> {
        let cmd = ClearToolCommand::LatestBaselines(stream.clone());
        let out = self.execute(&cmd).await?;
        parse_baselines(&cmd, &out)
    }

    async fn list_modifiable_components(
        &self,
        stream: &Stream,
    ) -> BackendResult<HashSet<Component>> {
        let cmd = ClearToolCommand::ModifiableComponents(stream.clone());
        let out = self.execute(&cmd).await?;
        parse_components(&cmd, &out)
    }

    async fn get_component(&self, baseline: &Baseline) -> BackendResult<Component> {
        let cmd = ClearToolCommand::BaselineComponent(baseline.clone());
        let out = self.execute(&cmd).await?;
        parse_component(&cmd, &out)
    }
}

/// Opens a `ClearToolRepository` per build workspace.
#[derive(Clone)]
pub struct ClearToolProvider {
    launcher: Arc<dyn CommandLauncher>,
    exe: String,
}

impl ClearToolProvider {
    pub fn new(launcher: Arc<dyn CommandLauncher>, exe: impl Into<String>) -> Self {
        Self {
            launcher,
            exe: exe.into(),
        }
    }
}

impl RepositoryProvider for ClearToolProvider {
    fn open(&self, workspace_root: &Path) -> Arc<dyn BaselineRepository> {
        Arc::new(ClearToolRepository::new(
            self.launcher.clone(),
            self.exe.clone(),
            workspace_root,
        ))
    }
}
