//! In-memory fakes for the ports (testing only)
//!
//! Provides `MemoryBaselineRepository` and `MemoryBuildHost` that satisfy the
//! trait contracts without a ClearCase installation or a job scheduler.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{BackendError, HostError};
use crate::model::*;
use crate::port_traits::*;

// ---------------------------------------------------------------------------
// MemoryBaselineRepository
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StreamState {
    latest: Vec<Baseline>,
    modifiable: HashSet<Component>,
}

#[derive(Debug, Default)]
struct RepoState {
    levels: HashMap<Baseline, PromotionLevel>,
    components: HashMap<Baseline, Component>,
    streams: HashMap<Stream, StreamState>,
    failing_sets: HashMap<Baseline, BackendError>,
    set_calls: Vec<(Baseline, PromotionLevel)>,
}

/// In-memory baseline registry.
///
/// Records every `set_promotion_level` call so tests can assert on the exact
/// mutation sequence, and can be told to fail a mutation for a baseline.
#[derive(Debug, Default)]
pub struct MemoryBaselineRepository {
    state: Mutex<RepoState>,
}

impl MemoryBaselineRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a baseline with its component and current level.
    pub fn with_baseline(self, baseline: &Baseline, component: &str, level: PromotionLevel) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.levels.insert(baseline.clone(), level);
            state
                .components
                .insert(baseline.clone(), Component::new(component));
        }
        self
    }

    /// Register a stream's latest baselines and modifiable components.
    pub fn with_stream(self, stream: &Stream, latest: &[Baseline], modifiable: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.streams.insert(
                stream.clone(),
                StreamState {
                    latest: latest.to_vec(),
                    modifiable: modifiable.iter().map(|c| Component::new(*c)).collect(),
                },
            );
        }
        self
    }

    /// Make every `set_promotion_level` on `baseline` fail with `error`.
    pub fn fail_set_on(&self, baseline: &Baseline, error: BackendError) {
        let mut state = self.state.lock().unwrap();
        state.failing_sets.insert(baseline.clone(), error);
    }

    /// Current level of a registered baseline.
    pub fn level(&self, baseline: &Baseline) -> Option<PromotionLevel> {
        let state = self.state.lock().unwrap();
        state.levels.get(baseline).cloned()
    }

    /// Every successful `set_promotion_level` call, in order.
    pub fn set_calls(&self) -> Vec<(Baseline, PromotionLevel)> {
        let state = self.state.lock().unwrap();
        state.set_calls.clone()
    }
}

fn unknown(what: &str, name: &str) -> BackendError {
    BackendError::NonZeroExit {
        command: format!("memory {}", what),
        code: 1,
        stderr: format!("{} not found: {}", what, name),
    }
}

#[async_trait]
impl BaselineRepository for MemoryBaselineRepository {
    async fn get_promotion_level(&self, baseline: &Baseline) -> BackendResult<PromotionLevel> {
        let state = self.state.lock().unwrap();
        state
            .levels
            .get(baseline)
            .cloned()
            .ok_or_else(|| unknown("baseline", &baseline.to_string()))
    }

    async fn set_promotion_level(
        &self,
        baseline: &Baseline,
        level: &PromotionLevel,
    ) -> BackendResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.failing_sets.get(baseline) {
            return Err(err.clone());
        }
        if !state.levels.contains_key(baseline) {
            return Err(unknown("baseline", &baseline.to_string()));
        }
        state.levels.insert(baseline.clone(), level.clone());
        state.set_calls.push((baseline.clone(), level.clone()));
        Ok(())
    }

    async fn list_latest_baselines(&self, stream: &Stream) -> BackendResult<Vec<Baseline>> {
        let state = self.state.lock().unwrap();
        state
            .streams
            .get(stream)
            .map(|s| s.latest.clone())
            .ok_or_else(|| unknown("stream", &stream.to_string()))
    }

    async fn list_modifiable_components(
        &self,
        stream: &Stream,
    ) -> BackendResult<HashSet<Component>> {
        let state = self.state.lock().unwrap();
        state
            .streams
            .get(stream)
            .map(|s| s.modifiable.clone())
            .ok_or_else(|| unknown("stream", &stream.to_string()))
    }

    async fn get_component(&self, baseline: &Baseline) -> BackendResult<Component> {
        let state = self.state.lock().unwrap();
        state
            .components
            .get(baseline)
            .cloned()
            .ok_or_else(|| unknown("baseline", &baseline.to_string()))
    }
}

// ---------------------------------------------------------------------------
// MemoryBuildHost
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BuildState {
    successful: bool,
    environment: BTreeMap<String, String>,
    actions: Vec<BuildAction>,
    kept: bool,
    saves: u32,
}

#[derive(Debug, Default)]
struct JobState {
    scm: Option<ScmSource>,
    composite: Option<CompositeConfig>,
    builds: BTreeMap<u32, BuildState>,
}

/// In-memory build host backed by a `HashMap<job, JobState>`.
#[derive(Debug, Default)]
pub struct MemoryBuildHost {
    jobs: Mutex<HashMap<String, JobState>>,
}

impl MemoryBuildHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job.
    pub fn with_job(
        self,
        job: &str,
        scm: Option<ScmSource>,
        composite: Option<CompositeConfig>,
    ) -> Self {
        {
            let mut jobs = self.jobs.lock().unwrap();
            let state = jobs.entry(job.to_string()).or_default();
            state.scm = scm;
            state.composite = composite;
        }
        self
    }

    /// Register a build of an already registered job.
    pub fn with_build(
        self,
        build: &BuildRef,
        successful: bool,
        environment: &[(&str, &str)],
    ) -> Self {
        {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.entry(build.job.clone()).or_default();
            job.builds.insert(
                build.number,
                BuildState {
                    successful,
                    environment: environment
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    ..Default::default()
                },
            );
        }
        self
    }

    /// Number of times `save` was called for a build.
    pub fn save_count(&self, build: &BuildRef) -> u32 {
        let jobs = self.jobs.lock().unwrap();
        jobs.get(&build.job)
            .and_then(|j| j.builds.get(&build.number))
            .map(|b| b.saves)
            .unwrap_or(0)
    }

    fn with_build_state<T>(
        &self,
        build: &BuildRef,
        f: impl FnOnce(&mut BuildState) -> T,
    ) -> HostResult<T> {
        let mut jobs = self.jobs.lock().unwrap();
        let state = jobs
            .get_mut(&build.job)
            .and_then(|j| j.builds.get_mut(&build.number))
            .ok_or_else(|| HostError::BuildNotFound {
                build: build.clone(),
            })?;
        Ok(f(state))
    }

    fn with_job_state<T>(&self, job: &str, f: impl FnOnce(&JobState) -> T) -> HostResult<T> {
        let jobs = self.jobs.lock().unwrap();
        let state = jobs.get(job).ok_or_else(|| HostError::JobNotFound {
            job: job.to_string(),
        })?;
        Ok(f(state))
    }
}

#[async_trait]
impl BuildHost for MemoryBuildHost {
    async fn workspace_root(&self, build: &BuildRef) -> HostResult<PathBuf> {
        self.with_build_state(build, |_| PathBuf::from("/workspace").join(&build.job))
    }

    async fn environment(&self, build: &BuildRef) -> HostResult<BTreeMap<String, String>> {
        self.with_build_state(build, |b| b.environment.clone())
    }

    async fn scm_source(&self, job: &str) -> HostResult<Option<ScmSource>> {
        self.with_job_state(job, |j| j.scm.clone())
    }

    async fn composite_config(&self, job: &str) -> HostResult<Option<CompositeConfig>> {
        self.with_job_state(job, |j| j.composite.clone())
    }

    async fn last_successful_build(&self, job: &str) -> HostResult<Option<BuildRef>> {
        self.with_job_state(job, |j| {
            j.builds
                .iter()
                .rev()
                .find(|(_, b)| b.successful)
                .map(|(n, _)| BuildRef::new(job, *n))
        })
    }

    async fn actions(&self, build: &BuildRef) -> HostResult<Vec<BuildAction>> {
        self.with_build_state(build, |b| b.actions.clone())
    }

    async fn add_action(&self, build: &BuildRef, action: BuildAction) -> HostResult<()> {
        self.with_build_state(build, |b| b.actions.push(action))
    }

    async fn remove_action(&self, build: &BuildRef, action: &BuildAction) -> HostResult<bool> {
        self.with_build_state(build, |b| {
            let before = b.actions.len();
            b.actions.retain(|a| a != action);
            b.actions.len() != before
        })
    }

    async fn keep_log(&self, build: &BuildRef, keep: bool) -> HostResult<()> {
        self.with_build_state(build, |b| b.kept = keep)
    }

    async fn is_kept(&self, build: &BuildRef) -> HostResult<bool> {
        self.with_build_state(build, |b| b.kept)
    }

    async fn save(&self, build: &BuildRef) -> HostResult<()> {
        self.with_build_state(build, |b| b.saves += 1)
    }
}
