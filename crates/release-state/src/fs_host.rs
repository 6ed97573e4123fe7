//! Filesystem-backed build host.
//!
//! Layout:
//! - `<root>/jobs/<job>/job.json`: job configuration ([`JobFile`])
//! - `<root>/jobs/<job>/builds/<number>/build.json`: build state ([`BuildFile`])
//!
//! Mutations are applied to an in-memory copy of the build and only reach
//! disk on [`BuildHost::save`], mirroring how a scheduler persists its build
//! records.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::HostError;
use crate::model::{BuildAction, BuildRef, CompositeConfig, ScmSource};
use crate::port_traits::{BuildHost, HostResult};

/// Job configuration as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFile {
    #[serde(default)]
    pub scm: Option<ScmSource>,
    #[serde(default)]
    pub composite: Option<CompositeConfig>,
    /// Workspace override; defaults to `<root>/jobs/<job>/workspace`.
    #[serde(default)]
    pub workspace: Option<PathBuf>,
}

/// Build state as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFile {
    pub successful: bool,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub actions: Vec<BuildAction>,
    #[serde(default)]
    pub keep_log: bool,
}

/// Build host persisting jobs and builds as JSON files.
pub struct FsBuildHost {
    jobs_dir: PathBuf,
    builds: Mutex<HashMap<BuildRef, BuildFile>>,
}

impl FsBuildHost {
    /// Create a host rooted at `root`. Creates `root/jobs/` if needed.
    pub fn new(root: impl AsRef<Path>) -> HostResult<Self> {
        let jobs_dir = root.as_ref().join("jobs");
        std::fs::create_dir_all(&jobs_dir)?;
        Ok(Self {
            jobs_dir,
            builds: Mutex::new(HashMap::new()),
        })
    }

    fn job_dir(&self, job: &str) -> HostResult<PathBuf> {
        if job.is_empty() || job.contains(['/', '\\']) || job == "." || job == ".." {
            return Err(HostError::JobNotFound {
                job: job.to_string(),
            });
        }
        Ok(self.jobs_dir.join(job))
    }

    fn build_path(&self, build: &BuildRef) -> HostResult<PathBuf> {
        Ok(self
            .job_dir(&build.job)?
            .join("builds")
            .join(build.number.to_string())
            .join("build.json"))
    }

    /// Write a job configuration.
    pub async fn write_job(&self, job: &str, file: &JobFile) -> HostResult<()> {
        let path = self.job_dir(job)?.join("job.json");
        write_json(path, serde_json::to_vec_pretty(file)?).await
    }

    /// Record a new build and persist it.
    pub async fn record_build(&self, build: &BuildRef, file: BuildFile) -> HostResult<()> {
        let path = self.build_path(build)?;
        write_json(path, serde_json::to_vec_pretty(&file)?).await?;
        self.builds.lock().await.insert(build.clone(), file);
        Ok(())
    }

    async fn read_job(&self, job: &str) -> HostResult<JobFile> {
        let path = self.job_dir(job)?.join("job.json");
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(HostError::JobNotFound {
                job: job.to_string(),
            }),
            Err(e) => Err(HostError::Io(e)),
        }
    }

    async fn read_build(&self, build: &BuildRef) -> HostResult<BuildFile> {
        let path = self.build_path(build)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(HostError::BuildNotFound {
                build: build.clone(),
            }),
            Err(e) => Err(HostError::Io(e)),
        }
    }

    /// Run `f` against the cached build, loading it from disk on first use.
    async fn with_build<T>(
        &self,
        build: &BuildRef,
        f: impl FnOnce(&mut BuildFile) -> T,
    ) -> HostResult<T> {
        let mut builds = self.builds.lock().await;
        if !builds.contains_key(build) {
            let file = self.read_build(build).await?;
            builds.insert(build.clone(), file);
        }
        match builds.get_mut(build) {
            Some(file) => Ok(f(file)),
            None => Err(HostError::BuildNotFound {
                build: build.clone(),
            }),
        }
    }

    async fn build_numbers(&self, job: &str) -> HostResult<Vec<u32>> {
        let dir = self.job_dir(job)?.join("builds");
        let mut numbers = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(numbers),
            Err(e) => return Err(HostError::Io(e)),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(n) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                numbers.push(n);
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }
}

/// Atomic write: temp file in the target directory, then rename.
async fn write_json(path: PathBuf, bytes: Vec<u8>) -> HostResult<()> {
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(())
}

#[async_trait]
impl BuildHost for FsBuildHost {
    async fn workspace_root(&self, build: &BuildRef) -> HostResult<PathBuf> {
        let job = self.read_job(&build.job).await?;
        match job.workspace {
            Some(dir) => Ok(dir),
            None => Ok(self.job_dir(&build.job)?.join("workspace")),
        }
    }

    async fn environment(&self, build: &BuildRef) -> HostResult<BTreeMap<String, String>> {
        let mut env = self.with_build(build, |b| b.environment.clone()).await?;
        env.entry("JOB_NAME".to_string())
            .or_insert_with(|| build.job.clone());
        env.entry("BUILD_NUMBER".to_string())
            .or_insert_with(|| build.number.to_string());
        Ok(env)
    }

    async fn scm_source(&self, job: &str) -> HostResult<Option<ScmSource>> {
        Ok(self.read_job(job).await?.scm)
    }

    async fn composite_config(&self, job: &str) -> HostResult<Option<CompositeConfig>> {
        Ok(self.read_job(job).await?.composite)
    }

    async fn last_successful_build(&self, job: &str) -> HostResult<Option<BuildRef>> {
        self.read_job(job).await?;
        for number in self.build_numbers(job).await?.into_iter().rev() {
            let build = BuildRef::new(job, number);
            if self.with_build(&build, |b| b.successful).await? {
                return Ok(Some(build));
            }
        }
        Ok(None)
    }

    async fn actions(&self, build: &BuildRef) -> HostResult<Vec<BuildAction>> {
        self.with_build(build, |b| b.actions.clone()).await
    }

    async fn add_action(&self, build: &BuildRef, action: BuildAction) -> HostResult<()> {
        self.with_build(build, |b| b.actions.push(action)).await
    }

    async fn remove_action(&self, build: &BuildRef, action: &BuildAction) -> HostResult<bool> {
        self.with_build(build, |b| {
            let before = b.actions.len();
            b.actions.retain(|a| a != action);
            b.actions.len() != before
        })
        .await
    }

    async fn keep_log(&self, build: &BuildRef, keep: bool) -> HostResult<()> {
        self.with_build(build, |b| b.keep_log = keep).await
    }

    async fn is_kept(&self, build: &BuildRef) -> HostResult<bool> {
        self.with_build(build, |b| b.keep_log).await
    }

    async fn save(&self, build: &BuildRef) -> HostResult<()> {
        let file = self.with_build(build, |b| b.clone()).await?;
        let path = self.build_path(build)?;
        debug!(build = %build, path = %path.display(), "saving build");
        write_json(path, serde_json::to_vec_pretty(&file)?).await
    }
}
