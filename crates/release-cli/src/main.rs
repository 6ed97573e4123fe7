//! ClearCase Release CLI
//!
//! The `clearcase-release` command promotes and cancels releases of the
//! builds kept by a filesystem build host.
//!
//! ## Commands
//!
//! - `promote-composite`: release the composite baseline of a build
//! - `promote-latest`: release the latest baselines of a job's stream
//! - `cancel`: withdraw the release attached to a build
//! - `status`: show the release attached to a build
//! - `on-build-complete`: build-completion hook
//! - `job` / `build`: register jobs and builds with the host

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cleartool_exec::{ClearToolProvider, ProcessLauncher};
use release_core::metrics::METRICS;
use release_core::telemetry::init_tracing;
use release_core::{AllowAll, ReleaseConfig, ReleaseContext, RunHandle, RunReport, TaskRunner};
use release_state::{
    BuildFile, BuildHost, BuildRef, CompositeConfig, FsBuildHost, JobFile, ScmSource, Stream,
    LATEST_BASELINE_PARAM,
};
use serde::Serialize;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "clearcase-release")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Promote ClearCase UCM baselines of CI builds to a release level", long_about = None)]
struct Cli {
    /// Build host directory
    #[arg(long, global = true, env = "CLEARCASE_RELEASE_HOME", default_value = ".clearcase-release")]
    home: PathBuf,

    /// Configuration file (default: <home>/release.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output and JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Release the composite baseline produced by a build
    PromoteComposite { job: String, build: u32 },

    /// Release the latest baselines of the job's stream
    PromoteLatest { job: String },

    /// Cancel the release attached to a build
    Cancel { job: String, build: u32 },

    /// Show the release attached to a build
    Status { job: String, build: u32 },

    /// Build-completion hook: release the composite baseline
    OnBuildComplete { job: String, build: u32 },

    /// Manage job configuration
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Manage builds
    Build {
        #[command(subcommand)]
        action: BuildCommand,
    },
}

#[derive(Subcommand)]
enum JobAction {
    /// Create or replace a job
    Set {
        job: String,

        /// UCM stream the job builds from (e.g. stream:int@\pvob)
        #[arg(long)]
        stream: Option<String>,

        /// Composite baseline name pattern, `${VAR}` macros allowed
        #[arg(long, requires = "composite_stream")]
        composite_pattern: Option<String>,

        /// Stream selector of the composite baseline
        #[arg(long)]
        composite_stream: Option<String>,

        /// Workspace directory cleartool runs in
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum BuildCommand {
    /// Record a finished build
    Record {
        job: String,
        build: u32,

        /// Mark the build as failed
        #[arg(long)]
        failed: bool,

        /// Build variable, KEY=VALUE (repeatable)
        #[arg(long = "env", value_parser = parse_key_val)]
        env: Vec<(String, String)>,
    },
}

fn parse_key_val(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let result = run(cli).await;
    METRICS.flush();
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.home.join("release.toml"));
    let config = ReleaseConfig::load(&config_path)
        .and_then(ReleaseConfig::merge_env)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    debug!(?config, "configuration loaded");

    let host = Arc::new(
        FsBuildHost::new(&cli.home)
            .with_context(|| format!("Failed to open build host at {}", cli.home.display()))?,
    );

    match cli.command {
        Commands::PromoteComposite { job, build } => {
            let runner = build_runner(host, config);
            let handle = runner.promote_composite(&job, build, &AllowAll).await?;
            finish(&runner, handle, cli.json).await
        }
        Commands::PromoteLatest { job } => {
            let runner = build_runner(host, config);
            let handle = runner.promote_latest(&job, &AllowAll).await?;
            finish(&runner, handle, cli.json).await
        }
        Commands::Cancel { job, build } => {
            let runner = build_runner(host, config);
            let handle = runner.cancel(&job, build, &AllowAll).await?;
            finish(&runner, handle, cli.json).await
        }
        Commands::OnBuildComplete { job, build } => {
            let runner = build_runner(host, config);
            let handle = runner.on_build_completed(&BuildRef::new(job, build))?;
            finish(&runner, handle, cli.json).await
        }
        Commands::Status { job, build } => {
            cmd_status(host.as_ref(), &BuildRef::new(job, build), cli.json).await
        }
        Commands::Job { action } => match action {
            JobAction::Set {
                job,
                stream,
                composite_pattern,
                composite_stream,
                workspace,
            } => {
                cmd_job_set(
                    &host,
                    &job,
                    stream.as_deref(),
                    composite_pattern.zip(composite_stream),
                    workspace,
                )
                .await
            }
        },
        Commands::Build { action } => match action {
            BuildCommand::Record {
                job,
                build,
                failed,
                env,
            } => cmd_build_record(&host, &BuildRef::new(job, build), !failed, env).await,
        },
    }
}

fn build_runner(host: Arc<FsBuildHost>, config: ReleaseConfig) -> TaskRunner {
    let launcher = ProcessLauncher::new().with_timeout_secs(config.command_timeout_secs);
    let provider = ClearToolProvider::new(Arc::new(launcher), config.cleartool_exe.clone());
    TaskRunner::new(ReleaseContext::new(host, Arc::new(provider), config))
}

#[derive(Serialize)]
struct RunOutput<'a> {
    report: &'a RunReport,
    log: String,
}

/// Wait for the run, print its log and fail on a failed outcome.
async fn finish(runner: &TaskRunner, handle: RunHandle, json: bool) -> Result<()> {
    let owner = handle.owner().clone();
    let report = handle.wait().await?;
    let log = runner.log(&owner).unwrap_or_default();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&RunOutput {
                report: &report,
                log,
            })?
        );
    } else {
        print!("{log}");
        println!("{} {}: {}", report.workflow, report.outcome.label(), report.message);
    }

    if report.outcome.is_failed() {
        bail!("release run for {} failed: {}", report.owner, report.message);
    }
    Ok(())
}

#[derive(Serialize)]
struct StatusOutput {
    build: BuildRef,
    kept: bool,
    release: Option<release_state::ReleaseRecord>,
    latest_baseline: Option<String>,
}

async fn cmd_status(host: &FsBuildHost, build: &BuildRef, json: bool) -> Result<()> {
    let status = StatusOutput {
        build: build.clone(),
        kept: host.is_kept(build).await?,
        release: host.active_release(build).await?,
        latest_baseline: host.parameter(build, LATEST_BASELINE_PARAM).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match &status.release {
        Some(record) => {
            println!("{} released: {}", build, record.description);
            println!("  release:  {}", record.id);
            println!("  level:    {}", record.level);
            println!(
                "  date:     {}",
                record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            for baseline in &record.baselines {
                println!("  baseline: {}", baseline);
            }
        }
        None => println!("{} has no active release", build),
    }
    if let Some(latest) = &status.latest_baseline {
        println!("  {}={}", LATEST_BASELINE_PARAM, latest);
    }
    println!("  kept:     {}", status.kept);
    Ok(())
}

async fn cmd_job_set(
    host: &FsBuildHost,
    job: &str,
    stream: Option<&str>,
    composite: Option<(String, String)>,
    workspace: Option<PathBuf>,
) -> Result<()> {
    let scm = stream
        .map(|s| {
            s.parse::<Stream>()
                .map(|stream| ScmSource::Ucm { stream })
                .with_context(|| format!("Invalid stream {s:?}"))
        })
        .transpose()?;
    let composite = composite.map(|(name_pattern, stream_selector)| CompositeConfig {
        name_pattern,
        stream_selector,
    });

    host.write_job(
        job,
        &JobFile {
            scm,
            composite,
            workspace: workspace.map(absolute),
        },
    )
    .await?;
    println!("Job {} saved", job);
    Ok(())
}

async fn cmd_build_record(
    host: &FsBuildHost,
    build: &BuildRef,
    successful: bool,
    env: Vec<(String, String)>,
) -> Result<()> {
    let environment: BTreeMap<String, String> = env.into_iter().collect();
    host.record_build(
        build,
        BuildFile {
            successful,
            environment,
            ..Default::default()
        },
    )
    .await?;
    println!("Build {} recorded", build);
    Ok(())
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&path))
        .unwrap_or(path)
}
