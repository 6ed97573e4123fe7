//! Backend command execution.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use release_state::{BackendError, BackendResult};
use tokio::process::Command;
use tracing::debug;

/// Runs a backend tool and returns its captured stdout.
///
/// Contract:
/// - non-zero exit is `BackendError::NonZeroExit`
/// - a failure to start the tool is `BackendError::Launch`
/// - a process killed by a signal is `BackendError::Interrupted`
#[async_trait]
pub trait CommandLauncher: Send + Sync {
    async fn run(&self, tool: &str, args: &[String], work_dir: &Path) -> BackendResult<String>;
}

/// Launches the tool as a local subprocess.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    /// Timeout in seconds; `0` waits forever.
    timeout_secs: u64,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the process and fail after `secs` seconds (`0` disables).
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn render(tool: &str, args: &[String]) -> String {
    let mut line = tool.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[async_trait]
impl CommandLauncher for ProcessLauncher {
    async fn run(&self, tool: &str, args: &[String], work_dir: &Path) -> BackendResult<String> {
        let start = Instant::now();
        let command = render(tool, args);

        let mut cmd = Command::new(tool);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if work_dir.is_dir() {
            cmd.current_dir(work_dir);
        } else {
            debug!(work_dir = %work_dir.display(), "workspace missing, using current directory");
        }

        let child = cmd.spawn().map_err(|e| BackendError::Launch {
            tool: tool.to_string(),
            message: e.to_string(),
        })?;

        let waited = if self.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(self.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| BackendError::TimedOut {
                command: command.clone(),
                secs: self.timeout_secs,
            })?
        } else {
            child.wait_with_output().await
        };
        let output = waited.map_err(|e| BackendError::Launch {
            tool: tool.to_string(),
            message: e.to_string(),
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(command = %command, duration_ms, status = ?output.status, "backend command finished");

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        match output.status.code() {
            Some(0) => Ok(stdout),
            Some(code) => Err(BackendError::NonZeroExit {
                command,
                code,
                stderr,
            }),
            // No exit code: terminated by a signal.
            None => Err(BackendError::Interrupted { command }),
        }
    }
}
