//! Scripted launcher for tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use release_state::{BackendError, BackendResult};

use crate::launcher::CommandLauncher;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCall {
    pub tool: String,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
}

/// Replies to exact argument lists with canned results.
///
/// Unscripted invocations fail with `NonZeroExit`.
#[derive(Default)]
pub struct ScriptedLauncher {
    responses: Mutex<HashMap<Vec<String>, BackendResult<String>>>,
    calls: Mutex<Vec<LaunchCall>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `args` with `stdout`.
    pub fn on(self, args: &[&str], stdout: &str) -> Self {
        self.respond(args, Ok(stdout.to_string()));
        self
    }

    /// Reply to `args` with an error.
    pub fn fail(self, args: &[&str], err: BackendError) -> Self {
        self.respond(args, Err(err));
        self
    }

    fn respond(&self, args: &[&str], result: BackendResult<String>) {
        let key = args.iter().map(|a| a.to_string()).collect();
        self.responses.lock().unwrap().insert(key, result);
    }

    pub fn calls(&self) -> Vec<LaunchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandLauncher for ScriptedLauncher {
    async fn run(&self, tool: &str, args: &[String], work_dir: &Path) -> BackendResult<String> {
        self.calls.lock().unwrap().push(LaunchCall {
            tool: tool.to_string(),
            args: args.to_vec(),
            work_dir: work_dir.to_path_buf(),
        });
        match self.responses.lock().unwrap().get(args) {
            Some(result) => result.clone(),
            None => Err(BackendError::NonZeroExit {
                command: format!("{} {}", tool, args.join(" ")),
                code: 1,
                stderr: "no scripted response".to_string(),
            }),
        }
    }
}
