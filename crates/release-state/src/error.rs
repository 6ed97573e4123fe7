//! Error types for release-state

use thiserror::Error;

use crate::model::BuildRef;

/// Errors raised by the version-control backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend tool could not be started
    #[error("failed to launch {tool}: {message}")]
    Launch { tool: String, message: String },

    /// The backend tool ran but reported failure
    #[error("`{command}` exited with status {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    /// The backend process was terminated from outside
    #[error("`{command}` was interrupted")]
    Interrupted { command: String },

    /// The opt-in command timeout fired
    #[error("`{command}` timed out after {secs} seconds")]
    TimedOut { command: String, secs: u64 },

    /// Output that should have carried a value was empty or malformed
    #[error("unexpected output from `{command}`: {output:?}")]
    UnexpectedOutput { command: String, output: String },
}

impl BackendError {
    /// Whether this error comes from an external interruption of the process.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, BackendError::Interrupted { .. })
    }
}

/// Errors raised by the build host.
#[derive(Error, Debug)]
pub enum HostError {
    /// Unknown job
    #[error("job not found: {job}")]
    JobNotFound { job: String },

    /// Unknown build
    #[error("build not found: {build}")]
    BuildNotFound { build: BuildRef },

    /// Filesystem error
    #[error("host I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("host serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A selector string that does not name anything.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind} selector: {selector:?}")]
pub struct SelectorError {
    pub kind: &'static str,
    pub selector: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display_carries_command() {
        let err = BackendError::NonZeroExit {
            command: "cleartool chbl -level RELEASED A@\\P".to_string(),
            code: 1,
            stderr: "baseline not found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("chbl"));
        assert!(msg.contains("baseline not found"));
        assert!(!err.is_interrupted());
    }

    #[test]
    fn interrupted_is_detected() {
        let err = BackendError::Interrupted {
            command: "cleartool lsbl".to_string(),
        };
        assert!(err.is_interrupted());
    }

    #[test]
    fn host_error_names_build() {
        let err = HostError::BuildNotFound {
            build: BuildRef::new("nightly", 7),
        };
        assert!(err.to_string().contains("nightly#7"));
    }
}
