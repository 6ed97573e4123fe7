//! Error taxonomy for release workflows.

use release_state::{BackendError, BuildRef, HostError, SelectorError};

use crate::triggers::Permission;

/// Errors produced while submitting or running a release workflow.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("build host error: {0}")]
    Host(#[from] HostError),

    #[error("{0}")]
    Selector(#[from] SelectorError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("a release run is already active for {owner}")]
    AlreadyRunning { owner: BuildRef },

    #[error("permission {permission} required on job {job}")]
    PermissionDenied { job: String, permission: Permission },

    #[error("cancellation left {failed} of {total} baselines unrestored")]
    CancelIncomplete { failed: usize, total: usize },

    #[error("run for {owner} ended without a report")]
    RunLost { owner: BuildRef },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseError {
    /// Whether the run was stopped by an external interruption.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ReleaseError::Backend(e) if e.is_interrupted())
    }
}

/// Result type for release operations.
pub type Result<T> = std::result::Result<T, ReleaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_error_display() {
        let err = ReleaseError::AlreadyRunning {
            owner: BuildRef::new("ProjectA", 12),
        };
        assert!(err.to_string().contains("ProjectA#12"));

        let err = ReleaseError::PermissionDenied {
            job: "ProjectA".to_string(),
            permission: Permission::Tag,
        };
        assert_eq!(err.to_string(), "permission Tag required on job ProjectA");
    }

    #[test]
    fn test_interrupted_is_detected_through_backend() {
        let err: ReleaseError = BackendError::Interrupted {
            command: "cleartool chbl".to_string(),
        }
        .into();
        assert!(err.is_interrupted());

        let err = ReleaseError::Config("bad".to_string());
        assert!(!err.is_interrupted());
    }
}
