//! Release-Core: ClearCase UCM release workflows
//!
//! Promotes `BUILT` baselines to a release level, records the release on
//! the owning build and withdraws it on request. Runs are executed in the
//! background by [`TaskRunner`], one at a time per owning build.

pub mod cancellation;
pub mod config;
pub mod error;
pub mod macros;
pub mod metrics;
pub mod obs;
pub mod promotion;
pub mod selector;
pub mod task_runner;
pub mod telemetry;
pub mod triggers;
pub mod workflow;

pub use config::ReleaseConfig;
pub use error::{ReleaseError, Result};
pub use macros::expand_macros;
pub use selector::select;
pub use task_runner::{RunHandle, RunView, TaskRunner};
pub use triggers::{AllowAll, Permission, PermissionCheck};
pub use workflow::{
    NoOpReason, Outcome, ReleaseContext, RunLog, RunReport, RunState, Workflow,
};
