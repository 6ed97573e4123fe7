//! Release-State: domain model and ports for ClearCase release workflows
//!
//! ## Layer 0 - Model/Ports
//!
//! Focus: the identifiers the workflows pass around and the two narrow
//! interfaces they consume.
//!
//! ## Key Components
//!
//! - `Baseline`, `Stream`, `Component`, `PromotionLevel`: backend identifiers
//! - `ReleaseRecord`, `ReleaseBadge`, `BuildAction`: what a release leaves on a build
//! - `BaselineRepository`: VCS backend port
//! - `BuildHost`: job/build host port
//! - `FsBuildHost`: JSON-file build host used by the CLI

mod error;
pub mod fakes;
mod fs_host;
mod model;
pub mod port_traits;

pub use error::{BackendError, HostError, SelectorError};
pub use fs_host::{BuildFile, FsBuildHost, JobFile};
pub use model::{
    Baseline, BuildAction, BuildParameter, BuildRef, Component, CompositeConfig, PromotionLevel,
    ReleaseBadge, ReleaseRecord, ScmSource, Stream, LATEST_BASELINE_PARAM,
};
pub use port_traits::{
    BackendResult, BaselineRepository, BuildHost, HostResult, RepositoryProvider,
};
