//! Cleartool-Exec: ClearCase UCM backend
//!
//! Implements `BaselineRepository` by running `cleartool` in the build
//! workspace and parsing its output.
//!
//! ## Key Components
//!
//! - `ClearToolCommand`: the command table
//! - `CommandLauncher`/`ProcessLauncher`: subprocess execution with optional timeout
//! - `ClearToolRepository`: the repository itself
//! - `ClearToolProvider`: opens one repository per build workspace

mod command;
pub mod fakes;
mod launcher;
mod repository;

pub use command::ClearToolCommand;
pub use launcher::{CommandLauncher, ProcessLauncher};
pub use repository::{ClearToolProvider, ClearToolRepository};
