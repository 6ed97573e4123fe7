//! Release configuration.
//!
//! Loaded from a TOML file or from `CLEARCASE_RELEASE_*` environment
//! variables. Job-level settings (stream, composite pattern) come from the
//! build host, not from here.

use std::path::Path;

use release_state::PromotionLevel;
use serde::{Deserialize, Serialize};

use crate::error::{ReleaseError, Result};

pub const ENV_CLEARTOOL: &str = "CLEARCASE_RELEASE_CLEARTOOL";
pub const ENV_PROMOTION_LEVEL: &str = "CLEARCASE_RELEASE_PROMOTION_LEVEL";
pub const ENV_TIMEOUT_SECS: &str = "CLEARCASE_RELEASE_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// cleartool executable name or path.
    pub cleartool_exe: String,

    /// Level used instead of `RELEASED` when promoting.
    pub custom_promotion_level: Option<String>,

    /// Per-command timeout; `0` disables it.
    pub command_timeout_secs: u64,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            cleartool_exe: "cleartool".to_string(),
            custom_promotion_level: None,
            command_timeout_secs: 0,
        }
    }
}

impl ReleaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cleartool_exe(mut self, exe: impl Into<String>) -> Self {
        self.cleartool_exe = exe.into();
        self
    }

    pub fn with_custom_promotion_level(mut self, level: impl Into<String>) -> Self {
        self.custom_promotion_level = Some(level.into());
        self
    }

    pub fn with_command_timeout_secs(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    /// Level baselines are promoted to.
    pub fn target_level(&self) -> PromotionLevel {
        match self.custom_promotion_level.as_deref().map(str::trim) {
            Some(level) if !level.is_empty() => PromotionLevel::parse(level),
            _ => PromotionLevel::Released,
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(exe) = lookup(ENV_CLEARTOOL).filter(|v| !v.trim().is_empty()) {
            config.cleartool_exe = exe;
        }
        if let Some(level) = lookup(ENV_PROMOTION_LEVEL).filter(|v| !v.trim().is_empty()) {
            config.custom_promotion_level = Some(level);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config.command_timeout_secs = raw.trim().parse().map_err(|_| {
                ReleaseError::Config(format!("{ENV_TIMEOUT_SECS} must be a number, got {raw:?}"))
            })?;
        }
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ReleaseError::Config(e.to_string()))
    }

    /// Load a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Overlay environment variables on top of this configuration.
    pub fn merge_env(self) -> Result<Self> {
        self.merge_lookup(|key| std::env::var(key).ok())
    }

    fn merge_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Self::from_lookup(&lookup)?;
        if lookup(ENV_CLEARTOOL).is_some_and(|v| !v.trim().is_empty()) {
            self.cleartool_exe = env.cleartool_exe;
        }
        if env.custom_promotion_level.is_some() {
            self.custom_promotion_level = env.custom_promotion_level;
        }
        if lookup(ENV_TIMEOUT_SECS).is_some() {
            self.command_timeout_secs = env.command_timeout_secs;
        }
        Ok(self)
    }
}
