//! Value types shared by the ports and the workflows.
//!
//! Baselines, streams and components are identifiers only: their promotion
//! level and ownership live in the backend and are queried through
//! [`BaselineRepository`](crate::BaselineRepository) on every run.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SelectorError;

/// Name of the build parameter carrying the promoted latest baselines.
pub const LATEST_BASELINE_PARAM: &str = "LATEST_BASELINE";

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// Split `name@qualifier` into its parts, trimming whitespace and quotes.
///
/// The qualifier is kept verbatim (separator included) so that both
/// `@\pvob` and `@/vobs/pvob` forms round-trip.
fn split_selector(raw: &str, prefix: &str) -> Option<(String, Option<String>)> {
    let trimmed = raw.trim().trim_matches('"').trim();
    let trimmed = trimmed.strip_prefix(prefix).unwrap_or(trimmed);
    let (name, qualifier) = match trimmed.split_once('@') {
        Some((name, qualifier)) => (name, Some(qualifier)),
        None => (trimmed, None),
    };
    if name.is_empty() {
        return None;
    }
    let qualifier = qualifier.filter(|q| !q.is_empty()).map(str::to_string);
    Some((name.to_string(), qualifier))
}

fn fmt_selector(f: &mut fmt::Formatter<'_>, name: &str, qualifier: Option<&str>) -> fmt::Result {
    match qualifier {
        Some(q) => write!(f, "{}@{}", name, q),
        None => write!(f, "{}", name),
    }
}

/// A UCM baseline identifier (`name@qualifier`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Baseline {
    name: String,
    qualifier: Option<String>,
}

impl Baseline {
    pub fn new(name: impl Into<String>, qualifier: Option<String>) -> Self {
        Self {
            name: name.into(),
            qualifier,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Project-VOB qualifier, without the leading `@`.
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }
}

impl FromStr for Baseline {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        split_selector(s, "baseline:")
            .map(|(name, qualifier)| Self { name, qualifier })
            .ok_or_else(|| SelectorError {
                kind: "baseline",
                selector: s.to_string(),
            })
    }
}

impl TryFrom<String> for Baseline {
    type Error = SelectorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Baseline> for String {
    fn from(b: Baseline) -> Self {
        b.to_string()
    }
}

impl fmt::Display for Baseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_selector(f, &self.name, self.qualifier())
    }
}

/// A UCM stream identifier (`name@qualifier`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Stream {
    name: String,
    qualifier: Option<String>,
}

impl Stream {
    pub fn new(name: impl Into<String>, qualifier: Option<String>) -> Self {
        Self {
            name: name.into(),
            qualifier,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }
}

impl FromStr for Stream {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        split_selector(s, "stream:")
            .map(|(name, qualifier)| Self { name, qualifier })
            .ok_or_else(|| SelectorError {
                kind: "stream",
                selector: s.to_string(),
            })
    }
}

impl TryFrom<String> for Stream {
    type Error = SelectorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Stream> for String {
    fn from(s: Stream) -> Self {
        s.to_string()
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_selector(f, &self.name, self.qualifier())
    }
}

/// A UCM component, compared by name only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Component(String);

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Component(name.into())
    }

    /// Parse a component as printed by the backend.
    ///
    /// Accepts `Name`, `component:Name` and `component:Name@\pvob`.
    pub fn from_backend(raw: &str) -> Option<Self> {
        split_selector(raw, "component:").map(|(name, _)| Component(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PromotionLevel
// ---------------------------------------------------------------------------

/// Lifecycle tag of a baseline.
///
/// Anything the backend prints that is not one of the four well-known levels
/// is `Other`, carrying the raw text. Custom release levels (e.g. `STAGED`)
/// are expressed the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PromotionLevel {
    Initial,
    Built,
    Rejected,
    Released,
    Other(String),
}

impl PromotionLevel {
    /// Parse raw backend output. Never fails.
    pub fn parse(raw: &str) -> Self {
        let level = raw.trim().trim_matches('"').trim();
        match level {
            "INITIAL" => PromotionLevel::Initial,
            "BUILT" => PromotionLevel::Built,
            "REJECTED" => PromotionLevel::Rejected,
            "RELEASED" => PromotionLevel::Released,
            other => PromotionLevel::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PromotionLevel::Initial => "INITIAL",
            PromotionLevel::Built => "BUILT",
            PromotionLevel::Rejected => "REJECTED",
            PromotionLevel::Released => "RELEASED",
            PromotionLevel::Other(raw) => raw,
        }
    }

    pub fn is_other(&self) -> bool {
        matches!(self, PromotionLevel::Other(_))
    }
}

impl From<String> for PromotionLevel {
    fn from(s: String) -> Self {
        PromotionLevel::parse(&s)
    }
}

impl From<PromotionLevel> for String {
    fn from(level: PromotionLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for PromotionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Build host records
// ---------------------------------------------------------------------------

/// Reference to one build of a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildRef {
    pub job: String,
    pub number: u32,
}

impl BuildRef {
    pub fn new(job: impl Into<String>, number: u32) -> Self {
        Self {
            job: job.into(),
            number,
        }
    }
}

impl fmt::Display for BuildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.job, self.number)
    }
}

/// Durable record of a successful promotion, attached to the owning build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub id: Uuid,
    pub description: String,
    /// Promoted baselines, in promotion order.
    pub baselines: Vec<Baseline>,
    pub build: BuildRef,
    /// Level the baselines were promoted to.
    pub level: PromotionLevel,
    pub created_at: DateTime<Utc>,
}

impl ReleaseRecord {
    pub fn new(
        build: BuildRef,
        description: impl Into<String>,
        baselines: Vec<Baseline>,
        level: PromotionLevel,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            baselines,
            build,
            level,
            created_at: Utc::now(),
        }
    }

    /// The badge shown on the build while this record is active.
    pub fn badge(&self) -> ReleaseBadge {
        ReleaseBadge {
            release_id: self.id,
            description: self.description.clone(),
        }
    }
}

/// Marker displayed on a released build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseBadge {
    pub release_id: Uuid,
    pub description: String,
}

/// A string build parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParameter {
    pub name: String,
    pub value: String,
}

impl BuildParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Something attached to a build by a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildAction {
    Badge(ReleaseBadge),
    Release(ReleaseRecord),
    Parameters { parameters: Vec<BuildParameter> },
}

// ---------------------------------------------------------------------------
// Job configuration
// ---------------------------------------------------------------------------

/// VCS source configured on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScmSource {
    /// ClearCase UCM, building from a stream.
    Ucm { stream: Stream },
    /// Any other VCS; release workflows ignore it.
    Other { kind: String },
}

/// Composite baseline produced by the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeConfig {
    /// Baseline name, possibly containing `${VAR}` macros.
    pub name_pattern: String,
    /// Stream selector; its qualifier names the project VOB.
    ///
    /// A selector without `@` has no qualifier, and the composite baseline
    /// is then addressed by its bare name.
    pub stream_selector: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_parses_backend_forms() {
        let b: Baseline = "baseline:LinkManager-4.3.0@\\P_ORC".parse().unwrap();
        assert_eq!(b.name(), "LinkManager-4.3.0");
        assert_eq!(b.qualifier(), Some("\\P_ORC"));
        assert_eq!(b.to_string(), "LinkManager-4.3.0@\\P_ORC");

        let unix: Baseline = " \"REL_1@/vobs/pvob\" ".parse().unwrap();
        assert_eq!(unix.to_string(), "REL_1@/vobs/pvob");

        let bare: Baseline = "REL_2".parse().unwrap();
        assert_eq!(bare.qualifier(), None);
    }

    #[test]
    fn empty_selector_is_rejected() {
        assert!("".parse::<Baseline>().is_err());
        assert!("@\\P_ORC".parse::<Stream>().is_err());
    }

    #[test]
    fn component_ignores_prefix_and_qualifier() {
        let c = Component::from_backend("component:TracMgt_Rqtf@\\P_ORC").unwrap();
        assert_eq!(c, Component::new("TracMgt_Rqtf"));
        assert_eq!(Component::from_backend("TracMgt_Rqtf").unwrap(), c);
        assert!(Component::from_backend("  ").is_none());
    }

    #[test]
    fn promotion_level_parse() {
        assert_eq!(PromotionLevel::parse("BUILT\n"), PromotionLevel::Built);
        assert_eq!(PromotionLevel::parse("\"RELEASED\""), PromotionLevel::Released);
        let staged = PromotionLevel::parse("STAGED");
        assert!(staged.is_other());
        assert_eq!(staged.as_str(), "STAGED");
    }

    #[test]
    fn build_action_serde_is_tagged() {
        let record = ReleaseRecord::new(
            BuildRef::new("job", 3),
            "X@\\P:RELEASED",
            vec!["X@\\P".parse().unwrap()],
            PromotionLevel::Released,
        );
        let json = serde_json::to_value(BuildAction::Release(record.clone())).unwrap();
        assert_eq!(json["kind"], "release");
        assert_eq!(json["baselines"][0], "X@\\P");
        assert_eq!(json["level"], "RELEASED");

        let back: BuildAction = serde_json::from_value(json).unwrap();
        assert_eq!(back, BuildAction::Release(record));
    }

    #[test]
    fn badge_references_record() {
        let record = ReleaseRecord::new(
            BuildRef::new("job", 1),
            "desc",
            Vec::new(),
            PromotionLevel::Released,
        );
        let badge = record.badge();
        assert_eq!(badge.release_id, record.id);
        assert_eq!(badge.description, "desc");
    }
}
