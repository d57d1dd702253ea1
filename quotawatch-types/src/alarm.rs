//! Alarm definitions derived from limits.

use std::fmt;
use std::str::FromStr;

use crate::Dimension;

/// Evaluation period of every generated alarm, in seconds (one hour).
pub const ALARM_PERIOD_SECS: u32 = 3600;

/// Number of periods an alarm is evaluated over (four hours).
pub const ALARM_EVALUATION_PERIODS: u32 = 4;

/// Tag key marking alarms created by this tool.
pub const PROVENANCE_TAG_KEY: &str = "generated-by";

/// Default value of the provenance tag.
///
/// Existing deployments match on this value, so it is kept stable.
pub const DEFAULT_PROVENANCE: &str = "terraform-module-aws-limits";

/// Alarm class. Each severity has its own threshold percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    Warn,
    Crit,
}

impl Severity {
    /// Both severities, in the order alarms are generated.
    pub const ALL: [Severity; 2] = [Severity::Warn, Severity::Crit];

    /// Short name used in alarm names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warn => "warn",
            Severity::Crit => "crit",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names neither `warn` nor `crit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSeverity(pub String);

impl fmt::Display for UnknownSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown alarm severity \"{}\"", self.0)
    }
}

impl std::error::Error for UnknownSeverity {}

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warn" => Ok(Severity::Warn),
            "crit" => Ok(Severity::Crit),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComparisonOperator {
    GreaterThanOrEqualToThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Statistic {
    Maximum,
}

/// How the backend treats periods with no data points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum TreatMissingData {
    Breaching,
    NotBreaching,
    Ignore,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A threshold alarm to upsert on the monitoring backend.
///
/// Serializes to the PascalCase shape used by alarm upsert APIs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct AlarmDefinition {
    /// `"{service} {limit} {severity}"`, plus `" {resource_id}"` when the
    /// dimensions carry a resource id.
    pub alarm_name: String,

    /// `"{service} {limit}"`. Space-joined, unlike `Metric::metric_name`.
    pub metric_name: String,

    pub namespace: String,
    pub alarm_actions: Vec<String>,
    pub statistic: Statistic,
    pub period: u32,
    pub evaluation_periods: u32,
    pub threshold: f64,
    pub comparison_operator: ComparisonOperator,
    pub treat_missing_data: TreatMissingData,
    pub dimensions: Vec<Dimension>,
    pub tags: Vec<Tag>,
}

impl AlarmDefinition {
    /// Value of a tag, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}
