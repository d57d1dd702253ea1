//! Usage samples observed against a limit.

use std::fmt;

/// One observed usage point for a limit.
///
/// A limit may carry zero or many samples. Samples for per-resource quotas
/// (e.g. "rules per security group") carry the resource they were observed
/// on; account-wide quotas usually carry neither a type nor an id.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsageSample {
    /// Resource type the usage was observed on (e.g. "AWS::EC2::VPC").
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub aws_type: Option<String>,

    /// Identifier of the resource the usage was observed on.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub resource_id: Option<String>,

    /// Observed usage value.
    pub value: f64,
}

impl UsageSample {
    /// Create a sample with no resource attribution.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    /// Set the resource type.
    pub fn aws_type(mut self, aws_type: impl Into<String>) -> Self {
        self.aws_type = Some(aws_type.into());
        self
    }

    /// Set the resource id.
    pub fn resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }
}

impl fmt::Display for UsageSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource_id {
            Some(id) => write!(f, "{}={}", id, self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

/// Human-readable summary of a list of samples.
///
/// `<unknown>` when there are none, the single sample when there is one,
/// otherwise the largest sample prefixed with `max: `.
pub fn usage_summary(samples: &[UsageSample]) -> String {
    match samples {
        [] => "<unknown>".to_string(),
        [only] => only.to_string(),
        many => {
            let max = many
                .iter()
                .max_by(|a, b| a.value.total_cmp(&b.value))
                .map(|s| s.to_string())
                .unwrap_or_default();
            format!("max: {}", max)
        }
    }
}
