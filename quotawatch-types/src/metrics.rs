//! Normalized metric records.

use crate::RESOURCE_ID_DIMENSION;

/// A name/value pair qualifying a metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    /// Create a new dimension.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One metric record, derived from one usage sample.
///
/// Serializes to the `MetricName` / `Dimensions` / `Value` shape used by
/// metric ingest APIs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct Metric {
    /// Metric name, `"{service}-{limit}"`.
    pub metric_name: String,

    /// Ordered dimensions. Only dimensions whose source field was present.
    #[cfg_attr(feature = "serde", serde(default))]
    pub dimensions: Vec<Dimension>,

    /// Observed value.
    pub value: f64,
}

impl Metric {
    /// Look up a dimension value by name.
    pub fn dimension(&self, name: &str) -> Option<&str> {
        find_dimension(&self.dimensions, name)
    }
}

/// Look up a dimension value by name in an ordered dimension list.
pub fn find_dimension<'a>(dimensions: &'a [Dimension], name: &str) -> Option<&'a str> {
    dimensions
        .iter()
        .find(|d| d.name == name)
        .map(|d| d.value.as_str())
}

/// The `resource_id` dimension value, if present.
pub fn resource_id_of(dimensions: &[Dimension]) -> Option<&str> {
    find_dimension(dimensions, RESOURCE_ID_DIMENSION)
}
