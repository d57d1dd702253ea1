//! Limit to threshold alarm definitions.

use quotawatch_types::{
    resource_id_of, AlarmDefinition, ComparisonOperator, Dimension, QuotaLimit, Severity,
    Statistic, Tag, TreatMissingData, ALARM_EVALUATION_PERIODS, ALARM_PERIOD_SECS,
    DEFAULT_NAMESPACE, DEFAULT_PROVENANCE, PROVENANCE_TAG_KEY,
};

use crate::error::PipelineError;
use crate::thresholds::threshold_for;

/// Caller-supplied settings shared by every alarm of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmPolicy {
    /// Namespace the alarm's metric lives in.
    pub namespace: String,
    /// Notification targets attached verbatim to every alarm.
    pub actions: Vec<String>,
    /// Value of the `generated-by` tag.
    pub provenance: String,
}

impl Default for AlarmPolicy {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            actions: Vec::new(),
            provenance: DEFAULT_PROVENANCE.to_string(),
        }
    }
}

/// Build one alarm for a bounded limit.
///
/// `dimensions` are those of the metric the alarm watches. The caller must
/// only pass limits with resource limits; an unbounded limit is an error.
pub fn build_alarm<L: QuotaLimit + ?Sized>(
    limit: &L,
    severity: Severity,
    dimensions: &[Dimension],
    policy: &AlarmPolicy,
) -> Result<AlarmDefinition, PipelineError> {
    let threshold = threshold_for(limit, severity)?;

    let mut alarm_name = format!("{} {} {}", limit.service_name(), limit.name(), severity);
    if let Some(resource_id) = resource_id_of(dimensions) {
        alarm_name.push(' ');
        alarm_name.push_str(resource_id);
    }

    Ok(AlarmDefinition {
        alarm_name,
        metric_name: format!("{} {}", limit.service_name(), limit.name()),
        namespace: policy.namespace.clone(),
        alarm_actions: policy.actions.clone(),
        statistic: Statistic::Maximum,
        period: ALARM_PERIOD_SECS,
        evaluation_periods: ALARM_EVALUATION_PERIODS,
        threshold,
        comparison_operator: ComparisonOperator::GreaterThanOrEqualToThreshold,
        treat_missing_data: TreatMissingData::Breaching,
        dimensions: dimensions.to_vec(),
        tags: vec![Tag::new(PROVENANCE_TAG_KEY, policy.provenance.as_str())],
    })
}
