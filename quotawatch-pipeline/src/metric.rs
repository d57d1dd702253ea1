//! Usage sample to metric record.

use quotawatch_types::{
    Dimension, Metric, QuotaLimit, UsageSample, AWS_TYPE_DIMENSION, RESOURCE_ID_DIMENSION,
};

/// Build the metric record for one usage sample of a limit.
///
/// The name is `"{service}-{limit}"`. Dimensions are `aws_type` then
/// `resource_id`, each only when the sample carries it.
pub fn build_metric<L: QuotaLimit + ?Sized>(limit: &L, sample: &UsageSample) -> Metric {
    let mut dimensions = Vec::with_capacity(2);
    if let Some(aws_type) = &sample.aws_type {
        dimensions.push(Dimension::new(AWS_TYPE_DIMENSION, aws_type.as_str()));
    }
    if let Some(resource_id) = &sample.resource_id {
        dimensions.push(Dimension::new(RESOURCE_ID_DIMENSION, resource_id.as_str()));
    }

    Metric {
        metric_name: format!("{}-{}", limit.service_name(), limit.name()),
        dimensions,
        value: sample.value,
    }
}
