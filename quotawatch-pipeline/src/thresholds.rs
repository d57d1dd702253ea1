//! Merging configured overrides with provider defaults.

use quotawatch_types::{QuotaLimit, Severity};
use tracing::{info, warn};

use crate::config::LimitOverride;
use crate::error::PipelineError;
use crate::provider::UsageProvider;

/// Apply one override to the provider.
///
/// The ceiling is always replaced. Thresholds are only replaced when both
/// `warn_percent` and `crit_percent` are configured, in which case every
/// configured threshold field is passed along. Count-only thresholds are
/// never applied.
pub fn apply_override<P: UsageProvider>(
    provider: &mut P,
    limit: &LimitOverride,
) -> Result<(), PipelineError> {
    let failed = |source| PipelineError::OverrideApplication {
        service: limit.service_name.clone(),
        limit: limit.limit_name.clone(),
        source,
    };

    info!(%limit, "Overriding limit");
    provider
        .set_limit_override(
            &limit.service_name,
            &limit.limit_name,
            limit.value as f64,
            limit.override_ta,
        )
        .map_err(failed)?;

    let params = limit.threshold_params();
    if params.has_both_percents() {
        info!(%limit, "Overriding thresholds");
        provider
            .set_threshold_override(&limit.service_name, &limit.limit_name, &params)
            .map_err(failed)?;
    } else if !params.is_empty() {
        warn!(
            %limit,
            "Thresholds not overridden: warn_percent and crit_percent are both required"
        );
    }

    Ok(())
}

/// Percentage in force for a severity: configured, else the provider default.
pub fn effective_percent<L: QuotaLimit + ?Sized>(limit: &L, severity: Severity) -> f64 {
    match severity {
        Severity::Warn => limit
            .warn_percent()
            .unwrap_or_else(|| limit.default_warn_percent()),
        Severity::Crit => limit
            .crit_percent()
            .unwrap_or_else(|| limit.default_crit_percent()),
    }
}

/// Numeric alarm threshold for one limit and severity.
pub fn threshold_for<L: QuotaLimit + ?Sized>(
    limit: &L,
    severity: Severity,
) -> Result<f64, PipelineError> {
    let ceiling = limit
        .effective_ceiling()
        .ok_or_else(|| PipelineError::UnboundedLimit {
            service: limit.service_name().to_string(),
            limit: limit.name().to_string(),
        })?;

    Ok(ceiling * effective_percent(limit, severity) / 100.0)
}
