//! The usage provider seam.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use quotawatch_types::{QuotaLimit, ThresholdParams};

use crate::error::ProviderError;

/// Collected limits, keyed by service name then limit name.
pub type UsageReport<L> = BTreeMap<String, BTreeMap<String, L>>;

/// How fresh trusted-advisor data must be, and how long a refresh may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedAdvisorPolicy {
    /// Trusted-advisor data older than this is not used.
    pub refresh_mode: Duration,
    /// Upper bound on refreshing provider data during collection.
    pub refresh_timeout: Duration,
}

impl TrustedAdvisorPolicy {
    pub const DEFAULT_REFRESH_MODE: Duration = Duration::from_secs(21_600);
    pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(1_800);
}

impl Default for TrustedAdvisorPolicy {
    fn default() -> Self {
        Self {
            refresh_mode: Self::DEFAULT_REFRESH_MODE,
            refresh_timeout: Self::DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

/// Source of limits and their current usage.
///
/// The pipeline mutates limits through the provider (overrides, skipped
/// services) and then asks it once for the collected usage.
#[async_trait]
pub trait UsageProvider: Send {
    type Limit: QuotaLimit;

    /// Accept the run's trusted-advisor policy. Ignored by default.
    fn configure_trusted_advisor(&mut self, _policy: TrustedAdvisorPolicy) {}

    /// Set an absolute ceiling for one limit.
    fn set_limit_override(
        &mut self,
        service: &str,
        limit: &str,
        value: f64,
        override_ta: bool,
    ) -> Result<(), ProviderError>;

    /// Replace the configured thresholds of one limit.
    fn set_threshold_override(
        &mut self,
        service: &str,
        limit: &str,
        params: &ThresholdParams,
    ) -> Result<(), ProviderError>;

    /// Remove services from consideration. Unknown names are ignored.
    fn remove_services(&mut self, names: &[String]);

    /// Collect usage for every remaining limit.
    async fn collect_usage(&mut self) -> Result<UsageReport<Self::Limit>, ProviderError>;
}
