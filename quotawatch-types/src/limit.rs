//! Quota limits as reported by a usage provider.

use std::fmt::Debug;

use crate::{usage_summary, UsageSample};

/// Default warning threshold, as a percentage of the ceiling.
pub const DEFAULT_WARN_PERCENT: f64 = 80.0;

/// Default critical threshold, as a percentage of the ceiling.
pub const DEFAULT_CRIT_PERCENT: f64 = 99.0;

/// Configured threshold overrides for a limit.
///
/// Each field is optional; only fields that were configured are set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThresholdParams {
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub warn_percent: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub crit_percent: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub warn_count: Option<u64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub crit_count: Option<u64>,
}

impl ThresholdParams {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.warn_percent.is_none()
            && self.crit_percent.is_none()
            && self.warn_count.is_none()
            && self.crit_count.is_none()
    }

    /// True when both percentage thresholds are set.
    pub fn has_both_percents(&self) -> bool {
        self.warn_percent.is_some() && self.crit_percent.is_some()
    }
}

/// Where a limit's effective ceiling comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSource {
    Override,
    Api,
    TrustedAdvisor,
    Default,
}

/// Capabilities the pipeline needs from a provider's limit object.
///
/// Identity, ceiling and boundedness queries, the usage list, and the two
/// override mutations. The pipeline depends on this trait only.
pub trait QuotaLimit: Debug + Send + Sync {
    fn service_name(&self) -> &str;

    fn name(&self) -> &str;

    /// The ceiling currently in force, `None` when the limit is unbounded.
    fn effective_ceiling(&self) -> Option<f64>;

    fn usage(&self) -> &[UsageSample];

    /// True when the limit represents a boundable quantity.
    fn has_resource_limits(&self) -> bool {
        self.effective_ceiling().is_some()
    }

    fn default_warn_percent(&self) -> f64;

    fn default_crit_percent(&self) -> f64;

    /// Configured warning percentage, if any.
    fn warn_percent(&self) -> Option<f64>;

    /// Configured critical percentage, if any.
    fn crit_percent(&self) -> Option<f64>;

    /// Replace the ceiling with an absolute value.
    ///
    /// With `override_ta` the value also wins over trusted-advisor data.
    fn set_limit_override(&mut self, value: f64, override_ta: bool);

    /// Replace all configured thresholds.
    fn set_threshold_override(&mut self, params: &ThresholdParams);

    fn current_usage_summary(&self) -> String {
        usage_summary(self.usage())
    }
}

/// The concrete limit record.
#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub service_name: String,
    pub name: String,

    /// Documented default ceiling, `None` when unknown or unlimited.
    pub default_limit: Option<f64>,
    /// Ceiling reported by the service API.
    pub api_limit: Option<f64>,
    /// Ceiling reported by trusted advisor.
    pub ta_limit: Option<f64>,
    /// Trusted advisor reports the limit as unlimited.
    pub ta_unlimited: bool,

    pub limit_override: Option<f64>,
    pub override_ta: bool,

    pub def_warning_threshold: f64,
    pub def_critical_threshold: f64,
    pub thresholds: ThresholdParams,

    pub usage: Vec<UsageSample>,
}

impl Limit {
    /// Create a limit with no ceiling and default thresholds.
    pub fn new(service_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            name: name.into(),
            default_limit: None,
            api_limit: None,
            ta_limit: None,
            ta_unlimited: false,
            limit_override: None,
            override_ta: false,
            def_warning_threshold: DEFAULT_WARN_PERCENT,
            def_critical_threshold: DEFAULT_CRIT_PERCENT,
            thresholds: ThresholdParams::default(),
            usage: Vec::new(),
        }
    }

    /// Create a builder for a limit.
    pub fn builder(service_name: impl Into<String>, name: impl Into<String>) -> LimitBuilder {
        LimitBuilder {
            limit: Limit::new(service_name, name),
        }
    }

    /// Which source the effective ceiling is taken from.
    ///
    /// An override wins when it was set to override trusted advisor, or when
    /// trusted advisor has no opinion. Otherwise API data beats trusted
    /// advisor, which beats the documented default.
    pub fn limit_source(&self) -> LimitSource {
        let has_ta = self.ta_limit.is_some() || self.ta_unlimited;
        if self.limit_override.is_some() && (self.override_ta || !has_ta) {
            return LimitSource::Override;
        }
        if self.api_limit.is_some() {
            return LimitSource::Api;
        }
        if has_ta {
            return LimitSource::TrustedAdvisor;
        }
        LimitSource::Default
    }

    /// Drop any trusted-advisor data.
    pub fn clear_trusted_advisor(&mut self) {
        self.ta_limit = None;
        self.ta_unlimited = false;
    }
}

impl QuotaLimit for Limit {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn effective_ceiling(&self) -> Option<f64> {
        match self.limit_source() {
            LimitSource::Override => self.limit_override,
            LimitSource::Api => self.api_limit,
            LimitSource::TrustedAdvisor if self.ta_unlimited => None,
            LimitSource::TrustedAdvisor => self.ta_limit,
            LimitSource::Default => self.default_limit,
        }
    }

    fn usage(&self) -> &[UsageSample] {
        &self.usage
    }

    fn default_warn_percent(&self) -> f64 {
        self.def_warning_threshold
    }

    fn default_crit_percent(&self) -> f64 {
        self.def_critical_threshold
    }

    fn warn_percent(&self) -> Option<f64> {
        self.thresholds.warn_percent
    }

    fn crit_percent(&self) -> Option<f64> {
        self.thresholds.crit_percent
    }

    fn set_limit_override(&mut self, value: f64, override_ta: bool) {
        self.limit_override = Some(value);
        self.override_ta = override_ta;
    }

    fn set_threshold_override(&mut self, params: &ThresholdParams) {
        self.thresholds = *params;
    }
}

/// Builder for `Limit`.
#[derive(Debug)]
pub struct LimitBuilder {
    limit: Limit,
}

impl LimitBuilder {
    /// Set the documented default ceiling.
    pub fn default_limit(mut self, value: f64) -> Self {
        self.limit.default_limit = Some(value);
        self
    }

    /// Set the API-reported ceiling.
    pub fn api_limit(mut self, value: f64) -> Self {
        self.limit.api_limit = Some(value);
        self
    }

    /// Set the trusted-advisor ceiling.
    pub fn ta_limit(mut self, value: f64) -> Self {
        self.limit.ta_limit = Some(value);
        self
    }

    /// Mark the limit unlimited according to trusted advisor.
    pub fn ta_unlimited(mut self) -> Self {
        self.limit.ta_unlimited = true;
        self
    }

    /// Set the default warning and critical percentages.
    pub fn default_thresholds(mut self, warn_percent: f64, crit_percent: f64) -> Self {
        self.limit.def_warning_threshold = warn_percent;
        self.limit.def_critical_threshold = crit_percent;
        self
    }

    /// Add a usage sample.
    pub fn usage(mut self, sample: UsageSample) -> Self {
        self.limit.usage.push(sample);
        self
    }

    /// Build the limit.
    pub fn build(self) -> Limit {
        self.limit
    }
}
