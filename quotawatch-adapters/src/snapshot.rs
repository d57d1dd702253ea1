//! File-backed usage provider.
//!
//! Reads limits and usage from a JSON snapshot produced by an external
//! collector. The file is loaded once at construction so overrides can be
//! applied to a known catalog, and re-read on every `collect_usage` call.
//!
//! ## Snapshot format
//!
//! ```json
//! {
//!   "collected_at_ms": 1760000000000,
//!   "trusted_advisor_checked_at_ms": 1759990000000,
//!   "services": {
//!     "VPC": {
//!       "VPCs": {
//!         "default_limit": 5,
//!         "ta_limit": 10,
//!         "usage": [{ "resource_id": "us-east-1", "value": 3 }]
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use quotawatch_adapters::snapshot::SnapshotProvider;
//!
//! let provider = SnapshotProvider::builder()
//!     .path("usage.json")
//!     .warning_threshold(75.0)
//!     .build()?;
//! # Ok::<(), quotawatch_adapters::AdapterError>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use quotawatch_pipeline::{ProviderError, TrustedAdvisorPolicy, UsageProvider, UsageReport};
use quotawatch_types::{
    Limit, QuotaLimit, ThresholdParams, UsageSample, DEFAULT_CRIT_PERCENT, DEFAULT_WARN_PERCENT,
};

use crate::AdapterError;

/// Usage provider backed by a JSON snapshot file or an in-memory catalog.
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    path: Option<PathBuf>,
    limits: UsageReport<Limit>,
    skipped: BTreeSet<String>,
    policy: TrustedAdvisorPolicy,
    warning_threshold: f64,
    critical_threshold: f64,
}

impl SnapshotProvider {
    /// Create a new builder for configuring the provider.
    pub fn builder() -> SnapshotProviderBuilder {
        SnapshotProviderBuilder::default()
    }

    /// Build a provider from limits held in memory. `collect_usage` returns
    /// them as they are, with any overrides applied.
    pub fn from_limits(limits: impl IntoIterator<Item = Limit>) -> Self {
        let mut report = UsageReport::new();
        for limit in limits {
            report
                .entry(limit.service_name.clone())
                .or_insert_with(BTreeMap::new)
                .insert(limit.name.clone(), limit);
        }

        Self {
            path: None,
            limits: report,
            skipped: BTreeSet::new(),
            policy: TrustedAdvisorPolicy::default(),
            warning_threshold: DEFAULT_WARN_PERCENT,
            critical_threshold: DEFAULT_CRIT_PERCENT,
        }
    }

    /// Limits currently known to the provider.
    pub fn limits(&self) -> &UsageReport<Limit> {
        &self.limits
    }

    pub fn limit(&self, service: &str, name: &str) -> Option<&Limit> {
        self.limits.get(service)?.get(name)
    }

    pub fn trusted_advisor_policy(&self) -> TrustedAdvisorPolicy {
        self.policy
    }

    fn limit_mut(&mut self, service: &str, name: &str) -> Result<&mut Limit, ProviderError> {
        self.limits
            .get_mut(service)
            .ok_or_else(|| ProviderError::UnknownService(service.to_string()))?
            .get_mut(name)
            .ok_or_else(|| ProviderError::UnknownLimit {
                service: service.to_string(),
                limit: name.to_string(),
            })
    }

    /// Turn a parsed snapshot into limits, dropping skipped services and
    /// stale trusted-advisor data.
    fn catalog(&self, snapshot: UsageSnapshot, now_ms: u64) -> UsageReport<Limit> {
        if let Some(age) = snapshot.age(now_ms) {
            debug!(age_secs = age.as_secs(), "Usage snapshot age");
        }

        let stale = snapshot
            .trusted_advisor_checked_at_ms
            .map(|checked| {
                Duration::from_millis(now_ms.saturating_sub(checked)) > self.policy.refresh_mode
            })
            .unwrap_or(false);
        if stale {
            warn!(
                refresh_mode = ?self.policy.refresh_mode,
                "Trusted advisor data is older than the refresh mode, ignoring it"
            );
        }

        let mut report = UsageReport::new();
        for (service, limits) in snapshot.services {
            if self.skipped.contains(&service) {
                continue;
            }
            let entries = report.entry(service.clone()).or_insert_with(BTreeMap::new);
            for (name, entry) in limits {
                let mut limit = entry.into_limit(
                    &service,
                    &name,
                    self.warning_threshold,
                    self.critical_threshold,
                );
                if stale {
                    limit.clear_trusted_advisor();
                }
                entries.insert(name, limit);
            }
        }
        report
    }

    /// Replace the catalog with fresh data, keeping override state.
    fn merge(&mut self, mut fresh: UsageReport<Limit>) {
        for (service, limits) in fresh.iter_mut() {
            for (name, limit) in limits.iter_mut() {
                if let Some(previous) = self.limit(service, name) {
                    limit.limit_override = previous.limit_override;
                    limit.override_ta = previous.override_ta;
                    limit.thresholds = previous.thresholds;
                }
            }
        }
        self.limits = fresh;
    }
}

#[async_trait]
impl UsageProvider for SnapshotProvider {
    type Limit = Limit;

    fn configure_trusted_advisor(&mut self, policy: TrustedAdvisorPolicy) {
        debug!(?policy, "Trusted advisor policy");
        self.policy = policy;
    }

    fn set_limit_override(
        &mut self,
        service: &str,
        limit: &str,
        value: f64,
        override_ta: bool,
    ) -> Result<(), ProviderError> {
        self.limit_mut(service, limit)?
            .set_limit_override(value, override_ta);
        Ok(())
    }

    fn set_threshold_override(
        &mut self,
        service: &str,
        limit: &str,
        params: &ThresholdParams,
    ) -> Result<(), ProviderError> {
        self.limit_mut(service, limit)?.set_threshold_override(params);
        Ok(())
    }

    fn remove_services(&mut self, names: &[String]) {
        for name in names {
            if self.limits.remove(name).is_none() {
                debug!(service = %name, "Skipped service not in catalog");
            }
            self.skipped.insert(name.clone());
        }
    }

    async fn collect_usage(&mut self) -> Result<UsageReport<Limit>, ProviderError> {
        let Some(path) = self.path.clone() else {
            return Ok(self.limits.clone());
        };

        let timeout = self.policy.refresh_timeout;
        let text = match tokio::time::timeout(timeout, tokio::fs::read_to_string(&path)).await {
            Ok(read) => read.map_err(|e| AdapterError::io(&path, e))?,
            Err(_) => return Err(AdapterError::Timeout(timeout).into()),
        };
        let snapshot: UsageSnapshot = serde_json::from_str(&text).map_err(AdapterError::from)?;

        let fresh = self.catalog(snapshot, now_ms());
        self.merge(fresh);
        Ok(self.limits.clone())
    }
}

/// Builder for SnapshotProvider.
#[derive(Debug, Default)]
pub struct SnapshotProviderBuilder {
    path: Option<PathBuf>,
    warning_threshold: Option<f64>,
    critical_threshold: Option<f64>,
}

impl SnapshotProviderBuilder {
    /// Set the snapshot file to read.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Default warning percentage for limits that don't carry their own
    /// (default: 80).
    pub fn warning_threshold(mut self, percent: f64) -> Self {
        self.warning_threshold = Some(percent);
        self
    }

    /// Default critical percentage for limits that don't carry their own
    /// (default: 99).
    pub fn critical_threshold(mut self, percent: f64) -> Self {
        self.critical_threshold = Some(percent);
        self
    }

    /// Load the snapshot and build the provider.
    pub fn build(self) -> Result<SnapshotProvider, AdapterError> {
        let path = self
            .path
            .ok_or_else(|| AdapterError::Config("snapshot path is required".to_string()))?;
        let warning_threshold = self.warning_threshold.unwrap_or(DEFAULT_WARN_PERCENT);
        let critical_threshold = self.critical_threshold.unwrap_or(DEFAULT_CRIT_PERCENT);
        if !(0.0..=100.0).contains(&warning_threshold)
            || !(0.0..=100.0).contains(&critical_threshold)
        {
            return Err(AdapterError::Config(format!(
                "thresholds must be within 0-100, got warn={warning_threshold} crit={critical_threshold}"
            )));
        }

        let snapshot = read_snapshot(&path)?;
        let mut provider = SnapshotProvider {
            path: Some(path),
            limits: UsageReport::new(),
            skipped: BTreeSet::new(),
            policy: TrustedAdvisorPolicy::default(),
            warning_threshold,
            critical_threshold,
        };
        provider.limits = provider.catalog(snapshot, now_ms());
        Ok(provider)
    }
}

fn read_snapshot(path: &Path) -> Result<UsageSnapshot, AdapterError> {
    let text = std::fs::read_to_string(path).map_err(|e| AdapterError::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Snapshot file layout.
#[derive(Debug, Deserialize)]
struct UsageSnapshot {
    #[serde(default)]
    collected_at_ms: Option<u64>,
    #[serde(default)]
    trusted_advisor_checked_at_ms: Option<u64>,
    #[serde(default)]
    services: BTreeMap<String, BTreeMap<String, LimitEntry>>,
}

impl UsageSnapshot {
    /// Time since the collector wrote the snapshot, if it recorded when.
    fn age(&self, now_ms: u64) -> Option<Duration> {
        self.collected_at_ms
            .map(|collected| Duration::from_millis(now_ms.saturating_sub(collected)))
    }
}

#[derive(Debug, Deserialize)]
struct LimitEntry {
    #[serde(default)]
    default_limit: Option<f64>,
    #[serde(default)]
    api_limit: Option<f64>,
    #[serde(default)]
    ta_limit: Option<f64>,
    #[serde(default)]
    ta_unlimited: bool,
    #[serde(default)]
    default_warn_percent: Option<f64>,
    #[serde(default)]
    default_crit_percent: Option<f64>,
    #[serde(default)]
    usage: Vec<UsageSample>,
}

impl LimitEntry {
    fn into_limit(self, service: &str, name: &str, warn: f64, crit: f64) -> Limit {
        let mut limit = Limit::builder(service, name).default_thresholds(
            self.default_warn_percent.unwrap_or(warn),
            self.default_crit_percent.unwrap_or(crit),
        );
        if let Some(value) = self.default_limit {
            limit = limit.default_limit(value);
        }
        if let Some(value) = self.api_limit {
            limit = limit.api_limit(value);
        }
        if let Some(value) = self.ta_limit {
            limit = limit.ta_limit(value);
        }
        if self.ta_unlimited {
            limit = limit.ta_unlimited();
        }
        for sample in self.usage {
            limit = limit.usage(sample);
        }
        limit.build()
    }
}
