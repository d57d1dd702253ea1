//! In-memory provider and backend doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use quotawatch_types::{AlarmDefinition, Limit, Metric, QuotaLimit, ThresholdParams};

use crate::backend::MonitoringBackend;
use crate::error::{BackendError, ProviderError};
use crate::provider::{TrustedAdvisorPolicy, UsageProvider, UsageReport};

#[derive(Debug, Default)]
pub struct FakeProvider {
    pub limits: UsageReport<Limit>,
    pub limit_overrides: Vec<(String, String, f64, bool)>,
    pub threshold_overrides: Vec<(String, String, ThresholdParams)>,
    pub removed: Vec<String>,
    pub policy: Option<TrustedAdvisorPolicy>,
    pub collect_error: Option<String>,
    pub collect_delay: Option<Duration>,
    pub collect_calls: usize,
}

impl FakeProvider {
    pub fn with_limits(limits: impl IntoIterator<Item = Limit>) -> Self {
        let mut provider = Self::default();
        for limit in limits {
            provider
                .limits
                .entry(limit.service_name.clone())
                .or_default()
                .insert(limit.name.clone(), limit);
        }
        provider
    }

    pub fn limit(&self, service: &str, name: &str) -> &Limit {
        &self.limits[service][name]
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
}

#[async_trait]
impl UsageProvider for FakeProvider {
    type Limit = Limit;

    fn configure_trusted_advisor(&mut self, policy: TrustedAdvisorPolicy) {
        self.policy = Some(policy);
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
        self.limit_overrides
            .push((service.to_string(), limit.to_string(), value, override_ta));
        Ok(())
    }

    fn set_threshold_override(
        &mut self,
        service: &str,
        limit: &str,
        params: &ThresholdParams,
    ) -> Result<(), ProviderError> {
        self.limit_mut(service, limit)?.set_threshold_override(params);
        self.threshold_overrides
            .push((service.to_string(), limit.to_string(), *params));
        Ok(())
    }

    fn remove_services(&mut self, names: &[String]) {
        for name in names {
            self.limits.remove(name);
            self.removed.push(name.clone());
        }
    }

    async fn collect_usage(&mut self) -> Result<UsageReport<Limit>, ProviderError> {
        self.collect_calls += 1;
        if let Some(delay) = self.collect_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.collect_error {
            Some(message) => Err(ProviderError::Collection(message.clone())),
            None => Ok(self.limits.clone()),
        }
    }
}

/// Backend that records every call it receives.
///
/// Metric calls are numbered in arrival order; numbers listed in
/// `fail_batches` fail with `Rejected`. Alarms named in `fail_alarms` fail
/// the same way. A `delay` is slept before any call is recorded; entries in
/// `batch_delays` replace it for the numbered metric call.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub batches: Mutex<Vec<(String, Vec<Metric>)>>,
    pub alarms: Mutex<Vec<AlarmDefinition>>,
    pub fail_batches: HashSet<usize>,
    pub fail_alarms: HashSet<String>,
    pub delay: Option<Duration>,
    pub batch_delays: HashMap<usize, Duration>,
    metric_calls: AtomicUsize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_batches(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.fail_batches.extend(indices);
        self
    }

    pub fn failing_alarms<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.fail_alarms.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn delaying_batch(mut self, index: usize, delay: Duration) -> Self {
        self.batch_delays.insert(index, delay);
        self
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().iter().map(|(_, b)| b.len()).collect()
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.batches
            .lock()
            .iter()
            .flat_map(|(_, b)| b.iter().cloned())
            .collect()
    }

    pub fn alarm_names(&self) -> Vec<String> {
        self.alarms
            .lock()
            .iter()
            .map(|a| a.alarm_name.clone())
            .collect()
    }
}

#[async_trait]
impl MonitoringBackend for RecordingBackend {
    async fn ingest_metrics(&self, namespace: &str, batch: &[Metric]) -> Result<(), BackendError> {
        let index = self.metric_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.batch_delays.get(&index).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }
        self.batches
            .lock()
            .push((namespace.to_string(), batch.to_vec()));
        if self.fail_batches.contains(&index) {
            return Err(BackendError::Rejected(format!("batch {index} refused")));
        }
        Ok(())
    }

    async fn upsert_alarm(&self, alarm: &AlarmDefinition) -> Result<(), BackendError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.alarms.lock().push(alarm.clone());
        if self.fail_alarms.contains(&alarm.alarm_name) {
            return Err(BackendError::Rejected(format!(
                "alarm {} refused",
                alarm.alarm_name
            )));
        }
        Ok(())
    }
}
