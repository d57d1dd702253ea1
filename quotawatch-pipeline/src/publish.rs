//! Batched, bounded publishing of metrics and alarms.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use quotawatch_types::{AlarmDefinition, Metric};
use tracing::{debug, error};

use crate::backend::MonitoringBackend;
use crate::error::{BackendError, PublishError};

/// Largest number of metric records sent in one ingest call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 20;

/// What to do when a publish call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop issuing calls at the first failure. Calls already in flight
    /// are allowed to finish; the error counts only the calls never issued.
    #[default]
    Abort,
    /// Issue every call and report all failures at the end.
    Continue,
}

/// Knobs for the publish step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    pub max_batch_size: usize,
    /// Calls in flight at once. Results are still consumed in order.
    pub concurrency: usize,
    pub call_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            concurrency: 1,
            call_timeout: Duration::from_secs(30),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// Outcome of one publish pass.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Backend calls issued.
    pub calls: usize,
    pub succeeded: usize,
    /// Records (metrics or alarms) in successful calls.
    pub records: usize,
    /// Failed calls, only populated under [`FailurePolicy::Continue`].
    pub failures: Vec<PublishError>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Issues publish calls against one backend and namespace.
#[derive(Debug)]
pub struct Publisher<'a, B: ?Sized> {
    backend: &'a B,
    namespace: &'a str,
    options: &'a PublishOptions,
}

impl<'a, B: MonitoringBackend + ?Sized> Publisher<'a, B> {
    pub fn new(backend: &'a B, namespace: &'a str, options: &'a PublishOptions) -> Self {
        Self {
            backend,
            namespace,
            options,
        }
    }

    /// Send metrics in contiguous batches of at most `max_batch_size`.
    pub async fn publish_metrics(&self, metrics: &[Metric]) -> Result<PublishReport, PublishError> {
        let batches: Vec<&[Metric]> = metrics.chunks(self.options.max_batch_size.max(1)).collect();
        let backend = self.backend;
        let namespace = self.namespace;
        let call_timeout = self.options.call_timeout;

        let aborted = AtomicBool::new(false);
        let aborted = &aborted;

        let calls = stream::iter(batches.into_iter().enumerate())
            .map(move |(index, batch)| async move {
                if aborted.load(Ordering::Acquire) {
                    return (index, batch.len(), None);
                }
                let result =
                    with_timeout(call_timeout, backend.ingest_metrics(namespace, batch)).await;
                (index, batch.len(), Some(result))
            })
            .buffered(self.options.concurrency.max(1));
        let mut calls = std::pin::pin!(calls);

        let mut report = PublishReport::default();
        let mut first_failure = None;
        let mut skipped = 0;
        while let Some((index, size, result)) = calls.next().await {
            let Some(result) = result else {
                skipped += 1;
                continue;
            };
            report.calls += 1;
            match result {
                Ok(()) => {
                    debug!(index, size, namespace, "Metric batch ingested");
                    report.succeeded += 1;
                    report.records += size;
                }
                Err(source) => {
                    error!(index, size, error = %source, "Metric batch failed");
                    match self.options.failure_policy {
                        FailurePolicy::Abort if first_failure.is_none() => {
                            aborted.store(true, Ordering::Release);
                            first_failure = Some((index, size, source));
                        }
                        FailurePolicy::Abort => {}
                        FailurePolicy::Continue => report.failures.push(PublishError::MetricBatch {
                            index,
                            size,
                            remaining: 0,
                            source,
                        }),
                    }
                }
            }
        }

        if let Some((index, size, source)) = first_failure {
            debug!(
                delivered = report.succeeded,
                skipped, "Metric publishing aborted"
            );
            return Err(PublishError::MetricBatch {
                index,
                size,
                remaining: skipped,
                source,
            });
        }

        Ok(report)
    }

    /// Upsert alarms one call each, in order.
    pub async fn publish_alarms(
        &self,
        alarms: &[AlarmDefinition],
    ) -> Result<PublishReport, PublishError> {
        let backend = self.backend;
        let call_timeout = self.options.call_timeout;
        let aborted = AtomicBool::new(false);
        let aborted = &aborted;

        let calls = stream::iter(alarms.iter())
            .map(move |alarm| async move {
                if aborted.load(Ordering::Acquire) {
                    return (alarm, None);
                }
                let result = with_timeout(call_timeout, backend.upsert_alarm(alarm)).await;
                (alarm, Some(result))
            })
            .buffered(self.options.concurrency.max(1));
        let mut calls = std::pin::pin!(calls);

        let mut report = PublishReport::default();
        let mut first_failure = None;
        let mut skipped = 0;
        while let Some((alarm, result)) = calls.next().await {
            let Some(result) = result else {
                skipped += 1;
                continue;
            };
            report.calls += 1;
            match result {
                Ok(()) => {
                    debug!(alarm = %alarm.alarm_name, "Alarm upserted");
                    report.succeeded += 1;
                    report.records += 1;
                }
                Err(source) => {
                    error!(alarm = %alarm.alarm_name, error = %source, "Alarm upsert failed");
                    match self.options.failure_policy {
                        FailurePolicy::Abort if first_failure.is_none() => {
                            aborted.store(true, Ordering::Release);
                            first_failure = Some((alarm, source));
                        }
                        FailurePolicy::Abort => {}
                        FailurePolicy::Continue => report.failures.push(PublishError::Alarm {
                            name: alarm.alarm_name.clone(),
                            remaining: 0,
                            source,
                        }),
                    }
                }
            }
        }

        if let Some((alarm, source)) = first_failure {
            debug!(
                delivered = report.succeeded,
                skipped, "Alarm publishing aborted"
            );
            return Err(PublishError::Alarm {
                name: alarm.alarm_name.clone(),
                remaining: skipped,
                source,
            });
        }

        Ok(report)
    }
}

/// Bound one backend call. Elapsing counts as a call failure.
pub async fn with_timeout<F>(limit: Duration, call: F) -> Result<(), BackendError>
where
    F: Future<Output = Result<(), BackendError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(limit)),
    }
}
