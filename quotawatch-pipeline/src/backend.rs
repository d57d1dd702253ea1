//! The monitoring backend seam.

use std::sync::Arc;

use async_trait::async_trait;
use quotawatch_types::{AlarmDefinition, Metric};

use crate::error::BackendError;

/// Remote service that stores metrics and alarms.
#[async_trait]
pub trait MonitoringBackend: Send + Sync {
    /// Ingest one batch of metric records into a namespace.
    async fn ingest_metrics(&self, namespace: &str, batch: &[Metric]) -> Result<(), BackendError>;

    /// Create or replace one alarm.
    async fn upsert_alarm(&self, alarm: &AlarmDefinition) -> Result<(), BackendError>;
}

#[async_trait]
impl<B: MonitoringBackend + ?Sized> MonitoringBackend for Arc<B> {
    async fn ingest_metrics(&self, namespace: &str, batch: &[Metric]) -> Result<(), BackendError> {
        (**self).ingest_metrics(namespace, batch).await
    }

    async fn upsert_alarm(&self, alarm: &AlarmDefinition) -> Result<(), BackendError> {
        (**self).upsert_alarm(alarm).await
    }
}

#[async_trait]
impl<B: MonitoringBackend + ?Sized> MonitoringBackend for Box<B> {
    async fn ingest_metrics(&self, namespace: &str, batch: &[Metric]) -> Result<(), BackendError> {
        (**self).ingest_metrics(namespace, batch).await
    }

    async fn upsert_alarm(&self, alarm: &AlarmDefinition) -> Result<(), BackendError> {
        (**self).upsert_alarm(alarm).await
    }
}
