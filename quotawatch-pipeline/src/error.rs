//! Error types for the pipeline and its collaborators.

use std::time::Duration;

use quotawatch_types::UnknownSeverity;
use thiserror::Error;

/// Errors that end (or, for override entries, are logged during) a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The limits configuration is absent or malformed.
    #[error("failed to decode limits configuration: {0}")]
    ConfigDecode(String),

    /// A single override entry failed validation. Logged and skipped.
    #[error(
        "invalid override entry for service \"{}\": {reason}",
        .service.as_deref().unwrap_or("<missing>")
    )]
    InvalidOverrideEntry {
        service: Option<String>,
        reason: String,
    },

    /// The provider rejected an override.
    #[error("failed to apply override for {service}/{limit}: {source}")]
    OverrideApplication {
        service: String,
        limit: String,
        #[source]
        source: ProviderError,
    },

    /// Alarm severity other than `warn` or `crit`.
    #[error("invalid alarm severity: {0}")]
    InvalidSeverity(#[from] UnknownSeverity),

    /// Thresholds were requested for a limit without a ceiling.
    #[error("limit {service}/{limit} has no bounded ceiling")]
    UnboundedLimit { service: String, limit: String },

    /// The provider failed to collect usage.
    #[error("failed to collect usage: {0}")]
    UsageCollection(#[source] ProviderError),

    /// Publishing metrics or alarms failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Errors reported by a usage provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown service \"{0}\"")]
    UnknownService(String),

    #[error("unknown limit \"{limit}\" for service \"{service}\"")]
    UnknownLimit { service: String, limit: String },

    #[error("{0}")]
    Collection(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors reported by a monitoring backend call.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

/// A failed publish call, attributed to its batch or alarm.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("metric batch {index} ({size} records) failed, {remaining} later batches not issued: {source}")]
    MetricBatch {
        index: usize,
        size: usize,
        remaining: usize,
        #[source]
        source: BackendError,
    },

    #[error("alarm upsert \"{name}\" failed, {remaining} later alarms not issued: {source}")]
    Alarm {
        name: String,
        remaining: usize,
        #[source]
        source: BackendError,
    },

    /// Some calls failed while continuing past failures.
    #[error("{failed} of {total} publish calls failed")]
    Partial { failed: usize, total: usize },
}
