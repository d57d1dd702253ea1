//! # quotawatch-pipeline
//!
//! Turns service quota usage plus a declarative override configuration into
//! metric records and threshold alarms, and publishes both to a monitoring
//! backend.
//!
//! The usage source and the backend are reached through the
//! [`UsageProvider`] and [`MonitoringBackend`] traits; this crate never
//! discovers usage itself.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quotawatch_pipeline::{FailurePolicy, Pipeline};
//!
//! let mut pipeline = Pipeline::builder(provider, backend)
//!     .alarm_actions(["arn:aws:sns:eu-west-1:123456789012:quota-alerts"])
//!     .failure_policy(FailurePolicy::Abort)
//!     .build();
//!
//! let summary = pipeline.run(Some(&yaml)).await?;
//! println!("{} metrics, {} alarms", summary.metrics, summary.alarms);
//! ```
//!
//! ## Stages
//!
//! 1. Decode the YAML limits configuration.
//! 2. Apply each valid override to the provider, then drop skipped services.
//! 3. Collect usage once.
//! 4. Build one metric per sample and, for bounded limits, warn and crit alarms.
//! 5. Publish metrics in batches, then alarms one by one.

mod alarm;
mod backend;
mod config;
mod error;
mod metric;
mod pipeline;
mod provider;
mod publish;
mod thresholds;

#[cfg(test)]
mod test_support;

pub use alarm::{build_alarm, AlarmPolicy};
pub use backend::MonitoringBackend;
pub use crate::config::{parse_override, LimitOverride, LimitsConfig, ServiceConfig};
pub use error::{BackendError, PipelineError, ProviderError, PublishError};
pub use metric::build_metric;
pub use pipeline::{build_all, BuildOutput, Pipeline, PipelineBuilder, PipelineState, RunSummary};
pub use provider::{TrustedAdvisorPolicy, UsageProvider, UsageReport};
pub use publish::{
    with_timeout, FailurePolicy, PublishOptions, PublishReport, Publisher, DEFAULT_MAX_BATCH_SIZE,
};
pub use thresholds::{apply_override, effective_percent, threshold_for};

// Re-export types for convenience
pub use quotawatch_types::{
    AlarmDefinition, Dimension, Limit, Metric, QuotaLimit, Severity, ThresholdParams, UsageSample,
};
