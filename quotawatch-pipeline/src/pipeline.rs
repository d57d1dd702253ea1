//! The run orchestrator.

use std::fmt;
use std::time::Duration;

use quotawatch_types::{AlarmDefinition, Metric, QuotaLimit, Severity};
use tracing::{debug, error, info, warn};

use crate::alarm::{build_alarm, AlarmPolicy};
use crate::backend::MonitoringBackend;
use crate::config::LimitsConfig;
use crate::error::{PipelineError, ProviderError, PublishError};
use crate::metric::build_metric;
use crate::provider::{UsageProvider, UsageReport};
use crate::publish::{FailurePolicy, PublishOptions, Publisher};
use crate::thresholds::apply_override;

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    ConfigLoaded,
    OverridesApplied,
    UsageFetched,
    MetricsAndAlarmsBuilt,
    Published,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Init => "init",
            PipelineState::ConfigLoaded => "config-loaded",
            PipelineState::OverridesApplied => "overrides-applied",
            PipelineState::UsageFetched => "usage-fetched",
            PipelineState::MetricsAndAlarmsBuilt => "metrics-and-alarms-built",
            PipelineState::Published => "published",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counts describing a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub services: usize,
    pub limits: usize,
    /// Limits without a bounded ceiling. They get metrics but no alarms.
    pub unbounded_limits: usize,
    pub metrics: usize,
    pub alarms: usize,
    pub metric_batches: usize,
    /// Override entries that failed validation.
    pub skipped_entries: usize,
    pub overrides_applied: usize,
}

/// Metrics and alarms built from one usage report.
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub metrics: Vec<Metric>,
    pub alarms: Vec<AlarmDefinition>,
    pub services: usize,
    pub limits: usize,
    pub unbounded_limits: usize,
}

/// Build one metric per usage sample, and for bounded limits a warn and a
/// crit alarm per sample carrying that sample's dimensions.
pub fn build_all<L: QuotaLimit>(
    report: &UsageReport<L>,
    policy: &AlarmPolicy,
) -> Result<BuildOutput, PipelineError> {
    let mut out = BuildOutput {
        services: report.len(),
        ..Default::default()
    };

    for (service, limits) in report {
        for (name, limit) in limits {
            out.limits += 1;
            info!(
                service = %service,
                limit = %name,
                usage = %limit.current_usage_summary(),
                "Limit usage"
            );

            let bounded = limit.has_resource_limits();
            if !bounded {
                out.unbounded_limits += 1;
                warn!(service = %service, limit = %name, "No resource limits, skipping alarms");
            }

            for sample in limit.usage() {
                let metric = build_metric(limit, sample);
                if bounded {
                    for severity in Severity::ALL {
                        out.alarms
                            .push(build_alarm(limit, severity, &metric.dimensions, policy)?);
                    }
                }
                out.metrics.push(metric);
            }
        }
    }

    Ok(out)
}

/// Drives one provider and one backend through a full run.
///
/// ```rust,ignore
/// let mut pipeline = Pipeline::builder(provider, backend)
///     .alarm_actions(["arn:aws:sns:eu-west-1:123456789012:quota-alerts"])
///     .max_batch_size(20)
///     .build();
///
/// let summary = pipeline.run(Some(&yaml)).await?;
/// ```
#[derive(Debug)]
pub struct Pipeline<P, B> {
    provider: P,
    backend: B,
    alarm_policy: AlarmPolicy,
    publish: PublishOptions,
    state: PipelineState,
}

impl<P, B> Pipeline<P, B>
where
    P: UsageProvider,
    B: MonitoringBackend,
{
    pub fn builder(provider: P, backend: B) -> PipelineBuilder<P, B> {
        PipelineBuilder::new(provider, backend)
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn alarm_policy(&self) -> &AlarmPolicy {
        &self.alarm_policy
    }

    pub fn publish_options(&self) -> &PublishOptions {
        &self.publish
    }

    /// Run the whole pipeline against a YAML limits payload.
    ///
    /// Any error leaves the pipeline in [`PipelineState::Failed`].
    pub async fn run(&mut self, payload: Option<&str>) -> Result<RunSummary, PipelineError> {
        self.state = PipelineState::Init;
        match self.execute(payload).await {
            Ok(summary) => {
                self.transition(PipelineState::Done);
                info!(
                    metrics = summary.metrics,
                    alarms = summary.alarms,
                    batches = summary.metric_batches,
                    "Done"
                );
                Ok(summary)
            }
            Err(err) => {
                error!(state = %self.state, error = %err, "Run failed");
                self.transition(PipelineState::Failed);
                Err(err)
            }
        }
    }

    async fn execute(&mut self, payload: Option<&str>) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        let config = LimitsConfig::decode(payload)?;
        self.provider
            .configure_trusted_advisor(config.trusted_advisor_policy());
        self.transition(PipelineState::ConfigLoaded);

        let (overrides, skipped) = config.overrides();
        summary.skipped_entries = skipped;
        for limit in &overrides {
            apply_override(&mut self.provider, limit)?;
            summary.overrides_applied += 1;
        }
        if !config.skip.is_empty() {
            info!(services = ?config.skip, "Skipping services");
            self.provider.remove_services(&config.skip);
        }
        self.transition(PipelineState::OverridesApplied);

        let report = self.collect_usage().await?;
        self.transition(PipelineState::UsageFetched);

        let built = build_all(&report, &self.alarm_policy)?;
        summary.services = built.services;
        summary.limits = built.limits;
        summary.unbounded_limits = built.unbounded_limits;
        summary.metrics = built.metrics.len();
        summary.alarms = built.alarms.len();
        self.transition(PipelineState::MetricsAndAlarmsBuilt);

        let publisher = Publisher::new(&self.backend, &self.alarm_policy.namespace, &self.publish);
        let metrics = publisher.publish_metrics(&built.metrics).await?;
        let alarms = publisher.publish_alarms(&built.alarms).await?;
        summary.metric_batches = metrics.calls;

        if self.publish.failure_policy == FailurePolicy::Continue {
            let failed = metrics.failures.len() + alarms.failures.len();
            if failed > 0 {
                return Err(PublishError::Partial {
                    failed,
                    total: metrics.calls + alarms.calls,
                }
                .into());
            }
        }
        self.transition(PipelineState::Published);

        Ok(summary)
    }

    async fn collect_usage(&mut self) -> Result<UsageReport<P::Limit>, PipelineError> {
        let limit = self.publish.call_timeout;
        match tokio::time::timeout(limit, self.provider.collect_usage()).await {
            Ok(report) => report.map_err(PipelineError::UsageCollection),
            Err(_) => Err(PipelineError::UsageCollection(ProviderError::Timeout(
                limit,
            ))),
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "Pipeline state");
        self.state = next;
    }
}

/// Builder for a [`Pipeline`].
#[derive(Debug)]
pub struct PipelineBuilder<P, B> {
    provider: P,
    backend: B,
    alarm_policy: AlarmPolicy,
    publish: PublishOptions,
}

impl<P, B> PipelineBuilder<P, B>
where
    P: UsageProvider,
    B: MonitoringBackend,
{
    pub fn new(provider: P, backend: B) -> Self {
        Self {
            provider,
            backend,
            alarm_policy: AlarmPolicy::default(),
            publish: PublishOptions::default(),
        }
    }

    /// Notification targets attached to every alarm.
    pub fn alarm_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alarm_policy.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    /// Namespace for metrics and alarms. Defaults to `ServicesLimits`.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.alarm_policy.namespace = namespace.into();
        self
    }

    /// Value of the `generated-by` tag on every alarm.
    pub fn provenance(mut self, provenance: impl Into<String>) -> Self {
        self.alarm_policy.provenance = provenance.into();
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.publish.max_batch_size = size.max(1);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.publish.concurrency = concurrency.max(1);
        self
    }

    /// Upper bound on every external call, including usage collection.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.publish.call_timeout = timeout;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.publish.failure_policy = policy;
        self
    }

    pub fn build(self) -> Pipeline<P, B> {
        Pipeline {
            provider: self.provider,
            backend: self.backend,
            alarm_policy: self.alarm_policy,
            publish: self.publish,
            state: PipelineState::Init,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::test_support::{FakeProvider, RecordingBackend};
    use quotawatch_types::{Dimension, Limit, UsageSample};

    const VPC_OVERRIDE: &str = r#"
services:
  - name: VPC
    limits:
      - name: VPCs
        value: 50
        warn_percent: 70
        crit_percent: 90
"#;

    fn vpc_provider() -> FakeProvider {
        FakeProvider::with_limits([Limit::builder("VPC", "VPCs")
            .default_limit(5.0)
            .usage(UsageSample::new(40.0))
            .build()])
    }

    #[tokio::test]
    async fn override_flows_through_to_alarms() {
        let mut pipeline = Pipeline::builder(vpc_provider(), RecordingBackend::new())
            .alarm_actions(["arn:aws:sns:eu-west-1:123456789012:quota-alerts"])
            .build();

        let summary = pipeline.run(Some(VPC_OVERRIDE)).await.unwrap();

        assert_eq!(pipeline.state(), PipelineState::Done);
        assert_eq!(summary.metrics, 1);
        assert_eq!(summary.alarms, 2);
        assert_eq!(summary.metric_batches, 1);
        assert_eq!(summary.overrides_applied, 1);

        let backend = pipeline.backend();
        let metrics = backend.metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].metric_name, "VPC-VPCs");
        assert_eq!(metrics[0].value, 40.0);
        assert!(metrics[0].dimensions.is_empty());

        let alarms = backend.alarms.lock();
        assert_eq!(alarms.len(), 2);
        assert_eq!(alarms[0].alarm_name, "VPC VPCs warn");
        assert_eq!(alarms[0].threshold, 35.0);
        assert_eq!(alarms[1].alarm_name, "VPC VPCs crit");
        assert_eq!(alarms[1].threshold, 45.0);
        assert!(alarms
            .iter()
            .all(|a| a.alarm_actions == ["arn:aws:sns:eu-west-1:123456789012:quota-alerts"]));
    }

    #[tokio::test]
    async fn malformed_config_fails_before_provider_mutation() {
        let mut pipeline = Pipeline::builder(vpc_provider(), RecordingBackend::new()).build();

        let err = pipeline.run(Some("services: [")).await.unwrap_err();
        assert!(matches!(err, PipelineError::ConfigDecode(_)));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(pipeline.provider().limit_overrides.is_empty());
        assert!(pipeline.provider().policy.is_none());
        assert_eq!(pipeline.provider().collect_calls, 0);

        let err = pipeline.run(None).await.unwrap_err();
        assert!(matches!(err, PipelineError::ConfigDecode(_)));
    }

    #[tokio::test]
    async fn unknown_override_target_aborts_the_run() {
        let yaml = r#"
services:
  - name: RDS
    limits:
      - name: DB instances
        value: 40
"#;
        let mut pipeline = Pipeline::builder(vpc_provider(), RecordingBackend::new()).build();

        let err = pipeline.run(Some(yaml)).await.unwrap_err();
        assert!(matches!(err, PipelineError::OverrideApplication { .. }));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(pipeline.provider().collect_calls, 0);
        assert!(pipeline.backend().batches.lock().is_empty());
    }

    #[tokio::test]
    async fn invalid_entries_are_counted_and_skipped() {
        let yaml = r#"
services:
  - name: VPC
    limits:
      - name: VPCs
      - value: 3
  - name: EC2
    limits: []
"#;
        let mut pipeline = Pipeline::builder(vpc_provider(), RecordingBackend::new()).build();

        let summary = pipeline.run(Some(yaml)).await.unwrap();
        assert_eq!(summary.skipped_entries, 2);
        assert_eq!(summary.overrides_applied, 0);
        // Default ceiling 5 with default 80/99 percents.
        let alarms = pipeline.backend().alarms.lock();
        assert_eq!(alarms[0].threshold, 4.0);
        assert_eq!(alarms[1].threshold, 4.95);
    }

    #[tokio::test]
    async fn skipped_services_are_removed_before_collection() {
        let provider = FakeProvider::with_limits([
            Limit::builder("VPC", "VPCs")
                .default_limit(5.0)
                .usage(UsageSample::new(1.0))
                .build(),
            Limit::builder("Lambda", "Function count")
                .default_limit(1000.0)
                .usage(UsageSample::new(12.0))
                .build(),
        ]);
        let yaml = "services: []\nskip:\n  - Lambda\nta_refresh_timeout: 60\n";
        let mut pipeline = Pipeline::builder(provider, RecordingBackend::new()).build();

        let summary = pipeline.run(Some(yaml)).await.unwrap();
        assert_eq!(summary.services, 1);
        assert_eq!(pipeline.provider().removed, vec!["Lambda"]);
        assert_eq!(
            pipeline.provider().policy.map(|p| p.refresh_timeout),
            Some(Duration::from_secs(60))
        );
        assert!(pipeline
            .backend()
            .metrics()
            .iter()
            .all(|m| m.metric_name == "VPC-VPCs"));
    }

    #[tokio::test]
    async fn unbounded_limits_get_metrics_only() {
        let provider = FakeProvider::with_limits([Limit::builder("S3", "Buckets")
            .ta_unlimited()
            .usage(UsageSample::new(7.0))
            .build()]);
        let mut pipeline = Pipeline::builder(provider, RecordingBackend::new()).build();

        let summary = pipeline.run(Some("services: []")).await.unwrap();
        assert_eq!(summary.metrics, 1);
        assert_eq!(summary.alarms, 0);
        assert_eq!(summary.unbounded_limits, 1);
        assert!(pipeline.backend().alarms.lock().is_empty());
    }

    #[tokio::test]
    async fn collection_failure_is_fatal() {
        let mut provider = vpc_provider();
        provider.collect_error = Some("snapshot unreadable".to_string());
        let mut pipeline = Pipeline::builder(provider, RecordingBackend::new()).build();

        let err = pipeline.run(Some("services: []")).await.unwrap_err();
        assert!(matches!(err, PipelineError::UsageCollection(_)));
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_collection_times_out() {
        let mut provider = vpc_provider();
        provider.collect_delay = Some(Duration::from_secs(120));
        let mut pipeline = Pipeline::builder(provider, RecordingBackend::new())
            .call_timeout(Duration::from_secs(10))
            .build();

        let err = pipeline.run(Some("services: []")).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UsageCollection(ProviderError::Timeout(d)) if d == Duration::from_secs(10)
        ));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(pipeline.provider().collect_calls, 1);
        assert!(pipeline.backend().batches.lock().is_empty());
    }

    #[tokio::test]
    async fn metric_batch_failure_aborts_before_alarms() {
        let provider = FakeProvider::with_limits([Limit::builder("EC2", "EIPs")
            .default_limit(5.0)
            .usage(UsageSample::new(1.0).resource_id("eu-west-1"))
            .build()]);
        let mut pipeline =
            Pipeline::builder(provider, RecordingBackend::new().failing_batches([0])).build();

        let err = pipeline.run(Some("services: []")).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Publish(PublishError::MetricBatch {
                index: 0,
                source: BackendError::Rejected(_),
                ..
            })
        ));
        assert!(pipeline.backend().alarms.lock().is_empty());
    }

    #[tokio::test]
    async fn continue_policy_reports_partial_failure() {
        let provider = FakeProvider::with_limits([Limit::builder("EC2", "EIPs")
            .default_limit(5.0)
            .usage(UsageSample::new(1.0).resource_id("eu-west-1"))
            .build()]);
        let backend = RecordingBackend::new().failing_alarms(["EC2 EIPs warn eu-west-1"]);
        let mut pipeline = Pipeline::builder(provider, backend)
            .failure_policy(FailurePolicy::Continue)
            .build();

        let err = pipeline.run(Some("services: []")).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Publish(PublishError::Partial { failed: 1, total: 3 })
        ));
        assert_eq!(
            pipeline.backend().alarm_names(),
            vec!["EC2 EIPs warn eu-west-1", "EC2 EIPs crit eu-west-1"]
        );
    }

    #[test]
    fn alarms_follow_each_sample() {
        let provider = FakeProvider::with_limits([Limit::builder("EC2", "EIPs")
            .default_limit(10.0)
            .usage(UsageSample::new(1.0).resource_id("eu-west-1"))
            .usage(UsageSample::new(2.0).aws_type("AWS::EC2::EIP").resource_id("us-east-1"))
            .build()]);

        let built = build_all(&provider.limits, &AlarmPolicy::default()).unwrap();
        assert_eq!(built.metrics.len(), 2);
        let names: Vec<_> = built.alarms.iter().map(|a| a.alarm_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "EC2 EIPs warn eu-west-1",
                "EC2 EIPs crit eu-west-1",
                "EC2 EIPs warn us-east-1",
                "EC2 EIPs crit us-east-1",
            ]
        );
        assert_eq!(
            built.alarms[2].dimensions,
            vec![
                Dimension::new("aws_type", "AWS::EC2::EIP"),
                Dimension::new("resource_id", "us-east-1"),
            ]
        );
    }

    #[test]
    fn builder_options_are_explicit() {
        let pipeline = Pipeline::builder(FakeProvider::default(), RecordingBackend::new())
            .namespace("Quotas")
            .provenance("quotawatch")
            .max_batch_size(0)
            .concurrency(8)
            .call_timeout(Duration::from_secs(3))
            .build();

        assert_eq!(pipeline.state(), PipelineState::Init);
        assert_eq!(pipeline.alarm_policy().namespace, "Quotas");
        assert_eq!(pipeline.alarm_policy().provenance, "quotawatch");
        assert_eq!(pipeline.publish_options().max_batch_size, 1);
        assert_eq!(pipeline.publish_options().concurrency, 8);
        assert_eq!(pipeline.publish_options().call_timeout, Duration::from_secs(3));
    }
}
