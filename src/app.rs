//! Wiring: settings to provider, backend and pipeline.

use anyhow::{anyhow, Context, Result};
use tracing::info;

use quotawatch_adapters::file::FileBackend;
use quotawatch_adapters::snapshot::SnapshotProvider;
use quotawatch_pipeline::{MonitoringBackend, Pipeline, RunSummary};

use crate::cli::Args;
use crate::settings::{limits_payload, Settings};

/// Run one full pipeline invocation.
pub async fn run(args: Args) -> Result<RunSummary> {
    let settings = Settings::load(&args)?;
    let payload = limits_payload(&args)?;
    let alarm_actions = args.alarm_actions();

    let provider = build_provider(&settings)?;
    let backend = build_backend(&settings).await?;

    info!(
        namespace = %settings.namespace,
        actions = alarm_actions.len(),
        batch_size = settings.max_batch_size,
        "Starting quota pipeline"
    );

    let mut pipeline = Pipeline::builder(provider, backend)
        .alarm_actions(alarm_actions)
        .namespace(settings.namespace.clone())
        .provenance(settings.provenance_tag.clone())
        .max_batch_size(settings.max_batch_size)
        .concurrency(settings.publish_concurrency)
        .call_timeout(settings.call_timeout())
        .failure_policy(settings.failure_policy())
        .build();

    pipeline
        .run(payload.as_deref())
        .await
        .context("quota pipeline run failed")
}

fn build_provider(settings: &Settings) -> Result<SnapshotProvider> {
    let path = settings
        .usage_file
        .as_ref()
        .ok_or_else(|| anyhow!("no usage snapshot configured: pass --usage-file"))?;

    SnapshotProvider::builder()
        .path(path)
        .warning_threshold(settings.warning_threshold)
        .critical_threshold(settings.critical_threshold)
        .build()
        .with_context(|| format!("failed to load usage snapshot {}", path.display()))
}

async fn build_backend(settings: &Settings) -> Result<Box<dyn MonitoringBackend>> {
    if let Some(endpoint) = &settings.endpoint {
        return http_backend(endpoint, settings);
    }

    if let Some(path) = &settings.output {
        let backend = FileBackend::create(path)
            .await
            .with_context(|| format!("failed to open output {}", path.display()))?;
        return Ok(Box::new(backend));
    }

    Err(anyhow!(
        "no monitoring backend configured: pass --endpoint or --output"
    ))
}

#[cfg(feature = "http")]
fn http_backend(endpoint: &str, settings: &Settings) -> Result<Box<dyn MonitoringBackend>> {
    use quotawatch_adapters::http::HttpBackend;

    let mut builder = HttpBackend::builder()
        .endpoint(endpoint)
        .timeout(settings.call_timeout());
    if let Some(token) = &settings.api_token {
        builder = builder.api_token(token.clone());
    }
    Ok(Box::new(builder.build()?))
}

#[cfg(not(feature = "http"))]
fn http_backend(_endpoint: &str, _settings: &Settings) -> Result<Box<dyn MonitoringBackend>> {
    Err(anyhow!(
        "built without the `http` feature; use --output instead of --endpoint"
    ))
}
