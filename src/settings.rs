//! Runtime settings and limits payload loading.
//!
//! Settings are layered: built-in defaults, then an optional settings file,
//! then `QUOTAWATCH_*` environment variables, then command line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use config::{Config, Environment, File};
use serde::Deserialize;

use quotawatch_pipeline::{FailurePolicy, DEFAULT_MAX_BATCH_SIZE};
use quotawatch_types::{
    DEFAULT_CRIT_PERCENT, DEFAULT_NAMESPACE, DEFAULT_PROVENANCE, DEFAULT_WARN_PERCENT,
};

use crate::cli::Args;

/// Environment variable prefix for settings overrides.
pub const ENV_PREFIX: &str = "QUOTAWATCH";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnPublishError {
    #[default]
    Abort,
    Continue,
}

impl From<OnPublishError> for FailurePolicy {
    fn from(value: OnPublishError) -> Self {
        match value {
            OnPublishError::Abort => FailurePolicy::Abort,
            OnPublishError::Continue => FailurePolicy::Continue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub namespace: String,
    pub provenance_tag: String,
    pub max_batch_size: usize,
    pub publish_concurrency: usize,
    pub call_timeout_secs: u64,
    pub on_publish_error: OnPublishError,
    /// Default warning percentage for limits without their own.
    pub warning_threshold: f64,
    /// Default critical percentage for limits without their own.
    pub critical_threshold: f64,
    pub usage_file: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub api_token: Option<String>,
    pub output: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            provenance_tag: DEFAULT_PROVENANCE.to_string(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            publish_concurrency: 1,
            call_timeout_secs: 30,
            on_publish_error: OnPublishError::Abort,
            warning_threshold: DEFAULT_WARN_PERCENT,
            critical_threshold: DEFAULT_CRIT_PERCENT,
            usage_file: None,
            endpoint: None,
            api_token: None,
            output: None,
        }
    }
}

impl Settings {
    /// Resolve settings for one invocation.
    pub fn load(args: &Args) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = &args.settings {
            builder = builder.add_source(File::from(path.as_path()));
        }

        builder = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("namespace", args.namespace.clone())?
            .set_override_option("max_batch_size", args.max_batch_size.map(|n| n as u64))?
            .set_override_option("publish_concurrency", args.concurrency.map(|n| n as u64))?
            .set_override_option("usage_file", args.usage_file.as_deref().map(path_value))?
            .set_override_option("endpoint", args.endpoint.clone())?
            .set_override_option("output", args.output.as_deref().map(path_value))?;

        if args.continue_on_error {
            builder = builder.set_override("on_publish_error", "continue")?;
        }

        let settings: Settings = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .context("failed to load settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.on_publish_error.into()
    }

    fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            bail!("max_batch_size must be at least 1");
        }
        if self.publish_concurrency == 0 {
            bail!("publish_concurrency must be at least 1");
        }
        if self.endpoint.is_some() && self.output.is_some() {
            bail!("endpoint and output are mutually exclusive");
        }
        Ok(())
    }
}

fn path_value(path: &Path) -> String {
    path.display().to_string()
}

/// The YAML limits payload: read from `--config-file`, else decoded from
/// `--config-data` / `CONFIG_DATA_BASE64`. `None` when neither is given.
pub fn limits_payload(args: &Args) -> Result<Option<String>> {
    if let Some(path) = &args.config_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read limits configuration {}", path.display()))?;
        return Ok(Some(text));
    }

    args.config_data.as_deref().map(decode_payload).transpose()
}

/// Decode a base64 limits payload into UTF-8 text.
pub fn decode_payload(encoded: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("limits configuration is not valid base64")?;
    String::from_utf8(bytes).context("limits configuration is not valid UTF-8")
}
