//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "quotawatch")]
#[command(about = "Publish service quota usage as metrics and threshold alarms")]
pub struct Args {
    /// Path to the YAML limits configuration. Takes precedence over
    /// `--config-data`.
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Base64-encoded YAML limits configuration
    #[arg(long, env = "CONFIG_DATA_BASE64", hide_env_values = true)]
    pub config_data: Option<String>,

    /// Runtime settings file (TOML)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// JSON usage snapshot to read limits and usage from
    #[arg(short, long)]
    pub usage_file: Option<PathBuf>,

    /// Monitoring API base URL
    #[arg(short, long, conflicts_with = "output")]
    pub endpoint: Option<String>,

    /// Append published records to this file instead of calling an API
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Comma-separated notification targets attached to every alarm
    #[arg(long, env = "ALARM_ACTIONS")]
    pub alarm_actions: Option<String>,

    /// Namespace for metrics and alarms
    #[arg(long)]
    pub namespace: Option<String>,

    /// Metric records per ingest call
    #[arg(long)]
    pub max_batch_size: Option<usize>,

    /// Publish calls in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Keep publishing after a failed call and report all failures
    #[arg(long)]
    pub continue_on_error: bool,
}

impl Args {
    /// Notification targets, with empty items dropped.
    pub fn alarm_actions(&self) -> Vec<String> {
        self.alarm_actions
            .as_deref()
            .map(parse_alarm_actions)
            .unwrap_or_default()
    }
}

/// Split a comma-separated list, trimming items and dropping empty ones.
pub fn parse_alarm_actions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}
