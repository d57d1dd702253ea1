//! # quotawatch
//!
//! Evaluates service quota usage against configured thresholds and publishes
//! the result as metrics and threshold alarms.
//!
//! ## Architecture
//!
//! ```text
//! usage.json  ──▶ SnapshotProvider ──┐
//!                                    ▼
//! limits.yaml ──────────────────▶ Pipeline ──▶ HttpBackend | FileBackend
//! ```
//!
//! - **[`cli`]**: command line arguments
//! - **[`settings`]**: layered runtime settings and the limits payload
//! - **[`logging`]**: tracing subscriber setup
//! - **[`app`]**: wiring of provider, backend and pipeline for one run
//!
//! ## Usage
//!
//! ```bash
//! # Dry run: append published records to a file
//! quotawatch --config-file limits.yaml --usage-file usage.json --output published.ndjson
//!
//! # Publish to a monitoring API
//! CONFIG_DATA_BASE64=$(base64 -w0 limits.yaml) \
//! ALARM_ACTIONS=arn:aws:sns:eu-west-1:123456789012:quota-alerts \
//! quotawatch --usage-file usage.json --endpoint https://monitoring.internal
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use clap::Parser;
//! use quotawatch::Args;
//!
//! # tokio_test::block_on(async {
//! let args = Args::parse_from(["quotawatch", "--usage-file", "usage.json", "--output", "out.ndjson"]);
//! let summary = quotawatch::app::run(args).await.unwrap();
//! println!("{} alarms", summary.alarms);
//! # });
//! ```

pub mod app;
pub mod cli;
pub mod logging;
pub mod settings;

// Re-export main types for convenience
pub use cli::Args;
pub use quotawatch_pipeline::{Pipeline, PipelineError, RunSummary};
pub use settings::Settings;
