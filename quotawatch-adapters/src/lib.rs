//! # quotawatch-adapters
//!
//! Ready-made collaborators for the quotawatch pipeline.
//!
//! ## Usage providers
//!
//! - **Snapshot** - Limits and usage read from a JSON snapshot file, or held
//!   in memory
//!
//! ## Monitoring backends
//!
//! - **HTTP** (`http` feature) - JSON-over-HTTP ingest and alarm upsert API
//! - **File** - Newline-delimited JSON, one line per call
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quotawatch_adapters::{file::FileBackend, snapshot::SnapshotProvider};
//! use quotawatch_pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = SnapshotProvider::builder().path("usage.json").build()?;
//!     let backend = FileBackend::create("published.ndjson").await?;
//!
//!     let yaml = std::fs::read_to_string("limits.yaml")?;
//!     let summary = Pipeline::builder(provider, backend)
//!         .build()
//!         .run(Some(&yaml))
//!         .await?;
//!
//!     println!("Published {} metrics", summary.metrics);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod file;
pub mod snapshot;

#[cfg(feature = "http")]
pub mod http;

pub use error::AdapterError;

// Re-export types for convenience
pub use quotawatch_types::{AlarmDefinition, Limit, Metric, UsageSample};
