//! # quotawatch-types
//!
//! Core types for service quota monitoring. This crate defines the model that
//! flows through a quotawatch run: limits reported by a usage provider, the
//! usage samples observed against them, and the metric records and alarm
//! definitions derived from both.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature for wire formats
//! - **Backend agnostic**: Metric and alarm shapes follow the common
//!   name/dimensions/value model accepted by most monitoring backends
//! - **Ergonomic builders**: Fluent API for constructing limits
//!
//! ## Features
//!
//! - `serde`: JSON/YAML/etc. serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use quotawatch_types::{Limit, QuotaLimit, UsageSample};
//!
//! let limit = Limit::builder("VPC", "VPCs per Region")
//!     .default_limit(5.0)
//!     .usage(UsageSample::new(3.0).resource_id("us-east-1"))
//!     .build();
//!
//! assert_eq!(limit.effective_ceiling(), Some(5.0));
//! assert!(limit.has_resource_limits());
//! assert_eq!(limit.current_usage_summary(), "us-east-1=3");
//! ```

mod alarm;
mod limit;
mod metrics;
mod usage;

pub use alarm::*;
pub use limit::*;
pub use metrics::*;
pub use usage::*;

/// Default namespace metrics and alarms are published under.
pub const DEFAULT_NAMESPACE: &str = "ServicesLimits";

/// Dimension name carrying a usage sample's resource type.
pub const AWS_TYPE_DIMENSION: &str = "aws_type";

/// Dimension name carrying a usage sample's resource id.
pub const RESOURCE_ID_DIMENSION: &str = "resource_id";
