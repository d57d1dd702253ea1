//! Tracing subscriber setup for the binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter directive from `LOG_LEVEL`, else `RUST_LOG`, else `info`.
pub fn filter_directive() -> String {
    directive_from(
        std::env::var("LOG_LEVEL").ok(),
        std::env::var("RUST_LOG").ok(),
    )
}

fn directive_from(log_level: Option<String>, rust_log: Option<String>) -> String {
    log_level
        .filter(|v| !v.trim().is_empty())
        .or_else(|| rust_log.filter(|v| !v.trim().is_empty()))
        .map(|v| v.to_lowercase())
        .unwrap_or_else(|| "info".into())
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_new(filter_directive()).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
