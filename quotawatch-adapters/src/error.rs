//! Error types for adapters.

use std::path::PathBuf;

use quotawatch_pipeline::ProviderError;
use thiserror::Error;

/// Errors that can occur while constructing or loading an adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Reading or writing a local file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a usage snapshot.
    #[error("Failed to parse usage snapshot: {0}")]
    Parse(String),

    /// HTTP client could not be set up.
    #[error("HTTP client setup failed: {0}")]
    Http(String),

    /// The adapter was configured inconsistently.
    #[error("Invalid adapter configuration: {0}")]
    Config(String),

    /// Timeout waiting for a file or response.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl AdapterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AdapterError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}

impl From<AdapterError> for ProviderError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Timeout(after) => ProviderError::Timeout(after),
            other => ProviderError::Collection(other.to_string()),
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        AdapterError::Http(err.to_string())
    }
}
