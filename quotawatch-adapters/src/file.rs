//! Monitoring backend that appends newline-delimited JSON to a file.
//!
//! Useful as a dry-run target: every ingest or upsert call becomes one line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use quotawatch_pipeline::{BackendError, MonitoringBackend};
use quotawatch_types::{AlarmDefinition, Metric};

use crate::AdapterError;

/// One line of output.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'a> {
    Metrics {
        namespace: &'a str,
        metric_data: &'a [Metric],
    },
    Alarm {
        alarm: &'a AlarmDefinition,
    },
}

#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileBackend {
    /// Open `path` for appending, creating it if needed.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| AdapterError::io(&path, e))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, record: &Record<'_>) -> Result<(), BackendError> {
        let mut line =
            serde_json::to_vec(record).map_err(|e| BackendError::Rejected(e.to_string()))?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line)
            .await
            .map_err(|e| BackendError::Transport(format!("{}: {e}", self.path.display())))?;
        file.flush()
            .await
            .map_err(|e| BackendError::Transport(format!("{}: {e}", self.path.display())))
    }
}

#[async_trait]
impl MonitoringBackend for FileBackend {
    async fn ingest_metrics(&self, namespace: &str, batch: &[Metric]) -> Result<(), BackendError> {
        self.append(&Record::Metrics {
            namespace,
            metric_data: batch,
        })
        .await
    }

    async fn upsert_alarm(&self, alarm: &AlarmDefinition) -> Result<(), BackendError> {
        self.append(&Record::Alarm { alarm }).await
    }
}
