//! Local durable record for alerts no channel accepted

use super::{AlertMessage, ChannelId};
use crate::error::FallbackError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

/// One undelivered alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRecord {
    pub recorded_at: DateTime<Utc>,
    pub message: AlertMessage,
    /// Per-channel outcome; empty when nothing was routed
    pub results: BTreeMap<ChannelId, bool>,
    pub errors: BTreeMap<ChannelId, String>,
}

/// Sink receiving undelivered alerts
#[async_trait]
pub trait FallbackSink: Send + Sync {
    async fn record(&self, record: &FallbackRecord) -> Result<(), FallbackError>;
}

/// Appends one JSON object per line and syncs it to disk
#[derive(Debug)]
pub struct JsonlFallback {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonlFallback {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record in the file
    pub fn read_all(path: &Path) -> Result<Vec<FallbackRecord>, FallbackError> {
        let content = std::fs::read_to_string(path).map_err(|source| FallbackError::Write {
            path: path.display().to_string(),
            source,
        })?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(FallbackError::from))
            .collect()
    }

    fn io_error(&self, source: std::io::Error) -> FallbackError {
        FallbackError::Write {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl FallbackSink for JsonlFallback {
    async fn record(&self, record: &FallbackRecord) -> Result<(), FallbackError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.sync_data().await.map_err(|e| self.io_error(e))
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryFallback {
    records: Mutex<Vec<FallbackRecord>>,
}

impl MemoryFallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<FallbackRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl FallbackSink for MemoryFallback {
    async fn record(&self, record: &FallbackRecord) -> Result<(), FallbackError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}
