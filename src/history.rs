//! Durable download history
//!
//! Completed and failed tasks are appended to a history store; canceled tasks
//! never are. Appending a record whose id already exists replaces it in place
//! conceptually, with the refreshed record moved to the front, so the list
//! reads newest-first and a resumed-then-finished task appears once.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{DownloadTask, TaskId};

/// Persistent record of finished downloads
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a terminal task record, replacing any record with the same id
    async fn append(&self, task: DownloadTask) -> Result<()>;

    /// All records, newest first
    async fn list(&self) -> Result<Vec<DownloadTask>>;

    /// Remove a single record by id; no-op if absent
    async fn remove(&self, id: TaskId) -> Result<()>;

    /// Drop all records
    async fn clear(&self) -> Result<()>;
}

/// File-backed history store serialized as a JSON array
///
/// All operations read, modify, and rewrite the whole file under an internal
/// async mutex; history volumes are small enough that this is the simplest
/// correct thing.
#[derive(Debug)]
pub struct JsonHistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonHistoryStore {
    /// Create a store backed by the given file path
    ///
    /// The file is created lazily on first append; a missing file reads as an
    /// empty history.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<DownloadTask>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(records) => Ok(records),
                Err(e) => {
                    // A corrupt file should not brick the orchestrator
                    warn!(path = %self.path.display(), error = %e, "History file unreadable, starting fresh");
                    Ok(Vec::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, records: &[DownloadTask]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn append(&self, task: DownloadTask) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.retain(|r| r.id != task.id);
        debug!(task_id = task.id.0, "Appending history record");
        records.insert(0, task);
        self.save(&records).await
    }

    async fn list(&self) -> Result<Vec<DownloadTask>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn remove(&self, id: TaskId) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() != before {
            self.save(&records).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.save(&[]).await
    }
}
