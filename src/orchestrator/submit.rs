//! Task submission and the metadata probe

use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::format::FormatSpec;
use crate::types::{DownloadTask, TaskId, TaskState};
use crate::utils::{default_thumbnail_url, extract_video_id};

use super::MediaOrchestrator;
use super::TaskEntry;

/// Hosts the orchestrator accepts download URLs for
const SUPPORTED_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
];

fn validate_url(raw: &str) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(Error::InvalidRequest {
            message: "URL must not be empty".to_string(),
        });
    }
    let url = Url::parse(raw).map_err(|e| Error::InvalidRequest {
        message: format!("malformed URL: {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidRequest {
            message: format!("unsupported URL scheme: {}", url.scheme()),
        });
    }
    match url.host_str() {
        Some(host) if SUPPORTED_HOSTS.contains(&host) => Ok(url),
        Some(host) => Err(Error::InvalidRequest {
            message: format!("unsupported media host: {host}"),
        }),
        None => Err(Error::InvalidRequest {
            message: "URL has no host".to_string(),
        }),
    }
}

impl MediaOrchestrator {
    /// Submit a new download
    ///
    /// Validates the URL, registers the task as Running, and spawns the
    /// worker plus a detached metadata probe. Never waits on the transfer;
    /// submissions beyond the concurrency bound queue inside the worker.
    ///
    /// Two submissions of the same URL are independent tasks.
    pub fn submit(&self, url: &str, format: FormatSpec) -> Result<TaskId> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        validate_url(url)?;

        let id = TaskId::new(self.next_task_id.fetch_add(1, Ordering::SeqCst));
        let mut task = DownloadTask::new(id, url, format);
        task.state = TaskState::Running;
        if let Some(video_id) = extract_video_id(url) {
            task.thumbnail_url = Some(default_thumbnail_url(video_id));
        }

        let token = CancellationToken::new();
        {
            let mut registry = self.lock_registry();
            if registry.active.contains_key(&id) {
                return Err(Error::DuplicateActive { id });
            }
            registry.active.insert(
                id,
                TaskEntry {
                    task,
                    epoch: 0,
                    token: token.clone(),
                },
            );
        }

        info!(task_id = id.0, url = %url, "Download submitted");
        self.spawn_probe(id, url.to_string());
        self.spawn_worker(id, 0, token);
        Ok(id)
    }

    /// Fill in title and thumbnail asynchronously
    ///
    /// Probe failures never touch the state machine; the task just keeps its
    /// placeholder title.
    fn spawn_probe(&self, id: TaskId, url: String) {
        let this = self.clone();
        tokio::spawn(async move {
            match this.fetcher.probe(&url).await {
                Ok(metadata) => {
                    let mut registry = this.lock_registry();
                    if let Some(entry) = registry.active.get_mut(&id) {
                        if let Some(title) = metadata.title
                            && entry.task.title == crate::types::PLACEHOLDER_TITLE
                        {
                            entry.task.title = title;
                        }
                        if let Some(thumbnail) = metadata.thumbnail_url {
                            entry.task.thumbnail_url = Some(thumbnail);
                        }
                    }
                }
                Err(e) => {
                    debug!(task_id = id.0, error = %e, "Metadata probe failed");
                }
            }
        });
    }
}
