//! The fetch worker: one spawned task per download attempt chain
//!
//! A worker acquires a concurrency permit, runs fetch attempts through the
//! configured [`MediaFetcher`](crate::fetcher::MediaFetcher), applies the
//! single-fallback format policy, and settles the terminal outcome. All task
//! mutation happens under the registry lock with the worker's epoch checked,
//! so a worker orphaned by pause/resume/cancel can never corrupt state.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FetchError, FetchErrorKind};
use crate::fetcher::{FetchRequest, ProgressFn};
use crate::format::FormatSpec;
use crate::types::{DownloadTask, Event, TaskId, TaskState};
use crate::utils::format_eta;

use super::MediaOrchestrator;

impl MediaOrchestrator {
    pub(crate) fn spawn_worker(&self, id: TaskId, epoch: u64, token: CancellationToken) {
        let this = self.clone();
        tokio::spawn(async move {
            this.run_worker(id, epoch, token).await;
        });
    }

    async fn run_worker(self, id: TaskId, epoch: u64, token: CancellationToken) {
        // Queue behind the concurrency bound; leave immediately if the task
        // was paused or canceled while waiting
        let _permit = tokio::select! {
            _ = token.cancelled() => return,
            permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let Some((url, format)) = self.attempt_inputs(id, epoch) else {
                return;
            };

            debug!(task_id = id.0, attempt, format = %format, "Starting fetch attempt");
            let request = FetchRequest {
                url,
                selector: format.selector(),
                download_dir: self.config.download_dir.clone(),
            };
            let progress = self.progress_callback(id, epoch, token.clone());

            let result = tokio::select! {
                // Pause or cancel settles the task elsewhere; just stop
                _ = token.cancelled() => return,
                result = self.fetcher.fetch(request, progress, token.clone()) => result,
            };

            match result {
                Ok(files) if files.is_empty() => {
                    self.settle_failed(
                        id,
                        epoch,
                        FetchError::unknown("download finished without producing output files"),
                    )
                    .await;
                    return;
                }
                Ok(files) => {
                    self.settle_completed(id, epoch, files).await;
                    return;
                }
                Err(error) if error.kind == FetchErrorKind::FormatUnavailable => {
                    match self.apply_fallback(id, epoch, attempt) {
                        Some(fallback) => {
                            warn!(
                                task_id = id.0,
                                fallback = %fallback,
                                "Requested format unavailable, retrying with degraded format"
                            );
                        }
                        None => {
                            self.settle_failed(id, epoch, error).await;
                            return;
                        }
                    }
                }
                Err(error) => {
                    self.settle_failed(id, epoch, error).await;
                    return;
                }
            }
        }
    }

    /// Snapshot the inputs for a fetch attempt, or `None` if this worker is
    /// no longer the task's current one
    fn attempt_inputs(&self, id: TaskId, epoch: u64) -> Option<(String, FormatSpec)> {
        let registry = self.lock_registry();
        let entry = registry.active.get(&id)?;
        if entry.epoch != epoch || entry.task.state != TaskState::Running {
            return None;
        }
        Some((entry.task.source_url.clone(), entry.task.effective_format.clone()))
    }

    /// Degrade the effective format for a retry, or `None` if the fallback
    /// budget is spent
    fn apply_fallback(&self, id: TaskId, epoch: u64, attempt: u32) -> Option<FormatSpec> {
        let mut registry = self.lock_registry();
        let entry = registry.active.get_mut(&id)?;
        if entry.epoch != epoch || entry.task.state != TaskState::Running {
            return None;
        }
        let fallback = entry.task.requested_format.next_fallback(attempt)?;
        if fallback == entry.task.effective_format {
            return None;
        }
        entry.task.effective_format = fallback.clone();
        Some(fallback)
    }

    /// Build the progress callback handed to the fetcher
    ///
    /// Fields update on every sample; an event publishes only when the
    /// throttle admits it. Returns false once the worker is stale so
    /// cooperative fetchers stop early.
    fn progress_callback(&self, id: TaskId, epoch: u64, token: CancellationToken) -> ProgressFn {
        let this = self.clone();
        Arc::new(move |fraction, eta_seconds, _raw_line| {
            if token.is_cancelled() {
                return false;
            }
            let eta = format_eta(eta_seconds);
            let percent = {
                let mut registry = this.lock_registry();
                let Some(entry) = registry.active.get_mut(&id) else {
                    return false;
                };
                if entry.epoch != epoch || entry.task.state != TaskState::Running {
                    return false;
                }
                entry.task.apply_progress(fraction);
                entry.task.eta = eta.clone();
                entry.task.progress_percent
            };
            if this.throttle.admit(id, Instant::now()) {
                this.emit_event(Event::Progress { id, percent, eta });
            }
            true
        })
    }

    /// Settle a successful outcome
    ///
    /// A completion whose pause raced it still wins: the entry is Paused with
    /// the epoch exactly one ahead and no new worker has started, so the
    /// finished transfer's result is kept rather than discarded.
    async fn settle_completed(&self, id: TaskId, epoch: u64, files: Vec<std::path::PathBuf>) {
        let snapshot = {
            let mut registry = self.lock_registry();
            let Some(entry) = registry.active.get(&id) else {
                return;
            };
            let current = entry.epoch == epoch;
            let paused_race = entry.task.state == TaskState::Paused && entry.epoch == epoch + 1;
            if !current && !paused_race {
                return;
            }
            let Some(mut entry) = registry.active.remove(&id) else {
                return;
            };
            entry.task.state = TaskState::Completed;
            entry.task.progress_percent = 100;
            entry.task.eta = String::new();
            entry.task.completed_at = Some(Utc::now());
            entry.task.output_files = files;
            entry.task
        };
        // Retention and history are settled before announcing, so a
        // subscriber reacting to the completion event finds the task still
        // visible and its record already durable
        self.throttle.forget(id);
        self.retention.retain(snapshot.clone());
        self.record(snapshot.clone()).await;
        // Terminal progress bypasses the throttle so subscribers always see
        // 100 before the completion event
        self.emit_event(Event::Progress {
            id,
            percent: 100,
            eta: String::new(),
        });
        self.emit_event(Event::Completed {
            id,
            task: Box::new(snapshot),
        });
        info!(task_id = id.0, "Download completed");
    }

    /// Settle a failed outcome; stale workers (including pause-interrupted
    /// ones, whose fetch dies with an error) are ignored
    async fn settle_failed(&self, id: TaskId, epoch: u64, error: FetchError) {
        let snapshot = {
            let mut registry = self.lock_registry();
            let Some(entry) = registry.active.get(&id) else {
                return;
            };
            if entry.epoch != epoch || entry.task.state != TaskState::Running {
                return;
            }
            let Some(mut entry) = registry.active.remove(&id) else {
                return;
            };
            entry.task.state = TaskState::Failed;
            entry.task.eta = String::new();
            entry.task.completed_at = Some(Utc::now());
            entry.task.error = Some(error.message.clone());
            entry.task
        };
        self.throttle.forget(id);
        self.retention.retain(snapshot.clone());
        self.record(snapshot).await;
        warn!(task_id = id.0, kind = ?error.kind, error = %error.message, "Download failed");
        self.emit_event(Event::Failed {
            id,
            kind: error.kind,
            error: error.message,
        });
    }

    /// Append the terminal record to history
    async fn record(&self, task: DownloadTask) {
        let id = task.id;
        if let Err(e) = self.history.append(task).await {
            warn!(task_id = id.0, error = %e, "Failed to write history record");
        }
    }
}
