//! Download task orchestration
//!
//! [`MediaOrchestrator`] is the public entry point: it owns the active task
//! registry, bounds concurrent transfers with a semaphore, throttles progress
//! events, keeps finished tasks visible for a grace window, and persists
//! terminal outcomes to history.
//!
//! Control operations (`submit`, `pause`, `resume`, `cancel`, `list_active`)
//! are synchronous and non-blocking: all transfer work happens in spawned
//! workers, and the registry mutex is only ever held for short field updates,
//! never across an await point.

mod control;
mod lifecycle;
mod retention;
mod submit;
mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;
#[cfg(test)]
mod tests;

pub use retention::RetentionManager;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::bus::EventBus;
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::MediaFetcher;
use crate::history::{HistoryStore, JsonHistoryStore};
use crate::throttle::ProgressThrottle;
use crate::types::{DownloadTask, Event, TaskId};

/// One active task plus its worker bookkeeping
#[derive(Debug)]
pub(crate) struct TaskEntry {
    pub(crate) task: DownloadTask,
    /// Bumped on every pause/resume/cancel; a worker whose epoch no longer
    /// matches is stale and may not mutate the task
    pub(crate) epoch: u64,
    pub(crate) token: CancellationToken,
}

/// Active (non-terminal) tasks keyed by id
#[derive(Debug, Default)]
pub(crate) struct Registry {
    pub(crate) active: HashMap<TaskId, TaskEntry>,
}

/// Orchestrates media download tasks end to end
///
/// Cheap to clone; all state is shared behind `Arc`s, so workers hold clones.
#[derive(Clone)]
pub struct MediaOrchestrator {
    pub(crate) config: Arc<Config>,
    pub(crate) registry: Arc<Mutex<Registry>>,
    pub(crate) semaphore: Arc<Semaphore>,
    pub(crate) throttle: Arc<ProgressThrottle>,
    pub(crate) retention: Arc<RetentionManager>,
    pub(crate) bus: EventBus,
    pub(crate) fetcher: Arc<dyn MediaFetcher>,
    pub(crate) history: Arc<dyn HistoryStore>,
    pub(crate) accepting_new: Arc<AtomicBool>,
    pub(crate) next_task_id: Arc<AtomicI64>,
}

impl MediaOrchestrator {
    /// Create an orchestrator with a file-backed history store
    pub async fn new(config: Config, fetcher: Arc<dyn MediaFetcher>) -> Result<Self> {
        let history = Arc::new(JsonHistoryStore::new(config.history_path.clone()));
        Self::with_history(config, fetcher, history).await
    }

    /// Create an orchestrator with an explicit history store
    pub async fn with_history(
        config: Config,
        fetcher: Arc<dyn MediaFetcher>,
        history: Arc<dyn HistoryStore>,
    ) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.download_dir).await?;

        let bus = EventBus::new();
        let retention = Arc::new(RetentionManager::new(config.retention_window(), bus.clone()));

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_downloads)),
            throttle: Arc::new(ProgressThrottle::new(config.progress_interval())),
            retention,
            bus,
            fetcher,
            history,
            accepting_new: Arc::new(AtomicBool::new(true)),
            next_task_id: Arc::new(AtomicI64::new(1)),
            registry: Arc::new(Mutex::new(Registry::default())),
            config: Arc::new(config),
        })
    }

    /// Subscribe to all lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Subscribe to events matching a predicate, as a `Stream`
    pub fn subscribe_filtered<F>(&self, predicate: F) -> impl futures::Stream<Item = Event> + use<F>
    where
        F: Fn(&Event) -> bool + Send + 'static,
    {
        self.bus.subscribe_filtered(predicate)
    }

    /// Snapshot of all visible tasks: active ones plus recently finished ones
    /// still inside the retention window. Order is arbitrary.
    pub fn list_active(&self) -> Vec<DownloadTask> {
        let mut tasks: Vec<DownloadTask> = {
            let registry = self.lock_registry();
            registry.active.values().map(|e| e.task.clone()).collect()
        };
        tasks.extend(self.retention.snapshot());
        tasks
    }

    /// All history records, newest first
    pub async fn history(&self) -> Result<Vec<DownloadTask>> {
        self.history.list().await
    }

    /// Remove one history record
    pub async fn remove_history(&self, id: TaskId) -> Result<()> {
        self.history.remove(id).await
    }

    /// Drop all history records
    pub async fn clear_history(&self) -> Result<()> {
        self.history.clear().await
    }

    pub(crate) fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn emit_event(&self, event: Event) {
        trace!(?event, "Emitting event");
        self.bus.publish(event);
    }
}
