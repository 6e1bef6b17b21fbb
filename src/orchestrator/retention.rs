//! Grace-window retention of finished tasks
//!
//! A task that completes or fails stays visible in `list_active()` for a
//! short window so observers polling the snapshot catch the terminal state.
//! Each retained task gets its own eviction timer; re-retaining the same id
//! replaces the timer, so the newest terminal snapshot always gets the full
//! window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::bus::EventBus;
use crate::types::{DownloadTask, Event, TaskId};

#[derive(Debug, Default)]
struct RetentionInner {
    retained: HashMap<TaskId, DownloadTask>,
    timers: HashMap<TaskId, JoinHandle<()>>,
}

/// Visible set of terminal tasks awaiting eviction
#[derive(Debug)]
pub struct RetentionManager {
    window: Duration,
    bus: EventBus,
    inner: Mutex<RetentionInner>,
}

impl RetentionManager {
    /// Create a manager with the given grace window
    pub fn new(window: Duration, bus: EventBus) -> Self {
        Self {
            window,
            bus,
            inner: Mutex::new(RetentionInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RetentionInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add a terminal task snapshot and (re)arm its eviction timer
    pub fn retain(self: &Arc<Self>, task: DownloadTask) {
        let id = task.id;
        let this = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(this.window).await;
            this.evict(id);
        });

        let mut inner = self.lock();
        inner.retained.insert(id, task);
        if let Some(old) = inner.timers.insert(id, timer) {
            old.abort();
        }
    }

    fn evict(&self, id: TaskId) {
        let removed = {
            let mut inner = self.lock();
            inner.timers.remove(&id);
            inner.retained.remove(&id)
        };
        if removed.is_some() {
            debug!(task_id = id.0, "Evicting finished task from visible set");
            self.bus.publish(Event::Evicted { id });
        }
    }

    /// Snapshot of all retained tasks
    pub fn snapshot(&self) -> Vec<DownloadTask> {
        self.lock().retained.values().cloned().collect()
    }

    /// Whether a task id is currently retained
    pub fn contains(&self, id: TaskId) -> bool {
        self.lock().retained.contains_key(&id)
    }

    /// Abort all timers and drop the retained set
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        for (_, timer) in inner.timers.drain() {
            timer.abort();
        }
        inner.retained.clear();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatSpec;
    use crate::types::TaskState;

    fn finished_task(id: i64) -> DownloadTask {
        let mut task = DownloadTask::new(TaskId::new(id), "https://youtu.be/x", FormatSpec::Best);
        task.state = TaskState::Completed;
        task
    }

    #[tokio::test(start_paused = true)]
    async fn retained_task_is_visible_then_evicted() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let manager = Arc::new(RetentionManager::new(Duration::from_secs(10), bus));

        manager.retain(finished_task(1));
        assert!(manager.contains(TaskId::new(1)));

        // Halfway through the window it is still visible
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(manager.contains(TaskId::new(1)));
        assert_eq!(manager.snapshot().len(), 1);

        // Past the window it is gone and an eviction event fired
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!manager.contains(TaskId::new(1)));
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::Evicted { id } if id == TaskId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn re_retaining_restarts_the_window() {
        let bus = EventBus::new();
        let manager = Arc::new(RetentionManager::new(Duration::from_secs(10), bus));

        manager.retain(finished_task(1));
        tokio::time::sleep(Duration::from_secs(8)).await;
        manager.retain(finished_task(1));

        // 8 + 6 > 10, but the second retain rearmed the timer
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(manager.contains(TaskId::new(1)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!manager.contains(TaskId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_clears_everything() {
        let bus = EventBus::new();
        let manager = Arc::new(RetentionManager::new(Duration::from_secs(10), bus));
        manager.retain(finished_task(1));
        manager.retain(finished_task(2));

        manager.shutdown();
        assert!(manager.snapshot().is_empty());

        // No stray eviction events after timers were aborted
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(manager.snapshot().is_empty());
    }
}
