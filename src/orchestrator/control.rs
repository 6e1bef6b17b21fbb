//! Pause, resume, and cancel
//!
//! All three are synchronous: they mutate the registry under the lock, bump
//! the task's epoch so the old worker goes stale, signal its cancellation
//! token, and return. The worker notices and exits on its own time.

use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, Result};
use crate::types::{Event, TaskId, TaskState};

use super::MediaOrchestrator;

impl MediaOrchestrator {
    /// Pause a running download
    ///
    /// No-op (returning Ok) unless the task is Running. Progress, metadata,
    /// and the effective format survive the pause; `resume` continues with
    /// the same id.
    pub fn pause(&self, id: TaskId) -> Result<()> {
        let token = {
            let mut registry = self.lock_registry();
            let entry = registry.active.get_mut(&id).ok_or(Error::NotFound(id))?;
            if entry.task.state != TaskState::Running {
                return Ok(());
            }
            entry.task.state = TaskState::Paused;
            entry.task.eta = String::new();
            entry.epoch += 1;
            std::mem::replace(&mut entry.token, CancellationToken::new())
        };
        token.cancel();
        info!(task_id = id.0, "Download paused");
        self.emit_event(Event::Paused { id });
        Ok(())
    }

    /// Resume a paused download
    ///
    /// No-op (returning Ok) unless the task is Paused. Spawns a fresh worker
    /// for the same id and effective format. Rejected once shutdown has
    /// begun, since resuming launches new transfer work.
    pub fn resume(&self, id: TaskId) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let (epoch, token) = {
            let mut registry = self.lock_registry();
            let entry = registry.active.get_mut(&id).ok_or(Error::NotFound(id))?;
            if entry.task.state != TaskState::Paused {
                return Ok(());
            }
            entry.task.state = TaskState::Running;
            entry.epoch += 1;
            let token = CancellationToken::new();
            entry.token = token.clone();
            (entry.epoch, token)
        };
        info!(task_id = id.0, "Download resumed");
        self.emit_event(Event::Resumed { id });
        self.spawn_worker(id, epoch, token);
        Ok(())
    }

    /// Cancel a download
    ///
    /// Valid from any non-terminal state. The task disappears from
    /// `list_active()` immediately and is never retained or written to
    /// history; the only trace is the `Canceled` event. Canceling a task
    /// already in its post-completion retention window is a no-op.
    pub fn cancel(&self, id: TaskId) -> Result<()> {
        let token = {
            let mut registry = self.lock_registry();
            match registry.active.remove(&id) {
                Some(entry) => entry.token,
                None => {
                    if self.retention.contains(id) {
                        return Ok(());
                    }
                    return Err(Error::NotFound(id));
                }
            }
        };
        token.cancel();
        self.throttle.forget(id);
        info!(task_id = id.0, "Download canceled");
        self.emit_event(Event::Canceled { id });
        Ok(())
    }
}
