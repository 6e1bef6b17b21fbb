//! Per-task throttling of progress events
//!
//! The external tool reports progress far more often than subscribers want to
//! hear about it. The throttle admits at most one sample per interval per
//! task; the first sample of a task is always admitted so subscribers see an
//! initial position immediately. Terminal samples are published outside the
//! throttle by the orchestrator.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::TaskId;

/// Interval-based progress gate, one slot per task id
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Mutex<HashMap<TaskId, Instant>>,
}

impl ProgressThrottle {
    /// Create a throttle with the given minimum interval between admissions
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a sample observed at `now` should be published
    ///
    /// Admission records `now` as the task's new baseline. The lock is a
    /// plain mutex held only for the map access.
    pub fn admit(&self, id: TaskId, now: Instant) -> bool {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match last.get(&id) {
            Some(prev) if now.duration_since(*prev) < self.interval => false,
            _ => {
                last.insert(id, now);
                true
            }
        }
    }

    /// Drop the throttle slot for a task that left the active registry
    pub fn forget(&self, id: TaskId) {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        last.remove(&id);
    }
}
