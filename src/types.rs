//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::format::FormatSpec;

/// Placeholder title shown until the metadata probe fills in the real one
pub const PLACEHOLDER_TITLE: &str = "Fetching media info...";

/// Unique identifier for a download task
///
/// Stable for the task's lifetime and used as the correlation key for all
/// events. A pause/resume cycle continues the same id; ids are never reused
/// within one orchestrator instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for i64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Lifecycle state of a download task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Accepted, worker not yet launched
    Pending,
    /// Worker active, external operation in flight
    Running,
    /// Paused by user; worker stopped, progress preserved
    Paused,
    /// Successfully completed (terminal)
    Completed,
    /// Failed with error (terminal)
    Failed,
    /// Canceled by user (terminal)
    Canceled,
}

impl TaskState {
    /// Whether this state is terminal (no further transitions occur)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled
        )
    }
}

/// One download request and its lifecycle
///
/// Created by the orchestrator on submission and mutated exclusively by it in
/// response to progress callbacks and outcome reports. Snapshots handed out by
/// `list_active()` and carried in events are clones.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Unique task identifier
    pub id: TaskId,

    /// Source media URL, immutable
    pub source_url: String,

    /// Format the caller asked for, immutable
    pub requested_format: FormatSpec,

    /// Format currently in effect; diverges from `requested_format` after a fallback
    pub effective_format: FormatSpec,

    /// Media title; starts as a placeholder, filled asynchronously
    pub title: String,

    /// Thumbnail URL, if one could be determined
    pub thumbnail_url: Option<String>,

    /// Download progress, clamped to 0..=100
    pub progress_percent: u8,

    /// Human-readable remaining time (`h:mm:ss` / `mm:ss`), empty when unknown
    pub eta: String,

    /// Current lifecycle state
    pub state: TaskState,

    /// When the task was submitted
    pub created_at: DateTime<Utc>,

    /// When the task first reached Completed or Failed (stamped exactly once)
    pub completed_at: Option<DateTime<Utc>>,

    /// Error detail, set only in Failed
    pub error: Option<String>,

    /// Output artifacts, set only in Completed
    pub output_files: Vec<PathBuf>,
}

impl DownloadTask {
    /// Create a freshly submitted task
    pub fn new(id: TaskId, source_url: impl Into<String>, format: FormatSpec) -> Self {
        Self {
            id,
            source_url: source_url.into(),
            requested_format: format.clone(),
            effective_format: format,
            title: PLACEHOLDER_TITLE.to_string(),
            thumbnail_url: None,
            progress_percent: 0,
            eta: String::new(),
            state: TaskState::Pending,
            created_at: Utc::now(),
            completed_at: None,
            error: None,
            output_files: Vec::new(),
        }
    }

    /// Apply a raw progress fraction, clamping to 0..=100
    ///
    /// The external tool occasionally reports fractions above 1.0 (muxing
    /// phases) or below 0.0; those are clamped, never propagated.
    pub fn apply_progress(&mut self, fraction: f64) {
        let percent = (fraction * 100.0).round();
        self.progress_percent = percent.clamp(0.0, 100.0) as u8;
    }
}

/// Event emitted during the download lifecycle
///
/// Delivery is best-effort via a broadcast channel; events for one task are
/// ordered relative to each other, with no cross-task guarantee.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Throttled progress update
    Progress {
        /// Task ID
        id: TaskId,
        /// Progress percentage (0 to 100)
        percent: u8,
        /// Human-readable remaining time, empty when unknown
        eta: String,
    },

    /// Download completed successfully
    Completed {
        /// Task ID
        id: TaskId,
        /// Terminal snapshot of the task, including output files
        task: Box<DownloadTask>,
    },

    /// Download failed
    Failed {
        /// Task ID
        id: TaskId,
        /// Failure classification
        kind: crate::error::FetchErrorKind,
        /// Error detail
        error: String,
    },

    /// Download paused by user
    Paused {
        /// Task ID
        id: TaskId,
    },

    /// Download resumed by user
    Resumed {
        /// Task ID
        id: TaskId,
    },

    /// Download canceled by user
    Canceled {
        /// Task ID
        id: TaskId,
    },

    /// Terminal task evicted from the visible retention set
    Evicted {
        /// Task ID
        id: TaskId,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

impl Event {
    /// The task this event belongs to, if any
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Event::Progress { id, .. }
            | Event::Completed { id, .. }
            | Event::Failed { id, .. }
            | Event::Paused { id }
            | Event::Resumed { id }
            | Event::Canceled { id }
            | Event::Evicted { id } => Some(*id),
            Event::Shutdown => None,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn task_id_round_trips_through_i64() {
        let id = TaskId::from(42_i64);
        let raw: i64 = id.into();
        assert_eq!(raw, 42);
    }

    #[test]
    fn task_id_from_str_parses_valid_integer() {
        let id = TaskId::from_str("123").unwrap();
        assert_eq!(id.get(), 123);
    }

    #[test]
    fn task_id_from_str_rejects_non_numeric() {
        assert!(TaskId::from_str("abc").is_err());
        assert!(TaskId::from_str("").is_err());
    }

    #[test]
    fn task_id_display_matches_inner_value() {
        assert_eq!(TaskId::new(999).to_string(), "999");
    }

    #[test]
    fn new_task_starts_pending_with_placeholder_title() {
        let task = DownloadTask::new(TaskId::new(1), "https://youtu.be/x", FormatSpec::Best);
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.title, PLACEHOLDER_TITLE);
        assert_eq!(task.progress_percent, 0);
        assert_eq!(task.requested_format, task.effective_format);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn apply_progress_clamps_overshoot_to_100() {
        let mut task = DownloadTask::new(TaskId::new(1), "https://youtu.be/x", FormatSpec::Best);
        task.apply_progress(1.4);
        assert_eq!(
            task.progress_percent, 100,
            "raw fraction 1.4 must clamp to 100, not overflow"
        );
    }

    #[test]
    fn apply_progress_clamps_negative_to_0() {
        let mut task = DownloadTask::new(TaskId::new(1), "https://youtu.be/x", FormatSpec::Best);
        task.apply_progress(-0.1);
        assert_eq!(task.progress_percent, 0);
    }

    #[test]
    fn apply_progress_converts_fraction_to_percent() {
        let mut task = DownloadTask::new(TaskId::new(1), "https://youtu.be/x", FormatSpec::Best);
        task.apply_progress(0.55);
        assert_eq!(task.progress_percent, 55);
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Canceled.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(!TaskState::Paused.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
    }

    #[test]
    fn event_task_id_extracts_correlation_key() {
        let ev = Event::Paused { id: TaskId::new(5) };
        assert_eq!(ev.task_id(), Some(TaskId::new(5)));
        assert_eq!(Event::Shutdown.task_id(), None);
    }
}
