//! Error types for media-dl
//!
//! This module provides the error handling for the library, including:
//! - The top-level [`Error`] type returned by orchestrator operations
//! - [`FetchError`], the typed failure reported by the external download
//!   operation, with a machine-readable [`FetchErrorKind`]

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TaskId;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed submission, rejected before a task is created
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Human-readable description of what was wrong with the request
        message: String,
    },

    /// A task with this id is already active
    #[error("task {id} is already active")]
    DuplicateActive {
        /// The colliding task id
        id: TaskId,
    },

    /// Task not found in the active registry
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// The external download operation failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Machine-readable classification of an external download failure
///
/// The orchestrator bases its retry decision solely on this kind:
/// `FormatUnavailable` is retried exactly once with a degraded format,
/// everything else fails the task directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// The requested format selection matched nothing on the remote source
    FormatUnavailable,
    /// The remote source demands automated-traffic verification
    ///
    /// Surfaced distinctly so a caller can offer remediation (e.g. supplying
    /// exported session cookies) instead of a generic failure message.
    VerificationRequired,
    /// Local storage failure (directory creation, disk write)
    Storage,
    /// Anything else (network, extractor, tool crash)
    Unknown,
}

/// Failure reported by the external download operation
#[derive(Clone, Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct FetchError {
    /// Failure classification driving the retry decision
    pub kind: FetchErrorKind,
    /// Human-readable message, preserved verbatim for diagnostics
    pub message: String,
}

impl FetchError {
    /// Create a new fetch error
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for an `Unknown` failure
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unknown, message)
    }

    /// Classify a raw tool error message into a kind
    ///
    /// Matches the error strings yt-dlp is known to emit for the two
    /// conditions the orchestrator treats specially.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if message.contains("Requested format is not available")
            || message.contains("format not available")
        {
            FetchErrorKind::FormatUnavailable
        } else if message.contains("Sign in to confirm you're not a bot") {
            FetchErrorKind::VerificationRequired
        } else if message.contains("No space left on device")
            || message.contains("Permission denied")
        {
            FetchErrorKind::Storage
        } else {
            FetchErrorKind::Unknown
        };
        Self { kind, message }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_detects_format_unavailable() {
        let err = FetchError::classify("ERROR: Requested format is not available");
        assert_eq!(err.kind, FetchErrorKind::FormatUnavailable);

        let err = FetchError::classify("requested format not available, use --list-formats");
        assert_eq!(err.kind, FetchErrorKind::FormatUnavailable);
    }

    #[test]
    fn classify_detects_verification_required() {
        let err = FetchError::classify("ERROR: Sign in to confirm you're not a bot");
        assert_eq!(
            err.kind,
            FetchErrorKind::VerificationRequired,
            "bot-check errors must be tagged distinctly so callers can offer remediation"
        );
    }

    #[test]
    fn classify_detects_storage_errors() {
        let err = FetchError::classify("OSError: No space left on device");
        assert_eq!(err.kind, FetchErrorKind::Storage);
    }

    #[test]
    fn classify_defaults_to_unknown() {
        let err = FetchError::classify("something exploded");
        assert_eq!(err.kind, FetchErrorKind::Unknown);
        assert_eq!(
            err.message, "something exploded",
            "original message must be preserved for diagnostics"
        );
    }

    #[test]
    fn error_display_includes_task_id() {
        let err = Error::NotFound(TaskId::new(7));
        assert_eq!(err.to_string(), "task not found: 7");
    }
}
