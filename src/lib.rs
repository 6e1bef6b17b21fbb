//! # media-dl
//!
//! Embeddable media download orchestration library built on yt-dlp.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Resilient** - Failed format selections degrade automatically, once
//! - **Non-blocking** - Submission and control calls never wait on a transfer
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use media_dl::{Config, FormatSpec, MediaOrchestrator, YtDlpFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let fetcher = Arc::new(YtDlpFetcher::new(config.fetcher.clone())?);
//!     let orchestrator = MediaOrchestrator::new(config, fetcher).await?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let id = orchestrator.submit("https://www.youtube.com/watch?v=dQw4w9WgXcQ", FormatSpec::Best)?;
//!     println!("Started download {id}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Event broadcast channel
pub mod bus;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// External download operation (yt-dlp adapter)
pub mod fetcher;
/// Format selection and fallback policy
pub mod format;
/// Durable download history
pub mod history;
/// Core orchestrator implementation (decomposed into focused submodules)
pub mod orchestrator;
/// Per-task progress event throttling
pub mod throttle;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use bus::EventBus;
pub use config::{Config, FetcherConfig};
pub use error::{Error, FetchError, FetchErrorKind, Result};
pub use fetcher::{FetchRequest, MediaFetcher, MediaMetadata, YtDlpFetcher};
pub use format::FormatSpec;
pub use history::{HistoryStore, JsonHistoryStore};
pub use orchestrator::MediaOrchestrator;
pub use types::{DownloadTask, Event, TaskId, TaskState};

/// Helper function to run the orchestrator with graceful signal handling.
///
/// Waits for a termination signal and then calls the orchestrator's
/// `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use media_dl::{Config, MediaOrchestrator, YtDlpFetcher, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let fetcher = Arc::new(YtDlpFetcher::new(config.fetcher.clone())?);
///     let orchestrator = MediaOrchestrator::new(config, fetcher).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(orchestrator).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(orchestrator: MediaOrchestrator) -> Result<()> {
    wait_for_signal().await;
    orchestrator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Handler registration can fail in minimal containers; listen on
    // whichever signals are available rather than giving up
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("SIGTERM received, stopping downloads"),
                _ = sigint.recv() => tracing::info!("SIGINT received, stopping downloads"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "SIGINT handler unavailable, listening for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("SIGTERM received, stopping downloads");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, listening for SIGINT only");
            sigint.recv().await;
            tracing::info!("SIGINT received, stopping downloads");
        }
        (Err(_), Err(_)) => {
            tracing::error!("No Unix signal handlers available, falling back to Ctrl+C");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for Ctrl+C");
        return;
    }
    tracing::info!("Ctrl+C received, stopping downloads");
}
