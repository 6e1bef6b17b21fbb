//! Shared fixtures for orchestrator tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::FetchError;
use crate::fetcher::{FetchRequest, MediaFetcher, MediaMetadata, ProgressFn};
use crate::history::JsonHistoryStore;
use crate::orchestrator::MediaOrchestrator;

/// What one scripted fetch invocation should do
#[derive(Clone, Debug)]
pub(crate) enum FetchScript {
    /// Report the given progress samples, then succeed with the files
    Complete {
        progress: Vec<(f64, i64)>,
        files: Vec<PathBuf>,
    },
    /// Fail immediately
    Fail(FetchError),
    /// Block until cancellation, then report an interruption error
    Hang,
}

impl FetchScript {
    pub(crate) fn quick_success() -> Self {
        FetchScript::Complete {
            progress: vec![(1.0, 0)],
            files: vec![PathBuf::from("video.mp4")],
        }
    }
}

/// Scripted fetcher: each fetch invocation pops the next script
pub(crate) struct MockFetcher {
    scripts: Mutex<VecDeque<FetchScript>>,
    invocations: AtomicU32,
    selectors: Mutex<Vec<String>>,
    metadata: Mutex<Option<MediaMetadata>>,
}

impl MockFetcher {
    pub(crate) fn new(scripts: Vec<FetchScript>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            invocations: AtomicU32::new(0),
            selectors: Mutex::new(Vec::new()),
            metadata: Mutex::new(None),
        })
    }

    pub(crate) fn set_metadata(&self, metadata: MediaMetadata) {
        *self.metadata.lock().unwrap() = Some(metadata);
    }

    pub(crate) fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Selector expressions seen, in invocation order
    pub(crate) fn selectors(&self) -> Vec<String> {
        self.selectors.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(
        &self,
        request: FetchRequest,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> std::result::Result<Vec<PathBuf>, FetchError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.selectors.lock().unwrap().push(request.selector);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(FetchScript::quick_success);

        match script {
            FetchScript::Complete {
                progress: samples,
                files,
            } => {
                for (fraction, eta) in samples {
                    if cancel.is_cancelled() {
                        return Err(FetchError::unknown("download interrupted"));
                    }
                    if !progress(fraction, eta, "") {
                        return Err(FetchError::unknown("download interrupted"));
                    }
                    // Real transfers space their reports out; tests rely on
                    // samples not all landing inside one throttle interval
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Ok(files
                    .into_iter()
                    .map(|f| request.download_dir.join(f))
                    .collect())
            }
            FetchScript::Fail(error) => Err(error),
            FetchScript::Hang => {
                cancel.cancelled().await;
                Err(FetchError::unknown("download interrupted"))
            }
        }
    }

    async fn probe(&self, _url: &str) -> std::result::Result<MediaMetadata, FetchError> {
        match self.metadata.lock().unwrap().clone() {
            Some(metadata) => Ok(metadata),
            None => Err(FetchError::unknown("probe not scripted")),
        }
    }
}

/// Orchestrator wired to a scripted fetcher, temp download dir, and temp
/// JSON history
pub(crate) async fn create_test_orchestrator(
    scripts: Vec<FetchScript>,
) -> (MediaOrchestrator, Arc<MockFetcher>, tempfile::TempDir) {
    create_test_orchestrator_with_interval(scripts, 1).await
}

/// Like [`create_test_orchestrator`] but with an explicit throttle interval
pub(crate) async fn create_test_orchestrator_with_interval(
    scripts: Vec<FetchScript>,
    progress_interval_ms: u64,
) -> (MediaOrchestrator, Arc<MockFetcher>, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let config = Config {
        download_dir: dir.path().join("downloads"),
        history_path: dir.path().join("history.json"),
        progress_interval_ms,
        ..Config::default()
    };
    let fetcher = MockFetcher::new(scripts);
    let history = Arc::new(JsonHistoryStore::new(config.history_path.clone()));
    let orchestrator = MediaOrchestrator::with_history(config, fetcher.clone(), history)
        .await
        .expect("create orchestrator");
    (orchestrator, fetcher, dir)
}

/// A valid submission URL
pub(crate) const TEST_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
