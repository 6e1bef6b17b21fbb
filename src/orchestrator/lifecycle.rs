//! Graceful shutdown

use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::Result;
use crate::types::Event;

use super::MediaOrchestrator;

/// How long shutdown waits for in-flight workers to stop
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl MediaOrchestrator {
    /// Shut the orchestrator down
    ///
    /// Stops accepting submissions, cancels every worker and retention
    /// timer, waits (bounded) for in-flight workers to release their permits,
    /// and publishes [`Event::Shutdown`]. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.accepting_new.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Shutting down download orchestrator");

        // Bump every epoch so interrupted workers go stale instead of
        // settling their tasks as failed
        let tokens: Vec<_> = {
            let mut registry = self.lock_registry();
            registry
                .active
                .values_mut()
                .map(|entry| {
                    entry.epoch += 1;
                    entry.token.clone()
                })
                .collect()
        };
        let active = tokens.len();
        for token in tokens {
            token.cancel();
        }

        // Workers release their permits as they notice cancellation; when we
        // can take every permit, no transfer is still running
        let all_permits = self.config.max_concurrent_downloads as u32;
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.semaphore.acquire_many(all_permits)).await
        {
            Ok(Ok(permits)) => drop(permits),
            Ok(Err(_)) => {}
            Err(_) => {
                warn!(active, "Timed out waiting for workers to stop");
            }
        }

        // Interrupted tasks must not linger in the visible set as Running
        {
            let mut registry = self.lock_registry();
            registry.active.clear();
        }
        self.retention.shutdown();
        self.emit_event(Event::Shutdown);
        info!("Shutdown complete");
        Ok(())
    }
}
