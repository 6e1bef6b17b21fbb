//! Orchestrator integration tests against a scripted fetcher

#![allow(clippy::unwrap_used, clippy::expect_used)]


use std::time::Duration;
use tokio::sync::broadcast;

use crate::types::Event;

/// Receive the next event, failing the test after a generous timeout
pub(crate) async fn next_event(rx: &mut broadcast::Receiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Drain events until a terminal one (Completed or Failed) arrives, returning
/// everything received including the terminal event
pub(crate) async fn events_until_terminal(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let terminal = matches!(event, Event::Completed { .. } | Event::Failed { .. });
        events.push(event);
        if terminal {
            return events;
        }
    }
}
