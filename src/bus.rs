//! Broadcast event channel
//!
//! Every lifecycle transition and admitted progress sample goes through one
//! [`EventBus`]. Publication is fire-and-forget: with no subscribers the event
//! is dropped, and a subscriber that falls behind the channel capacity loses
//! the oldest events (`RecvError::Lagged`) rather than slowing the workers.

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::types::Event;

/// Channel capacity; a lagging subscriber loses events past this backlog
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Fan-out channel for download lifecycle events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: Event) {
        // send() errs only when there are no receivers, which is fine
        self.sender.send(event).ok();
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Subscribe to events matching a predicate, as a `Stream`
    ///
    /// Lagged gaps are silently skipped; the stream ends when the bus is
    /// dropped.
    pub fn subscribe_filtered<F>(&self, predicate: F) -> impl Stream<Item = Event> + use<F>
    where
        F: Fn(&Event) -> bool + Send + 'static,
    {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |result| match result {
            Ok(event) if predicate(&event) => Some(event),
            _ => None,
        })
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
