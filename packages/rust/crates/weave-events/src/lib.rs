//! Broadcast event bus for the vault engine.
//!
//! Collaborators (renderers, the CLI, anything observing a vault) subscribe
//! to one bus and receive every applied delta and watch lifecycle change.
//!
//! ```text
//! WatchSession ── emit(topic, payload) ──► broadcast::Sender
//!                                              │
//!                          ┌───────────────────┼───────────────────┐
//!                          ▼                   ▼                   ▼
//!                       renderer            CLI printer         tests
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod topics;

/// One message on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaveEvent {
    /// Unique event identifier.
    pub id: String,
    /// Emitting component (see [`sources`]).
    pub source: String,
    /// Routing key (see [`topics`]).
    pub topic: String,
    /// JSON payload; shape depends on the topic.
    pub payload: Value,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

impl WeaveEvent {
    /// Create an event stamped now.
    pub fn new(source: impl Into<String>, topic: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            topic: topic.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Lifecycle event carrying only the watched directory.
    pub fn for_directory(source: &str, topic: &str, directory: &str) -> Self {
        Self::new(source, topic, json!({ "directory": directory }))
    }

    /// Decode the payload into a typed value.
    ///
    /// # Errors
    /// Returns the `serde_json` error when the payload has another shape.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

impl std::fmt::Display for WeaveEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} -> {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.source,
            self.topic,
            self.payload
        )
    }
}

/// Fan-out bus over `tokio::sync::broadcast`.
///
/// Publishing never blocks; slow subscribers observe `Lagged` and skip ahead.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WeaveEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Buffer size per subscriber.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publish an event; returns how many subscribers received it (0 is fine).
    pub fn publish(&self, event: WeaveEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Build and publish an event.
    pub fn emit(&self, source: &str, topic: &str, payload: Value) -> usize {
        self.publish(WeaveEvent::new(source, topic, payload))
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WeaveEvent> {
        self.tx.subscribe()
    }

    /// Live subscriber count.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Per-subscriber buffer of the global bus.
pub const DEFAULT_CAPACITY: usize = 1024;

lazy_static::lazy_static! {
    /// Process-wide bus used when no explicit bus is wired in.
    pub static ref GLOBAL_BUS: Arc<EventBus> = Arc::new(EventBus::default());
}

/// Subscribe to the global bus.
#[must_use]
pub fn subscribe() -> broadcast::Receiver<WeaveEvent> {
    GLOBAL_BUS.subscribe()
}

/// Emitting components.
pub mod sources {
    /// The watch session (file-originated deltas, lifecycle).
    pub const SESSION: &str = "session";
    /// User-originated structural edits.
    pub const USER: &str = "user";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_event() {
        let event = WeaveEvent::for_directory(sources::SESSION, topics::WATCH_STARTED, "/vault");
        assert_eq!(event.topic, "watch/started");
        assert_eq!(event.payload["directory"], "/vault");
        assert!(!event.id.is_empty());
        assert!(topics::is_watch_topic(&event.topic));
        assert!(!topics::is_watch_topic(topics::GRAPH_DELTA));
    }

    #[test]
    fn test_payload_as() -> Result<(), serde_json::Error> {
        #[derive(Deserialize)]
        struct Dir {
            directory: String,
        }
        let event = WeaveEvent::for_directory("t", topics::WATCH_STOPPED, "/v");
        assert_eq!(event.payload_as::<Dir>()?.directory, "/v");
        assert!(event.payload_as::<Vec<u8>>().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_fan_out() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let delivered = bus.emit(sources::SESSION, topics::GRAPH_DELTA, json!({"delta": []}));
        assert_eq!(delivered, 2);

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.topic, topics::GRAPH_DELTA);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(0);
        assert_eq!(bus.capacity(), 1);
        assert_eq!(bus.emit("t", topics::WATCH_ERROR, Value::Null), 0);
    }
}
