//! Real-time spawn feed boundary.
//!
//! The backend broadcasts `.spawn-cycle.created` events on region-scoped
//! channels (`spawn-cycles.{region}`). This module defines the transport
//! seam ([`SpawnFeed`]), the subscription handle, and the single boundary
//! function that turns a raw payload into a typed event; nothing
//! dynamically-shaped crosses into the synchronizer's merge logic.
//!
//! Two backends ship: redis pub/sub ([`RedisFeed`]) for deployments and an
//! in-process broker ([`MemoryFeed`]) for tests and offline runs.

pub mod memory;
pub mod redis;

use crate::constants::SPAWN_CYCLE_CREATED_EVENT;
use crate::error::{ClientError, Result};
use crate::models::SpawnRecord;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

pub use memory::MemoryFeed;
pub use redis::RedisFeed;

/// Envelope broadcast on spawn channels: event name plus event-specific
/// data.
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    event: String,
    data: serde_json::Value,
}

/// Payload of a `.spawn-cycle.created` event.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SpawnCycleCreated {
    pub spawn: SpawnRecord,
}

/// Parse a raw channel payload into a typed event. All shape validation
/// happens here; downstream code only ever sees [`SpawnRecord`]s. Events
/// other than `.spawn-cycle.created` parse to `None`.
pub fn parse_spawn_event(payload: &str) -> Result<Option<SpawnCycleCreated>> {
    let envelope: EventEnvelope = serde_json::from_str(payload)
        .map_err(|e| ClientError::Parse(format!("spawn channel envelope: {}", e)))?;

    if envelope.event != SPAWN_CYCLE_CREATED_EVENT {
        tracing::debug!("Ignoring unhandled event {}", envelope.event);
        return Ok(None);
    }

    serde_json::from_value(envelope.data)
        .map(Some)
        .map_err(|e| ClientError::Parse(format!("spawn-cycle event: {}", e)))
}

/// A live channel subscription. Payloads arrive on the receiver; `leave()`
/// (or dropping the handle) detaches from the channel immediately.
pub struct Subscription {
    channel: String,
    receiver: Option<mpsc::UnboundedReceiver<String>>,
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        channel: impl Into<String>,
        receiver: mpsc::UnboundedReceiver<String>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Subscription {
            channel: channel.into(),
            receiver: Some(receiver),
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Take ownership of the payload stream. Returns `None` if already
    /// taken.
    pub fn take_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.receiver.take()
    }

    /// Leave the channel. Synchronous: once this returns no further
    /// payloads are delivered.
    pub fn leave(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Transport seam for the region-scoped spawn channels.
#[async_trait]
pub trait SpawnFeed: Send + Sync {
    /// Whether the underlying transport is currently usable. The
    /// synchronizer only binds region subscriptions while connected.
    fn is_connected(&self) -> bool;

    /// Subscribe to a channel by name. At most one subscription per region
    /// is the *caller's* contract; the feed itself allows any number.
    async fn subscribe(&self, channel: &str) -> Result<Subscription>;

    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_created_event() {
        let payload = r#"{
            "event": ".spawn-cycle.created",
            "data": {
                "spawn": {
                    "id": 11,
                    "lat": 48.8566,
                    "lng": 2.3522,
                    "places_address": "Jardin du Luxembourg",
                    "spawned_at": "2025-07-01T10:00:00Z",
                    "expires_at": null,
                    "is_active": true,
                    "active_cycles": []
                }
            }
        }"#;

        let event = parse_spawn_event(payload).unwrap().unwrap();
        assert_eq!(event.spawn.id, 11);
        assert!(event.spawn.is_active);
    }

    #[test]
    fn other_events_are_skipped_not_errors() {
        let payload = r#"{"event": ".spawn-cycle.expired", "data": {}}"#;
        assert!(parse_spawn_event(payload).unwrap().is_none());
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(parse_spawn_event("not json").is_err());
        assert!(parse_spawn_event("{}").is_err());
        // Right event, wrong data shape
        assert!(
            parse_spawn_event(r#"{"event": ".spawn-cycle.created", "data": {"spawn": 5}}"#)
                .is_err()
        );
    }

    #[test]
    fn leave_runs_unsubscribe_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let (_tx, rx) = mpsc::unbounded_channel();
        let sub = Subscription::new("spawn-cycles.europe", rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(sub.channel(), "spawn-cycles.europe");
        sub.leave();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_detaches() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let (_tx, rx) = mpsc::unbounded_channel();
        {
            let _sub = Subscription::new("spawn-cycles.global", rx, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
