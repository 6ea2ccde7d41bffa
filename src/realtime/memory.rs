use crate::error::Result;
use crate::realtime::{SpawnFeed, Subscription};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};

/// Per-channel fan-out capacity. Slow subscribers past this lag drop
/// messages, which is acceptable for the eventual-consistency merge model.
const CHANNEL_CAPACITY: usize = 256;

/// In-process feed backed by broadcast channels. The offline twin of
/// [`RedisFeed`](crate::realtime::RedisFeed): tests publish directly into
/// it, and the probe binary falls back to it when no transport is
/// configured.
pub struct MemoryFeed {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    connected: AtomicBool,
}

impl MemoryFeed {
    pub fn new() -> Self {
        MemoryFeed {
            channels: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
        }
    }

    /// A feed that reports the transport as down; subscriptions still
    /// succeed once `set_connected(true)` flips it back.
    pub fn disconnected() -> Self {
        let feed = MemoryFeed::new();
        feed.connected.store(false, Ordering::SeqCst);
        feed
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Publish a payload on a channel. Returns the number of live
    /// subscribers that received it.
    pub fn publish(&self, channel: &str, payload: &str) -> usize {
        let senders = self.channels.lock().expect("feed channel table poisoned");
        match senders.get(channel) {
            Some(sender) => sender.send(payload.to_string()).unwrap_or(0),
            None => 0,
        }
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<String> {
        let mut senders = self.channels.lock().expect("feed channel table poisoned");
        senders
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for MemoryFeed {
    fn default() -> Self {
        MemoryFeed::new()
    }
}

#[async_trait]
impl SpawnFeed for MemoryFeed {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let mut broadcast_rx = self.sender_for(channel).subscribe();
        let (tx, rx) = mpsc::unbounded_channel();

        let forward = tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(payload) => {
                        if tx.send(payload).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Memory feed subscriber lagged, skipped {}", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        tracing::debug!("Memory feed subscribed to {}", channel);
        Ok(Subscription::new(channel, rx, move || forward.abort()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let feed = MemoryFeed::new();
        let mut sub = feed.subscribe("spawn-cycles.europe").await.unwrap();
        let mut rx = sub.take_receiver().unwrap();

        assert_eq!(feed.publish("spawn-cycles.europe", "hello"), 1);
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let feed = MemoryFeed::new();
        let mut europe = feed.subscribe("spawn-cycles.europe").await.unwrap();
        let mut oceania = feed.subscribe("spawn-cycles.oceania").await.unwrap();
        let mut europe_rx = europe.take_receiver().unwrap();
        let mut oceania_rx = oceania.take_receiver().unwrap();

        feed.publish("spawn-cycles.europe", "eu-only");

        assert_eq!(europe_rx.recv().await.unwrap(), "eu-only");
        assert!(oceania_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let feed = MemoryFeed::new();
        assert_eq!(feed.publish("spawn-cycles.global", "nobody"), 0);
    }

    #[tokio::test]
    async fn leave_stops_delivery() {
        let feed = MemoryFeed::new();
        let mut sub = feed.subscribe("spawn-cycles.europe").await.unwrap();
        let mut rx = sub.take_receiver().unwrap();
        sub.leave();

        // Give the forwarding task time to die, then publish
        tokio::task::yield_now().await;
        feed.publish("spawn-cycles.europe", "late");

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn connected_flag() {
        let feed = MemoryFeed::disconnected();
        assert!(!feed.is_connected());
        feed.set_connected(true);
        assert!(feed.is_connected());
        assert_eq!(feed.backend_name(), "memory");
    }
}
