use crate::error::{ClientError, Result};
use crate::realtime::{SpawnFeed, Subscription};
use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Redis pub/sub feed. Each region subscription holds its own pub/sub
/// connection; leaving the channel aborts the pump task, which drops the
/// connection and lets the server clean up the subscription.
pub struct RedisFeed {
    client: redis::Client,
    connected: AtomicBool,
}

impl RedisFeed {
    /// Open a client and verify connectivity with a PING before reporting
    /// the transport as usable.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| ClientError::Transport(format!("Failed to create Redis client: {}", e)))?;

        let mut connection = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| ClientError::Transport(format!("Failed to connect to Redis: {}", e)))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| ClientError::Transport(format!("Redis ping failed: {}", e)))?;

        tracing::info!("Redis feed connection established");

        Ok(RedisFeed {
            client,
            connected: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl SpawnFeed for RedisFeed {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|e| {
            self.connected.store(false, Ordering::SeqCst);
            ClientError::Transport(format!("Failed to open pub/sub connection: {}", e))
        })?;

        pubsub.subscribe(channel).await.map_err(|e| {
            ClientError::Transport(format!("Failed to subscribe to {}: {}", channel, e))
        })?;

        self.connected.store(true, Ordering::SeqCst);
        tracing::info!("Subscribed to {}", channel);

        let (tx, rx) = mpsc::unbounded_channel();
        let channel_name = channel.to_string();

        let pump = tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(message) = stream.next().await {
                match message.get_payload::<String>() {
                    Ok(payload) => {
                        if tx.send(payload).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Undecodable payload on {}: {}", channel_name, e);
                    }
                }
            }
        });

        Ok(Subscription::new(channel, rx, move || pump.abort()))
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
