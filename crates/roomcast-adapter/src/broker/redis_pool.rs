use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Msg};
use roomcast_core::config::BrokerConfig;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{BrokerError, BrokerEvent, BrokerPool, BrokerSubscription};

/// Redis-backed broker.
///
/// Publishes share one multiplexed connection, re-dialled lazily after a
/// failure. Each subscription gets its own pub/sub connection.
pub struct RedisPool {
    client: Client,
    publisher: Mutex<PublisherSlot>,
}

/// Cached publish connection, tagged with the dial that produced it so a
/// failed publish only evicts the connection it actually used.
#[derive(Default)]
struct PublisherSlot {
    dials: u64,
    conn: Option<(u64, MultiplexedConnection)>,
}

impl RedisPool {
    /// Validate `url` (`redis://host:port/`). No connection is made yet.
    pub fn open(url: &str) -> Result<Self, BrokerError> {
        let client = Client::open(url).map_err(|e| BrokerError::Connection(e.to_string()))?;
        info!(url, "redis broker configured");
        Ok(Self {
            client,
            publisher: Mutex::new(PublisherSlot::default()),
        })
    }

    pub fn from_config(config: &BrokerConfig) -> Result<Self, BrokerError> {
        Self::open(&config.redis_url())
    }

    async fn publisher(&self) -> Result<(u64, MultiplexedConnection), BrokerError> {
        let mut slot = self.publisher.lock().await;
        if let Some((dial, conn)) = slot.conn.as_ref() {
            return Ok((*dial, conn.clone()));
        }
        slot.dials += 1;
        let dial = slot.dials;
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        slot.conn = Some((dial, conn.clone()));
        Ok((dial, conn))
    }

    /// Drop the cached connection if it is still the one from `dial`.
    async fn evict(&self, dial: u64) {
        let mut slot = self.publisher.lock().await;
        if matches!(slot.conn, Some((current, _)) if current == dial) {
            slot.conn = None;
        }
    }
}

#[async_trait]
impl BrokerPool for RedisPool {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let (dial, mut conn) = self.publisher().await?;
        match conn.publish::<_, _, i64>(channel, payload).await {
            Ok(receivers) => {
                debug!(channel, receivers, bytes = payload.len(), "published");
                Ok(())
            }
            Err(e) => {
                warn!(channel, error = %e, "publish failed, dropping publisher connection");
                self.evict(dial).await;
                Err(BrokerError::Publish(e.to_string()))
            }
        }
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Box<dyn BrokerSubscription>, BrokerError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        pubsub
            .psubscribe(pattern)
            .await
            .map_err(|e| BrokerError::Subscribe(e.to_string()))?;

        Ok(Box::new(RedisSubscription {
            pattern: pattern.to_string(),
            messages: Box::pin(pubsub.into_on_message()),
            confirmed: false,
        }))
    }
}

struct RedisSubscription {
    pattern: String,
    messages: Pin<Box<dyn Stream<Item = Msg> + Send>>,
    confirmed: bool,
}

#[async_trait]
impl BrokerSubscription for RedisSubscription {
    async fn next_event(&mut self) -> BrokerEvent {
        // PSUBSCRIBE replies are consumed by the client; surface one
        // confirmation so the reader sees the same sequence as the wire.
        if !self.confirmed {
            self.confirmed = true;
            return BrokerEvent::Subscription {
                kind: "psubscribe".to_string(),
                channel: self.pattern.clone(),
                count: 1,
            };
        }

        let Some(msg) = self.messages.next().await else {
            return BrokerEvent::Error(BrokerError::Disconnected);
        };
        let channel = msg.get_channel_name().to_string();
        let payload = msg.get_payload_bytes().to_vec();
        if msg.from_pattern() {
            let pattern = msg
                .get_pattern::<String>()
                .unwrap_or_else(|_| self.pattern.clone());
            BrokerEvent::PatternMessage {
                pattern,
                channel,
                payload,
            }
        } else {
            BrokerEvent::Message { channel, payload }
        }
    }

    async fn close(&mut self) {
        debug!(pattern = %self.pattern, "closing redis subscription");
    }
}
