use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::{glob_match, BrokerError, BrokerEvent, BrokerPool, BrokerSubscription};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Published {
    channel: String,
    payload: Vec<u8>,
}

/// In-process broker for single-node deployments and tests.
///
/// Cloning shares the same bus, so several adapters can cooperate through one
/// `MemoryBroker`. Subscribers only see messages published after they
/// subscribed. Slow subscribers lose the oldest messages.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

struct Inner {
    bus: broadcast::Sender<Published>,
    /// Bumped to sever every live subscription.
    generation: watch::Sender<u64>,
    available: AtomicBool,
    psubscribes: AtomicUsize,
    publishes: AtomicUsize,
    closes: AtomicUsize,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (bus, _) = broadcast::channel(capacity);
        let (generation, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                bus,
                generation,
                available: AtomicBool::new(true),
                psubscribes: AtomicUsize::new(0),
                publishes: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            }),
        }
    }

    /// Break every open subscription, as if the broker dropped its clients.
    pub fn disconnect_all(&self) {
        self.inner.generation.send_modify(|g| *g += 1);
        warn!("memory broker: all subscriptions severed");
    }

    /// While unavailable, publish and psubscribe fail.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Successful pattern subscriptions so far.
    pub fn psubscribe_count(&self) -> usize {
        self.inner.psubscribes.load(Ordering::SeqCst)
    }

    /// Successful publishes so far.
    pub fn publish_count(&self) -> usize {
        self.inner.publishes.load(Ordering::SeqCst)
    }

    /// Subscriptions released through `close()`.
    pub fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerPool for MemoryBroker {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.is_available() {
            return Err(BrokerError::Publish("broker unavailable".to_string()));
        }
        // No live subscribers is not an error; the message is simply lost.
        let receivers = self
            .inner
            .bus
            .send(Published {
                channel: channel.to_string(),
                payload: payload.to_vec(),
            })
            .unwrap_or(0);
        self.inner.publishes.fetch_add(1, Ordering::SeqCst);
        debug!(channel, receivers, "memory broker: published");
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Box<dyn BrokerSubscription>, BrokerError> {
        if !self.is_available() {
            return Err(BrokerError::Connection("broker unavailable".to_string()));
        }
        self.inner.psubscribes.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySubscription {
            broker: Arc::clone(&self.inner),
            pattern: pattern.to_string(),
            messages: self.inner.bus.subscribe(),
            severed: self.inner.generation.subscribe(),
            confirmed: false,
        }))
    }
}

struct MemorySubscription {
    broker: Arc<Inner>,
    pattern: String,
    messages: broadcast::Receiver<Published>,
    severed: watch::Receiver<u64>,
    confirmed: bool,
}

#[async_trait]
impl BrokerSubscription for MemorySubscription {
    async fn next_event(&mut self) -> BrokerEvent {
        if !self.confirmed {
            self.confirmed = true;
            return BrokerEvent::Subscription {
                kind: "psubscribe".to_string(),
                channel: self.pattern.clone(),
                count: 1,
            };
        }

        loop {
            tokio::select! {
                biased;

                _ = self.severed.changed() => {
                    return BrokerEvent::Error(BrokerError::Disconnected);
                }

                received = self.messages.recv() => match received {
                    Ok(msg) if glob_match(&self.pattern, &msg.channel) => {
                        return BrokerEvent::PatternMessage {
                            pattern: self.pattern.clone(),
                            channel: msg.channel,
                            payload: msg.payload,
                        };
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(pattern = %self.pattern, skipped, "memory broker: subscriber lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return BrokerEvent::Error(BrokerError::Disconnected);
                    }
                },
            }
        }
    }

    async fn close(&mut self) {
        self.broker.closes.fetch_add(1, Ordering::SeqCst);
        debug!(pattern = %self.pattern, "memory broker: subscription closed");
    }
}
