//! Publish/subscribe broker seam.
//!
//! The adapter never holds a broker connection of its own: publishing borrows
//! one per call, and the subscriber worker owns exactly one
//! [`BrokerSubscription`] at a time, closing it before reconnecting.

use async_trait::async_trait;
use thiserror::Error;

mod memory;
mod redis_pool;

pub use memory::MemoryBroker;
pub use redis_pool::RedisPool;

/// Connection-level broker failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("Broker connection failed: {0}")]
    Connection(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Broker connection lost")]
    Disconnected,
}

/// One item read from a subscription connection.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    /// Delivery on an exact-channel subscription.
    Message { channel: String, payload: Vec<u8> },
    /// Delivery through a pattern subscription.
    PatternMessage {
        pattern: String,
        channel: String,
        payload: Vec<u8>,
    },
    /// Subscribe confirmation; informational.
    Subscription {
        kind: String,
        channel: String,
        count: usize,
    },
    /// The connection is no longer usable; the reader must stop.
    Error(BrokerError),
}

/// Source of broker connections. Implementations must be safe to share
/// between the subscriber worker and any number of publishing callers.
#[async_trait]
pub trait BrokerPool: Send + Sync {
    /// Publish `payload` on `channel` using a pooled connection.
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Open a dedicated connection subscribed to `pattern`.
    async fn psubscribe(&self, pattern: &str) -> Result<Box<dyn BrokerSubscription>, BrokerError>;
}

/// A dedicated subscription connection.
#[async_trait]
pub trait BrokerSubscription: Send {
    /// Wait for the next event. After an [`BrokerEvent::Error`] the
    /// subscription is dead and should be closed.
    async fn next_event(&mut self) -> BrokerEvent;

    /// Release the underlying connection. The subscription must not be
    /// read again afterwards.
    async fn close(&mut self);
}

/// Redis-style glob match supporting `*` (any run) and `?` (any one char).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
