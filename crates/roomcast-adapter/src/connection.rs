use serde_json::Value;
use thiserror::Error;

/// A single client attached to this instance (a WebSocket, a test double, …).
///
/// The registry only holds a reference; closing the client and leaving its
/// rooms is the owner's job. `emit` runs while the registry read lock is held,
/// so it must not block: queue the event and return.
pub trait Connection: Send + Sync {
    /// Identity unique within this instance.
    fn id(&self) -> &str;

    /// Deliver `event` with `args` to the client.
    fn emit(&self, event: &str, args: &[Value]) -> Result<(), EmitError>;
}

/// Why a single connection could not take an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    /// The client side has gone away.
    #[error("Connection closed")]
    Closed,

    /// The client is not draining its queue fast enough.
    #[error("Outbound queue full")]
    Backpressure,

    #[error("Emit failed: {0}")]
    Other(String),
}
