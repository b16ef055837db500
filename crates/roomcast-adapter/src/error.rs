use thiserror::Error;

use crate::broker::BrokerError;

/// Errors surfaced to callers of the adapter. Only the publish path can fail;
/// local fan-out never reports an error.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] roomcast_protocol::ProtocolError),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
