use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An envelope could not be serialized (an argument failed to serialize).
    #[error("Envelope encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Malformed or truncated bytes arrived from the broker.
    #[error("Envelope decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
