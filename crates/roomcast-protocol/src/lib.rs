//! Wire formats: the broker envelope shared between instances and the
//! frames exchanged with WebSocket clients.

pub mod envelope;
pub mod error;
pub mod frames;

pub use envelope::Envelope;
pub use error::{ProtocolError, Result};
