//! Connection doubles shared by the unit tests.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::connection::{Connection, EmitError};

pub type Received = (String, Vec<Value>);

/// Forwards every emitted event to an unbounded channel.
pub struct RecordingConn {
    id: String,
    tx: mpsc::UnboundedSender<Received>,
}

impl RecordingConn {
    pub fn new(id: &str) -> (Arc<Self>, mpsc::UnboundedReceiver<Received>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { id: id.to_string(), tx }), rx)
    }
}

impl Connection for RecordingConn {
    fn id(&self) -> &str {
        &self.id
    }

    fn emit(&self, event: &str, args: &[Value]) -> Result<(), EmitError> {
        self.tx
            .send((event.to_string(), args.to_vec()))
            .map_err(|_| EmitError::Closed)
    }
}

/// Rejects every event.
pub struct FailingConn {
    id: String,
}

impl FailingConn {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl Connection for FailingConn {
    fn id(&self) -> &str {
        &self.id
    }

    fn emit(&self, _event: &str, _args: &[Value]) -> Result<(), EmitError> {
        Err(EmitError::Closed)
    }
}
