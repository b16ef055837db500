use roomcast_adapter::{Connection, EmitError};
use roomcast_core::ConnId;
use roomcast_protocol::frames::ServerFrame;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Room member backed by one WebSocket session.
///
/// Emits never block: events are queued as encoded frames and written by the
/// session loop. A full queue drops the event and reports backpressure.
///
/// The session loop stops draining the queue while it awaits a client
/// `send`, including its broker publish. During a slow publish a member of a
/// busy room can therefore hit `Backpressure` on its own queue.
pub struct WsConnection {
    id: ConnId,
    tx: mpsc::Sender<String>,
}

impl WsConnection {
    pub fn new(buffer: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Arc::new(Self {
                id: ConnId::new(),
                tx,
            }),
            rx,
        )
    }
}

impl Connection for WsConnection {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn emit(&self, event: &str, args: &[Value]) -> Result<(), EmitError> {
        let frame = ServerFrame::event(event, args).to_json();
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EmitError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => EmitError::Closed,
        })
    }
}
