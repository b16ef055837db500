use roomcast_adapter::{BroadcastAdapter, Connection};
use roomcast_protocol::frames::{ClientFrame, ServerFrame};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::ws::client::WsConnection;

/// Apply one client frame and return the reply for the sender.
pub async fn handle(conn: &Arc<WsConnection>, text: &str, state: &AppState) -> ServerFrame {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(conn_id = conn.id(), error = %e, "invalid client frame");
            return ServerFrame::error(format!("invalid frame: {e}"));
        }
    };

    match frame {
        ClientFrame::Join { room } => {
            state.adapter.join(&room, Arc::clone(conn) as Arc<dyn Connection>);
            debug!(conn_id = conn.id(), %room, "joined");
            ServerFrame::ack("join", room)
        }
        ClientFrame::Leave { room } => {
            state.adapter.leave(&room, conn.as_ref());
            debug!(conn_id = conn.id(), %room, "left");
            ServerFrame::ack("leave", room)
        }
        ClientFrame::Send {
            room,
            event,
            args,
            include_self,
        } => {
            let excluded = if include_self {
                None
            } else {
                Some(conn.as_ref() as &dyn Connection)
            };
            match state.adapter.send(excluded, &room, &event, &args).await {
                Ok(()) => ServerFrame::ack("send", room),
                // local members were already served; only peers missed it
                Err(e) => {
                    warn!(conn_id = conn.id(), %room, %event, error = %e, "remote publish failed");
                    ServerFrame::error(format!("publish failed: {e}"))
                }
            }
        }
    }
}
