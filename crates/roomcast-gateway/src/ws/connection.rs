use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use roomcast_adapter::Connection;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::ws::{client::WsConnection, message};

/// Largest client frame accepted before the session is dropped.
const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Axum handler that upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_connection(socket, state))
}

/// Per-connection event loop that lives for the entire WS session.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let (conn, mut outbound) = WsConnection::new(state.config.gateway.outbound_buffer);
    let conn_id = conn.id().to_string();
    state.connections.insert(conn_id.clone(), Arc::clone(&conn));
    info!(conn_id = %conn_id, "new WS connection");

    let (mut tx, mut rx) = socket.split();

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.as_str().len() > MAX_FRAME_BYTES {
                            warn!(conn_id, size = text.as_str().len(), "payload too large");
                            break;
                        }
                        let reply = message::handle(&conn, text.as_str(), &state).await;
                        if tx.send(Message::Text(reply.to_json().into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(conn_id, error = %e, "WS receive error");
                        break;
                    }
                    _ => {}
                }
            }

            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if tx.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let rooms = state.adapter.registry().leave_all(&conn_id);
    state.connections.remove(&conn_id);
    info!(conn_id, rooms = rooms.len(), "WS connection closed");
}
