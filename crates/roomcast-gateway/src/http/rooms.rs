use axum::{
    extract::{Path, State},
    Json,
};
use roomcast_adapter::BroadcastAdapter;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /rooms lists every room with local members, with its local count.
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Value> {
    let rooms: Vec<Value> = state
        .adapter
        .registry()
        .rooms()
        .into_iter()
        .map(|room| {
            let members = state.adapter.len(&room);
            json!({ "room": room, "members": members })
        })
        .collect();
    Json(json!({ "rooms": rooms }))
}

/// GET /rooms/{room} returns the local member count on this instance only.
pub async fn room_handler(
    Path(room): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<Value> {
    Json(json!({
        "room": room,
        "members": state.adapter.len(&room),
        "instance": state.adapter.identity().as_str(),
    }))
}
