use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe, returns instance metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let worker = *state.adapter.worker_state().borrow();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "instance": state.adapter.identity().as_str(),
        "prefix": state.config.broker.prefix,
        "worker": worker.as_str(),
        "ws_clients": state.connections.len(),
        "rooms": state.adapter.registry().rooms().len(),
        "emit_failures": state.emit_failure_count(),
        "ts": chrono::Utc::now().to_rfc3339(),
    }))
}
