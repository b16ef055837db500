use axum::{routing::get, Router};
use dashmap::DashMap;
use roomcast_adapter::RoomcastAdapter;
use roomcast_core::config::RoomcastConfig;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::ws::client::WsConnection;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: RoomcastConfig,
    pub adapter: RoomcastAdapter,
    /// Active WS connections: conn_id -> connection handle.
    pub connections: DashMap<String, Arc<WsConnection>>,
    /// Local emits that failed (closed or backed-up connections).
    pub emit_failures: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(
        config: RoomcastConfig,
        adapter: RoomcastAdapter,
        emit_failures: Arc<AtomicU64>,
    ) -> Self {
        Self {
            config,
            adapter,
            connections: DashMap::new(),
            emit_failures,
        }
    }

    pub fn emit_failure_count(&self) -> u64 {
        self.emit_failures.load(Ordering::Relaxed)
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/rooms", get(crate::http::rooms::list_rooms))
        .route("/rooms/{room}", get(crate::http::rooms::room_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
