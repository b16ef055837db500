use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::connection::{Connection, EmitError};

/// One connection that refused an event during local fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitFailure {
    pub room: String,
    pub connection_id: String,
    pub event: String,
    pub error: EmitError,
}

/// Observer for emit failures. Fan-out itself stays fire-and-forget.
pub type EmitFailureHook = Arc<dyn Fn(&EmitFailure) + Send + Sync>;

type Members = HashMap<String, Arc<dyn Connection>>;

/// Room name → connections attached to this instance.
///
/// A room exists only while it has members: the last `leave` removes the key.
/// One `RwLock` guards the whole map, so fan-out and counts run concurrently
/// while join/leave are exclusive. Share as `Arc<RoomRegistry>`.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Members>>,
    on_emit_failure: Option<EmitFailureHook>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            on_emit_failure: None,
        }
    }

    /// Registry that reports every failed `emit` to `hook`.
    ///
    /// The hook runs after the read lock is released, so it may call back
    /// into the registry.
    pub fn with_emit_failure_hook(hook: EmitFailureHook) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            on_emit_failure: Some(hook),
        }
    }

    /// Add `conn` to `room`, creating the room if needed. Re-joining replaces
    /// the stored reference under the same id.
    pub fn join(&self, room: &str, conn: Arc<dyn Connection>) {
        let mut rooms = self.rooms.write().expect("room registry poisoned");
        let id = conn.id().to_string();
        rooms.entry(room.to_string()).or_default().insert(id.clone(), conn);
        debug!(room, conn_id = %id, "joined room");
    }

    /// Remove `conn_id` from `room`. Absent room or member is a no-op.
    pub fn leave(&self, room: &str, conn_id: &str) {
        let mut rooms = self.rooms.write().expect("room registry poisoned");
        let Some(members) = rooms.get_mut(room) else {
            return;
        };
        if members.remove(conn_id).is_some() {
            debug!(room, conn_id, "left room");
        }
        if members.is_empty() {
            rooms.remove(room);
        }
    }

    /// Remove `conn_id` from every room it is in. Returns the rooms it left,
    /// sorted by name.
    pub fn leave_all(&self, conn_id: &str) -> Vec<String> {
        let mut rooms = self.rooms.write().expect("room registry poisoned");
        let mut left = Vec::new();
        rooms.retain(|room, members| {
            if members.remove(conn_id).is_some() {
                left.push(room.clone());
            }
            !members.is_empty()
        });
        left.sort();
        left
    }

    /// Number of local connections in `room` (0 when the room is absent).
    pub fn count(&self, room: &str) -> usize {
        let rooms = self.rooms.read().expect("room registry poisoned");
        rooms.get(room).map_or(0, HashMap::len)
    }

    pub fn contains(&self, room: &str, conn_id: &str) -> bool {
        let rooms = self.rooms.read().expect("room registry poisoned");
        rooms.get(room).is_some_and(|m| m.contains_key(conn_id))
    }

    /// Names of all non-empty rooms, sorted for deterministic output.
    pub fn rooms(&self) -> Vec<String> {
        let rooms = self.rooms.read().expect("room registry poisoned");
        let mut names: Vec<String> = rooms.keys().cloned().collect();
        names.sort();
        names
    }

    /// Emit `event` to every member of `room` except `excluded`.
    ///
    /// Per-connection failures never reach the caller; they go to the
    /// failure hook, if any. Returns how many connections accepted the event.
    pub fn broadcast_local(
        &self,
        excluded: Option<&str>,
        room: &str,
        event: &str,
        args: &[Value],
    ) -> usize {
        let mut delivered = 0;
        let mut failures = Vec::new();
        {
            let rooms = self.rooms.read().expect("room registry poisoned");
            let Some(members) = rooms.get(room) else {
                return 0;
            };
            for (id, conn) in members {
                if excluded == Some(id.as_str()) {
                    continue;
                }
                match conn.emit(event, args) {
                    Ok(()) => delivered += 1,
                    Err(error) => {
                        debug!(room, conn_id = %id, event, %error, "emit failed");
                        failures.push(EmitFailure {
                            room: room.to_string(),
                            connection_id: id.clone(),
                            event: event.to_string(),
                            error,
                        });
                    }
                }
            }
        }
        if let Some(hook) = &self.on_emit_failure {
            for failure in &failures {
                hook(failure);
            }
        }
        delivered
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
