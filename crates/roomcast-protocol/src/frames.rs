use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client → Server frame.
/// Wire: `{ "type": "send", "room": "lobby", "event": "msg", "args": ["hi"] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Join {
        room: String,
    },
    Leave {
        room: String,
    },
    Send {
        room: String,
        event: String,
        #[serde(default)]
        args: Vec<Value>,
        /// Deliver to the sender too. Defaults to excluding it.
        #[serde(default)]
        include_self: bool,
    },
}

/// Server → Client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A room event delivered to this connection.
    /// Wire: `{ "type": "event", "event": "msg", "args": ["hi"] }`
    Event { event: String, args: Vec<Value> },
    /// Confirms a join/leave/send.
    Ack { op: String, room: String },
    Error { message: String },
}

impl ServerFrame {
    pub fn event(event: impl Into<String>, args: &[Value]) -> Self {
        ServerFrame::Event {
            event: event.into(),
            args: args.to_vec(),
        }
    }

    pub fn ack(op: &str, room: impl Into<String>) -> Self {
        ServerFrame::Ack {
            op: op.to_string(),
            room: room.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
