use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Separator between the channel prefix and the per-process token.
pub const CHANNEL_SEPARATOR: char = '#';

/// Identity of one cooperating process: `<prefix>#<token>`.
///
/// The token is a UUIDv7, so identities sort by start time and stay readable
/// in broker monitors and logs. The same string is this instance's publish
/// channel and the origin marker stamped on every envelope it publishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generate a fresh identity under `prefix`. Call once at startup.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}{}{}", prefix, CHANNEL_SEPARATOR, Uuid::now_v7()))
    }

    /// The broker pattern matching every instance that shares `prefix`.
    pub fn pattern_for(prefix: &str) -> String {
        format!("{}{}*", prefix, CHANNEL_SEPARATOR)
    }

    /// Prefix part of the identity (everything before the last separator).
    pub fn prefix(&self) -> &str {
        self.0
            .rsplit_once(CHANNEL_SEPARATOR)
            .map(|(prefix, _)| prefix)
            .unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-connection identifier (random UUID, only meaningful inside one instance).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(pub String);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
