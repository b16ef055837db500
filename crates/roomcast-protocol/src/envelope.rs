use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, Result};

/// One broadcast event as carried over the broker.
///
/// Wire: `{"Origin":"chat#0190…","Ignore":"c1","Room":"lobby","Message":"","Event":"msg","Args":["hi"]}`
///
/// Key names match the adapters already deployed against the same broker, so
/// a mixed fleet can read each other's envelopes. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Instance identity of the publisher. Empty when the peer does not send one.
    #[serde(rename = "Origin", default)]
    pub origin: String,
    /// Connection excluded on the publishing instance. Informational only:
    /// connection ids mean nothing outside their own instance.
    #[serde(rename = "Ignore", default, deserialize_with = "lenient_id")]
    pub excluded: Option<String>,
    #[serde(rename = "Room")]
    pub room: String,
    /// Reserved; always empty on publish.
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Event")]
    pub event: String,
    #[serde(rename = "Args", default, deserialize_with = "nullable_args")]
    pub args: Vec<Value>,
}

impl Envelope {
    pub fn new(
        origin: impl Into<String>,
        excluded: Option<String>,
        room: impl Into<String>,
        event: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            origin: origin.into(),
            excluded,
            room: room.into(),
            message: String::new(),
            event: event.into(),
            args,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
    }
}

/// Older publishers serialize the whole connection object here; anything
/// that is not a plain string carries no usable identity.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn nullable_args<'de, D>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}
