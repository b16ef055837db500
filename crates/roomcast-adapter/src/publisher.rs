use std::sync::Arc;

use roomcast_core::InstanceId;
use roomcast_protocol::Envelope;
use serde_json::Value;
use tracing::debug;

use crate::broker::BrokerPool;
use crate::error::Result;

/// Publishes envelopes on this instance's own channel.
///
/// One attempt per call; a broker failure goes straight back to the caller.
pub struct RemotePublisher {
    identity: InstanceId,
    pool: Arc<dyn BrokerPool>,
}

impl RemotePublisher {
    pub fn new(identity: InstanceId, pool: Arc<dyn BrokerPool>) -> Self {
        Self { identity, pool }
    }

    pub fn identity(&self) -> &InstanceId {
        &self.identity
    }

    /// Wrap the event in an envelope stamped with this instance's identity and
    /// publish it on the channel named after that identity.
    pub async fn publish(
        &self,
        excluded: Option<&str>,
        room: &str,
        event: &str,
        args: &[Value],
    ) -> Result<()> {
        let envelope = Envelope::new(
            self.identity.as_str(),
            excluded.map(str::to_string),
            room,
            event,
            args.to_vec(),
        );
        let payload = envelope.encode()?;
        self.pool.publish(self.identity.as_str(), &payload).await?;
        debug!(channel = %self.identity, room, event, "envelope published");
        Ok(())
    }
}
