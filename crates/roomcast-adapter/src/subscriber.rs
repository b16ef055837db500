use std::sync::Arc;
use std::time::Duration;

use roomcast_core::InstanceId;
use roomcast_protocol::Envelope;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerEvent, BrokerPool, BrokerSubscription};
use crate::registry::RoomRegistry;

/// Subscriber connection lifecycle.
///
/// `Connecting → Subscribed → Receiving → Disconnected → Connecting …`
/// There is no terminal state besides `Stopped`, reached only on cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Connecting,
    Subscribed,
    Receiving,
    Disconnected,
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Connecting => "connecting",
            WorkerState::Subscribed => "subscribed",
            WorkerState::Receiving => "receiving",
            WorkerState::Disconnected => "disconnected",
            WorkerState::Stopped => "stopped",
        }
    }
}

/// What happened to one message read off the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    /// Fanned out to this many local connections.
    Delivered(usize),
    /// Published by this instance; already delivered locally at send time.
    SelfOrigin,
    /// Not a decodable envelope; dropped.
    Malformed,
}

/// Background relay: pattern-subscribes to every instance channel under the
/// shared prefix and replays peer envelopes into the local registry.
///
/// Broker failures never stop it. After any subscribe or receive failure it
/// closes the connection, waits a fixed delay and starts over.
pub struct SubscriberWorker {
    identity: InstanceId,
    pattern: String,
    pool: Arc<dyn BrokerPool>,
    registry: Arc<RoomRegistry>,
    reconnect_delay: Duration,
    state: watch::Sender<WorkerState>,
}

impl SubscriberWorker {
    pub fn new(
        identity: InstanceId,
        pool: Arc<dyn BrokerPool>,
        registry: Arc<RoomRegistry>,
        reconnect_delay: Duration,
    ) -> Self {
        let pattern = InstanceId::pattern_for(identity.prefix());
        let (state, _) = watch::channel(WorkerState::Connecting);
        Self {
            identity,
            pattern,
            pool,
            registry,
            reconnect_delay,
            state,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Watch the lifecycle state. Valid before and after `spawn`.
    pub fn state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Subscribe → receive until error → close → sleep → repeat, until
    /// `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(instance = %self.identity, pattern = %self.pattern, "subscriber worker started");

        loop {
            self.set_state(WorkerState::Connecting);
            let subscribed = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.pool.psubscribe(&self.pattern) => result,
            };

            match subscribed {
                Ok(mut subscription) => {
                    self.set_state(WorkerState::Subscribed);
                    let cancelled = self.receive(subscription.as_mut(), &cancel).await;
                    subscription.close().await;
                    if cancelled {
                        break;
                    }
                }
                Err(e) => {
                    error!(pattern = %self.pattern, error = %e, "broker subscribe failed");
                }
            }

            self.set_state(WorkerState::Disconnected);
            error!(
                retry_in_ms = self.reconnect_delay.as_millis() as u64,
                "subscription connection lost, retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.set_state(WorkerState::Stopped);
        info!(instance = %self.identity, "subscriber worker stopped");
    }

    /// Read until the connection errors. Returns `true` if cancelled.
    async fn receive(
        &self,
        subscription: &mut dyn BrokerSubscription,
        cancel: &CancellationToken,
    ) -> bool {
        self.set_state(WorkerState::Receiving);
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return true,
                event = subscription.next_event() => event,
            };

            match event {
                BrokerEvent::PatternMessage {
                    pattern,
                    channel,
                    payload,
                } => {
                    let outcome = self.relay(&channel, &payload);
                    debug!(%pattern, %channel, ?outcome, "broker pattern message");
                }
                BrokerEvent::Message { channel, payload } => {
                    debug!(%channel, bytes = payload.len(), "broker message outside pattern, ignored");
                }
                BrokerEvent::Subscription {
                    kind,
                    channel,
                    count,
                } => {
                    debug!(%kind, %channel, count, "broker subscription confirmed");
                }
                BrokerEvent::Error(e) => {
                    error!(error = %e, "broker receive error");
                    return false;
                }
            }
        }
    }

    /// Decode one payload and fan it out locally unless this instance sent it.
    ///
    /// No connection is excluded here: the publisher already skipped its
    /// excluded connection, and connection ids from another instance cannot
    /// match ours.
    pub fn relay(&self, channel: &str, payload: &[u8]) -> Relay {
        let envelope = match Envelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    %channel,
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "dropping undecodable envelope"
                );
                return Relay::Malformed;
            }
        };

        if self.is_self_origin(channel, &envelope) {
            return Relay::SelfOrigin;
        }

        let delivered =
            self.registry
                .broadcast_local(None, &envelope.room, &envelope.event, &envelope.args);
        Relay::Delivered(delivered)
    }

    /// Peers that omit the origin are judged by the channel they published on.
    fn is_self_origin(&self, channel: &str, envelope: &Envelope) -> bool {
        if envelope.origin.is_empty() {
            channel == self.identity.as_str()
        } else {
            envelope.origin == self.identity.as_str()
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use crate::testing::RecordingConn;
    use serde_json::json;
    use tokio::time::{timeout, Instant};

    const DELAY: Duration = Duration::from_millis(500);

    fn worker_with_member(
        prefix: &str,
        broker: &MemoryBroker,
    ) -> (SubscriberWorker, tokio::sync::mpsc::UnboundedReceiver<crate::testing::Received>) {
        let registry = Arc::new(RoomRegistry::new());
        let (conn, rx) = RecordingConn::new("local-1");
        registry.join("lobby", conn);
        let worker = SubscriberWorker::new(
            InstanceId::generate(prefix),
            Arc::new(broker.clone()),
            registry,
            DELAY,
        );
        (worker, rx)
    }

    fn envelope(origin: &str, args: Vec<serde_json::Value>) -> Vec<u8> {
        Envelope::new(origin, None, "lobby", "msg", args).encode().unwrap()
    }

    #[test]
    fn pattern_covers_every_instance_under_prefix() {
        let broker = MemoryBroker::new();
        let (worker, _rx) = worker_with_member("chat", &broker);
        assert_eq!(worker.pattern(), "chat#*");
    }

    #[tokio::test]
    async fn own_envelope_is_not_fanned_out() {
        let broker = MemoryBroker::new();
        let (worker, mut rx) = worker_with_member("t", &broker);
        let own = worker.identity.to_string();

        assert_eq!(worker.relay(&own, &envelope(&own, vec![json!("hi")])), Relay::SelfOrigin);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn peer_envelope_is_fanned_out_with_its_fields() {
        let broker = MemoryBroker::new();
        let (worker, mut rx) = worker_with_member("t", &broker);

        let outcome = worker.relay("t#peer", &envelope("t#peer", vec![json!("hi"), json!(2)]));

        assert_eq!(outcome, Relay::Delivered(1));
        assert_eq!(rx.try_recv().unwrap(), ("msg".to_string(), vec![json!("hi"), json!(2)]));
    }

    // The excluded id belongs to the publishing instance; a local connection
    // with the same id still receives the relayed event.
    #[tokio::test]
    async fn remote_exclusion_does_not_apply_locally() {
        let broker = MemoryBroker::new();
        let (worker, mut rx) = worker_with_member("t", &broker);
        let payload = Envelope::new("t#peer", Some("local-1".into()), "lobby", "msg", vec![])
            .encode()
            .unwrap();

        assert_eq!(worker.relay("t#peer", &payload), Relay::Delivered(1));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn envelope_without_origin_uses_channel() {
        let broker = MemoryBroker::new();
        let (worker, mut rx) = worker_with_member("t", &broker);
        let own = worker.identity.to_string();
        let legacy = br#"{"Ignore":null,"Room":"lobby","Message":"","Event":"msg","Args":[]}"#;

        assert_eq!(worker.relay(&own, legacy), Relay::SelfOrigin);
        assert_eq!(worker.relay("t#peer", legacy), Relay::Delivered(1));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped() {
        let broker = MemoryBroker::new();
        let (worker, mut rx) = worker_with_member("t", &broker);

        assert_eq!(worker.relay("t#peer", b"{\"Room\":"), Relay::Malformed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn receive_loop_survives_malformed_messages() {
        let broker = MemoryBroker::new();
        let (worker, mut rx) = worker_with_member("t", &broker);
        let mut state = worker.state();
        let cancel = CancellationToken::new();
        let handle = worker.spawn(cancel.clone());
        state.wait_for(|s| *s == WorkerState::Receiving).await.unwrap();

        broker.publish("t#peer", b"not json").await.unwrap();
        broker.publish("t#peer", &envelope("t#peer", vec![json!("after")])).await.unwrap();

        let got = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(got.1, vec![json!("after")]);
        assert_eq!(*state.borrow(), WorkerState::Receiving);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn self_published_message_is_suppressed_in_loop() {
        let broker = MemoryBroker::new();
        let (worker, mut rx) = worker_with_member("t", &broker);
        let own = worker.identity.to_string();
        let mut state = worker.state();
        let cancel = CancellationToken::new();
        let handle = worker.spawn(cancel.clone());
        state.wait_for(|s| *s == WorkerState::Receiving).await.unwrap();

        broker.publish(&own, &envelope(&own, vec![json!("mine")])).await.unwrap();
        broker.publish("t#peer", &envelope("t#peer", vec![json!("theirs")])).await.unwrap();

        let got = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(got.1, vec![json!("theirs")]);
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_fixed_delay_without_replay() {
        let broker = MemoryBroker::new();
        let (worker, mut rx) = worker_with_member("t", &broker);
        let mut state = worker.state();
        let cancel = CancellationToken::new();
        let handle = worker.spawn(cancel.clone());
        state.wait_for(|s| *s == WorkerState::Receiving).await.unwrap();

        broker.publish("t#peer", &envelope("t#peer", vec![json!(1)])).await.unwrap();
        let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.1, vec![json!(1)]);

        let severed_at = Instant::now();
        broker.disconnect_all();
        state.wait_for(|s| *s == WorkerState::Disconnected).await.unwrap();
        state.wait_for(|s| *s == WorkerState::Receiving).await.unwrap();

        assert!(severed_at.elapsed() >= DELAY);
        assert_eq!(broker.close_count(), 1);
        assert_eq!(broker.psubscribe_count(), 2);

        broker.publish("t#peer", &envelope("t#peer", vec![json!(2)])).await.unwrap();
        let second = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(second.1, vec![json!(2)]);
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(broker.close_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_retrying_while_broker_is_down() {
        let broker = MemoryBroker::new();
        broker.set_available(false);
        let (worker, _rx) = worker_with_member("t", &broker);
        let mut state = worker.state();
        let cancel = CancellationToken::new();
        let handle = worker.spawn(cancel.clone());

        tokio::time::sleep(DELAY * 5).await;
        assert_eq!(broker.psubscribe_count(), 0);
        assert_ne!(*state.borrow(), WorkerState::Receiving);

        broker.set_available(true);
        state.wait_for(|s| *s == WorkerState::Receiving).await.unwrap();
        assert_eq!(broker.psubscribe_count(), 1);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(broker.close_count(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_worker() {
        let broker = MemoryBroker::new();
        let (worker, _rx) = worker_with_member("t", &broker);
        let mut state = worker.state();
        let cancel = CancellationToken::new();
        let handle = worker.spawn(cancel.clone());
        state.wait_for(|s| *s == WorkerState::Receiving).await.unwrap();

        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(*state.borrow(), WorkerState::Stopped);
        assert_eq!(broker.close_count(), 1);
    }
}
