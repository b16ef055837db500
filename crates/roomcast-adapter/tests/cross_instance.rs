// Several adapters sharing one broker behave as one broadcast domain.

use std::sync::Arc;
use std::time::Duration;

use roomcast_adapter::{
    BroadcastAdapter, Connection, EmitError, MemoryBroker, RoomRegistry, RoomcastAdapter,
    WorkerState,
};
use roomcast_core::config::BrokerConfig;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

type Received = (String, Vec<Value>);

struct Client {
    id: String,
    tx: mpsc::UnboundedSender<Received>,
}

impl Connection for Client {
    fn id(&self) -> &str {
        &self.id
    }

    fn emit(&self, event: &str, args: &[Value]) -> Result<(), EmitError> {
        self.tx
            .send((event.to_string(), args.to_vec()))
            .map_err(|_| EmitError::Closed)
    }
}

fn client(id: &str) -> (Arc<Client>, mpsc::UnboundedReceiver<Received>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Client { id: id.to_string(), tx }), rx)
}

async fn instance(broker: &MemoryBroker, prefix: &str) -> RoomcastAdapter {
    let config = BrokerConfig {
        prefix: prefix.to_string(),
        reconnect_delay_ms: 50,
        ..BrokerConfig::default()
    };
    let adapter =
        RoomcastAdapter::start(&config, Arc::new(broker.clone()), Arc::new(RoomRegistry::new()));
    adapter
        .worker_state()
        .wait_for(|s| *s == WorkerState::Receiving)
        .await
        .unwrap();
    adapter
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Received>) -> Received {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("connection channel closed")
}

#[tokio::test]
async fn send_reaches_members_on_other_instance() {
    let broker = MemoryBroker::new();
    let a = instance(&broker, "app").await;
    let b = instance(&broker, "app").await;
    let (remote, mut remote_rx) = client("r1");
    b.join("lobby", remote);

    a.send(None, "lobby", "msg", &[json!("hi")]).await.unwrap();

    assert_eq!(next(&mut remote_rx).await, ("msg".to_string(), vec![json!("hi")]));
    a.shutdown().await;
    b.shutdown().await;
}

// The sender's own instance delivers once, locally, and drops the copy that
// comes back through its own pattern subscription.
#[tokio::test]
async fn no_duplicate_delivery_on_origin_instance() {
    let broker = MemoryBroker::new();
    let a = instance(&broker, "app").await;
    let b = instance(&broker, "app").await;
    let (local, mut local_rx) = client("l1");
    a.join("lobby", local);

    a.send(None, "lobby", "first", &[]).await.unwrap();
    assert_eq!(next(&mut local_rx).await.0, "first");

    // Messages from one publisher arrive in order, so once B's message has
    // been relayed A's own echo has already been seen and discarded.
    b.send(None, "lobby", "second", &[]).await.unwrap();
    assert_eq!(next(&mut local_rx).await.0, "second");
    assert!(local_rx.try_recv().is_err());

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn excluded_connection_only_skipped_on_sender_instance() {
    let broker = MemoryBroker::new();
    let a = instance(&broker, "app").await;
    let b = instance(&broker, "app").await;
    let (sender, mut sender_rx) = client("same-id");
    let (peer, mut peer_rx) = client("peer");
    let (twin, mut twin_rx) = client("same-id");
    a.join("lobby", sender.clone());
    a.join("lobby", peer);
    b.join("lobby", twin);

    a.send(Some(&*sender as &dyn Connection), "lobby", "msg", &[json!("hi")])
        .await
        .unwrap();

    assert_eq!(next(&mut peer_rx).await.0, "msg");
    assert_eq!(next(&mut twin_rx).await.0, "msg");
    assert!(sender_rx.try_recv().is_err());

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn different_prefixes_are_isolated() {
    let broker = MemoryBroker::new();
    let tenant_a = instance(&broker, "tenant-a").await;
    let tenant_b = instance(&broker, "tenant-b").await;
    let tenant_b2 = instance(&broker, "tenant-b").await;
    let (outsider, mut outsider_rx) = client("o1");
    let (insider, mut insider_rx) = client("i1");
    tenant_b.join("lobby", outsider);
    tenant_b2.join("lobby", insider);

    tenant_a.send(None, "lobby", "leak", &[]).await.unwrap();
    tenant_b.send(None, "lobby", "ok", &[]).await.unwrap();

    // tenant-b2 relays in publish order, so a leaked message would come first.
    assert_eq!(next(&mut outsider_rx).await.0, "ok");
    assert_eq!(next(&mut insider_rx).await.0, "ok");
    assert!(outsider_rx.try_recv().is_err());
    assert!(insider_rx.try_recv().is_err());

    tenant_a.shutdown().await;
    tenant_b.shutdown().await;
    tenant_b2.shutdown().await;
}

#[tokio::test]
async fn relay_resumes_after_broker_disconnect() {
    let broker = MemoryBroker::new();
    let a = instance(&broker, "app").await;
    let b = instance(&broker, "app").await;
    let (remote, mut remote_rx) = client("r1");
    b.join("lobby", remote);
    let mut state = b.worker_state();

    broker.disconnect_all();
    state.wait_for(|s| *s == WorkerState::Disconnected).await.unwrap();
    state.wait_for(|s| *s == WorkerState::Receiving).await.unwrap();

    a.send(None, "lobby", "after", &[]).await.unwrap();
    assert_eq!(next(&mut remote_rx).await.0, "after");

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn leave_on_one_instance_does_not_touch_another() {
    let broker = MemoryBroker::new();
    let a = instance(&broker, "app").await;
    let b = instance(&broker, "app").await;
    let (x, _x_rx) = client("x");
    let (y, _y_rx) = client("x");
    a.join("lobby", x.clone());
    b.join("lobby", y);

    a.leave("lobby", &*x);

    assert_eq!(a.len("lobby"), 0);
    assert_eq!(b.len("lobby"), 1);
    a.shutdown().await;
    b.shutdown().await;
}
