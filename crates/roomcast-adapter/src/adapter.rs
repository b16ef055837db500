use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use roomcast_core::config::BrokerConfig;
use roomcast_core::InstanceId;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::{BrokerPool, RedisPool};
use crate::connection::Connection;
use crate::error::Result;
use crate::publisher::RemotePublisher;
use crate::registry::RoomRegistry;
use crate::subscriber::{SubscriberWorker, WorkerState};

/// Room broadcast contract offered to the hosting real-time server.
#[async_trait]
pub trait BroadcastAdapter: Send + Sync {
    fn join(&self, room: &str, conn: Arc<dyn Connection>);

    fn leave(&self, room: &str, conn: &dyn Connection);

    /// Local members of `room` on this instance.
    fn len(&self, room: &str) -> usize;

    /// Deliver to every member of `room` on every instance, except
    /// `excluded` on this one. Only a broker publish failure is reported.
    async fn send(
        &self,
        excluded: Option<&dyn Connection>,
        room: &str,
        event: &str,
        args: &[Value],
    ) -> Result<()>;
}

/// Broker-backed [`BroadcastAdapter`].
///
/// Owns the instance identity and the subscriber worker. The worker runs
/// until [`shutdown`](Self::shutdown) or until the adapter is dropped.
pub struct RoomcastAdapter {
    identity: InstanceId,
    registry: Arc<RoomRegistry>,
    publisher: RemotePublisher,
    worker_state: watch::Receiver<WorkerState>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RoomcastAdapter {
    /// Generate this instance's identity and spawn its subscriber worker.
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: &BrokerConfig,
        pool: Arc<dyn BrokerPool>,
        registry: Arc<RoomRegistry>,
    ) -> Self {
        let identity = InstanceId::generate(&config.prefix);
        info!(
            instance = %identity,
            prefix = %config.prefix,
            reconnect_delay_ms = config.reconnect_delay_ms,
            "starting broadcast adapter"
        );

        let worker = SubscriberWorker::new(
            identity.clone(),
            Arc::clone(&pool),
            Arc::clone(&registry),
            config.reconnect_delay(),
        );
        let worker_state = worker.state();
        let cancel = CancellationToken::new();
        let handle = worker.spawn(cancel.clone());

        Self {
            publisher: RemotePublisher::new(identity.clone(), pool),
            identity,
            registry,
            worker_state,
            cancel,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// [`start`](Self::start) against the Redis server named in `config`.
    pub fn connect_redis(config: &BrokerConfig, registry: Arc<RoomRegistry>) -> Result<Self> {
        let pool = RedisPool::from_config(config)?;
        Ok(Self::start(config, Arc::new(pool), registry))
    }

    pub fn identity(&self) -> &InstanceId {
        &self.identity
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn worker_state(&self) -> watch::Receiver<WorkerState> {
        self.worker_state.clone()
    }

    /// Stop the subscriber worker and wait for it to exit. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.worker.lock().expect("worker handle poisoned").take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "subscriber worker ended abnormally");
            }
        }
        info!(instance = %self.identity, "broadcast adapter stopped");
    }
}

impl Drop for RoomcastAdapter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl BroadcastAdapter for RoomcastAdapter {
    fn join(&self, room: &str, conn: Arc<dyn Connection>) {
        self.registry.join(room, conn);
    }

    fn leave(&self, room: &str, conn: &dyn Connection) {
        self.registry.leave(room, conn.id());
    }

    fn len(&self, room: &str) -> usize {
        self.registry.count(room)
    }

    async fn send(
        &self,
        excluded: Option<&dyn Connection>,
        room: &str,
        event: &str,
        args: &[Value],
    ) -> Result<()> {
        let excluded = excluded.map(|conn| conn.id());
        let delivered = self.registry.broadcast_local(excluded, room, event, args);
        debug!(room, event, delivered, "local fan-out");
        self.publisher.publish(excluded, room, event, args).await
    }
}
