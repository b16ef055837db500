//! `roomcast-adapter`: joins room broadcasts across server instances.
//!
//! # Overview
//!
//! Each instance keeps a [`RoomRegistry`] of its own connections. A send is
//! delivered to local members straight away and then published on the broker
//! under this instance's [`InstanceId`](roomcast_core::InstanceId). Every
//! instance runs one [`SubscriberWorker`] with a pattern subscription over the
//! shared prefix; it relays envelopes from peers into its local registry and
//! discards its own.
//!
//! | Piece                | Module        |
//! |----------------------|---------------|
//! | Room membership      | `registry`    |
//! | Local fan-out        | `registry`    |
//! | Remote publish       | `publisher`   |
//! | Relay worker         | `subscriber`  |
//! | Broker seam          | `broker`      |
//! | Join/Leave/Len/Send  | `adapter`     |

pub mod adapter;
pub mod broker;
pub mod connection;
pub mod error;
pub mod publisher;
pub mod registry;
pub mod subscriber;

#[cfg(test)]
mod testing;

pub use adapter::{BroadcastAdapter, RoomcastAdapter};
pub use broker::{BrokerError, BrokerEvent, BrokerPool, BrokerSubscription, MemoryBroker, RedisPool};
pub use connection::{Connection, EmitError};
pub use error::{AdapterError, Result};
pub use publisher::RemotePublisher;
pub use registry::{EmitFailure, RoomRegistry};
pub use subscriber::{Relay, SubscriberWorker, WorkerState};
