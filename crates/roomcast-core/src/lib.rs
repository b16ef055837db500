pub mod config;
pub mod error;
pub mod types;

pub use config::RoomcastConfig;
pub use error::{Result, RoomcastError};
pub use types::{ConnId, InstanceId};
