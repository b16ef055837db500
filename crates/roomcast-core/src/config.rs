use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BROKER_HOST: &str = "127.0.0.1";
pub const DEFAULT_BROKER_PORT: u16 = 6379;
pub const DEFAULT_PREFIX: &str = "redis_socket_io";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 500;
pub const DEFAULT_GATEWAY_PORT: u16 = 8090;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;
pub const DEFAULT_LOG_FILTER: &str = "roomcast_gateway=info,roomcast_adapter=info";

/// Top-level config (roomcast.toml + ROOMCAST_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomcastConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Pub/sub broker connection and channel naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// Channel-name prefix. Instances only relay to peers sharing it.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Fixed pause between subscriber reconnect attempts.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            prefix: default_prefix(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl BrokerConfig {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }

    pub fn reconnect_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Per-connection outbound queue depth; a full queue drops the event.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_gateway_port(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when RUST_LOG is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_broker_host() -> String {
    DEFAULT_BROKER_HOST.to_string()
}
fn default_broker_port() -> u16 {
    DEFAULT_BROKER_PORT
}
fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}
fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_gateway_port() -> u16 {
    DEFAULT_GATEWAY_PORT
}
fn default_outbound_buffer() -> usize {
    DEFAULT_OUTBOUND_BUFFER
}
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl RoomcastConfig {
    /// Load config from a TOML file with ROOMCAST_* env var overrides.
    ///
    /// Nested keys use a double underscore: `ROOMCAST_BROKER__HOST=redis`.
    /// A missing file is not an error; every key has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or("roomcast.toml");
        Self::figment(Toml::file(path))
            .merge(Env::prefixed("ROOMCAST_").split("__"))
            .extract()
            .map_err(|e| crate::error::RoomcastError::Config(e.to_string()))
    }

    /// Parse config from an in-memory TOML document (no env overrides).
    pub fn from_toml_str(toml: &str) -> crate::error::Result<Self> {
        Self::figment(Toml::string(toml))
            .extract()
            .map_err(|e| crate::error::RoomcastError::Config(e.to_string()))
    }

    fn figment(source: impl figment::Provider) -> Figment {
        Figment::from(Serialized::defaults(RoomcastConfig::default())).merge(source)
    }
}
