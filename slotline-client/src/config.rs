//! # Client Configuration
//!
//! Plain structs with sensible defaults; construct with `..Default::default()`
//! and override what you need.

use std::time::Duration;

use slotline_pool::PoolConfig;

/// Default server port.
pub const DEFAULT_PORT: u16 = 6379;

/// Default connect/read/write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default redirection budget for cluster commands.
pub const DEFAULT_MAX_REDIRECTIONS: usize = 5;

/// Default idle connections kept per node pool.
pub const DEFAULT_MAX_IDLE: usize = 8;

/// Per-connection socket settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout; blocking commands lift it temporarily.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Send a PING whenever a pooled connection is validated.
    pub ping_on_validate: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            connect_timeout: Some(DEFAULT_TIMEOUT),
            read_timeout: Some(DEFAULT_TIMEOUT),
            write_timeout: Some(DEFAULT_TIMEOUT),
            ping_on_validate: false,
        }
    }
}

pub(crate) fn default_pool_config() -> PoolConfig {
    PoolConfig {
        max_idle: Some(DEFAULT_MAX_IDLE),
        idle_ttl: None,
    }
}

/// Configuration for the single-node client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:6379".
    pub addr: String,
    pub connection: ConnectionConfig,
    pub pool: PoolConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            connection: ConnectionConfig::default(),
            pool: default_pool_config(),
        }
    }
}

/// Configuration for the cluster client.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Seed nodes tried in order until one answers the topology query.
    pub seeds: Vec<String>,
    /// Attempts allowed per command before giving up.
    pub max_redirections: usize,
    pub connection: ConnectionConfig,
    /// Settings for each per-node pool.
    pub pool: PoolConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            seeds: vec![format!("127.0.0.1:{DEFAULT_PORT}")],
            max_redirections: DEFAULT_MAX_REDIRECTIONS,
            connection: ConnectionConfig::default(),
            pool: default_pool_config(),
        }
    }
}
