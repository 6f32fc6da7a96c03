//! # Slotline Client
//!
//! Purpose: Provide a synchronous client for single servers and sharded
//! clusters, built on pooled connections and slot-based routing.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse TCP connections per node to avoid
//!    repeated connects.
//! 2. **Slot Routing**: Keys are hashed to one of 16384 slots and sent to the
//!    node that owns the slot.
//! 3. **Bounded Recovery**: Redirects and node failures are retried within a
//!    fixed budget, never indefinitely.
//! 4. **Minimal Allocation**: Reuse buffers for RESP framing and parsing.

mod client;
mod cluster;
mod commands;
mod config;
mod connection;
mod error;
mod factory;

pub use client::Client;
pub use cluster::{ClusterClient, ClusterCommand, ClusterInfoCache, ConnectionHandler};
pub use config::{
    ClientConfig, ClusterConfig, ConnectionConfig, DEFAULT_MAX_IDLE, DEFAULT_MAX_REDIRECTIONS,
    DEFAULT_PORT, DEFAULT_TIMEOUT,
};
pub use connection::{Connection, ShutdownHandle};
pub use error::{ClientError, ClientResult};
pub use factory::{connection_pool, ConnectionFactory, ConnectionPool, PooledConnection};

pub use slotline_common::{NodeAddress, Redirect, RedirectKind, Reply};
pub use slotline_pool::{PoolConfig, PoolError};
