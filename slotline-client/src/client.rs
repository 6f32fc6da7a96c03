//! # Single-Node Client
//!
//! Purpose: Expose a compact, blocking API for issuing commands to one server
//! over a pool of connections.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Client` hides pooling and protocol details.
//! 2. **Borrow-Friendly API**: Accept `&[u8]` to avoid unnecessary copies.
//! 3. **Fail Fast**: Protocol violations surface immediately as errors.
//! 4. **No Poisoned Reuse**: A connection that failed at the transport level
//!    is invalidated instead of returned.

use std::time::Duration;

use slotline_common::{NodeAddress, Reply};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::factory::{connection_pool, flag_if_broken, ConnectionPool};

/// Synchronous client with connection pooling.
///
/// Each call borrows a connection, executes one command, and hands the
/// connection back to the pool.
#[derive(Debug, Clone)]
pub struct Client {
    node: NodeAddress,
    pool: ConnectionPool,
}

impl Client {
    /// Creates a client with default configuration.
    pub fn connect(addr: impl Into<String>) -> ClientResult<Self> {
        let config = ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        };
        Self::with_config(config)
    }

    /// Creates a client with a custom configuration.
    ///
    /// No connection is opened until the first command.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        let node: NodeAddress = config
            .addr
            .parse()
            .map_err(|_| ClientError::InvalidAddress(config.addr.clone()))?;
        let pool = connection_pool(node.clone(), config.connection, config.pool);
        Ok(Client { node, pool })
    }

    pub fn node(&self) -> &NodeAddress {
        &self.node
    }

    /// The underlying pool, for inspection.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Runs `work` on a pooled connection.
    ///
    /// The connection goes back to the pool afterwards unless it broke.
    pub fn run<T, F>(&self, work: F) -> ClientResult<T>
    where
        F: FnOnce(&mut Connection) -> ClientResult<T>,
    {
        let mut conn = self.pool.get()?;
        let result = work(&mut *conn);
        flag_if_broken(&mut conn);
        result
    }

    /// Sends a raw command and returns the reply.
    pub fn exec(&self, args: &[&[u8]]) -> ClientResult<Reply> {
        self.run(|conn| conn.exec(args))
    }

    /// Pings the server. Returns the raw response payload.
    pub fn ping(&self) -> ClientResult<Vec<u8>> {
        self.run(|conn| conn.ping())
    }

    /// Fetches a value by key.
    ///
    /// Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        self.run(|conn| conn.get(key))
    }

    /// Sets a value for a key without expiration.
    pub fn set(&self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        self.run(|conn| conn.set(key, value))
    }

    /// Deletes a key. Returns true when a key was removed.
    pub fn del(&self, key: &[u8]) -> ClientResult<bool> {
        self.run(|conn| conn.del(key))
    }

    /// Blocking list pop; see `Connection::blpop`.
    pub fn blpop(&self, key: &[u8], timeout: Duration) -> ClientResult<Option<(Vec<u8>, Vec<u8>)>> {
        self.run(|conn| conn.blpop(key, timeout))
    }

    /// Closes the pool. Connections in use are closed when they come back.
    pub fn close(&self) {
        self.pool.close();
    }
}
