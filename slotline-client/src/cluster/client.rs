//! # Cluster Client
//!
//! Purpose: Blocking facade that routes each keyed command to the node
//! owning the key's slot.
//!
//! ## Design Principles
//! 1. **Single Entry Point**: Every keyed command goes through `run`.
//! 2. **Cheap Sharing**: Clones share the topology and node pools.

use std::sync::Arc;
use std::time::Duration;

use slotline_common::Reply;

use crate::cluster::cache::ClusterInfoCache;
use crate::cluster::command::ClusterCommand;
use crate::cluster::handler::ConnectionHandler;
use crate::config::ClusterConfig;
use crate::connection::Connection;
use crate::error::ClientResult;

/// Client for a sharded deployment.
#[derive(Clone)]
pub struct ClusterClient {
    handler: Arc<ConnectionHandler>,
    max_redirections: usize,
}

impl ClusterClient {
    /// Discovers the topology through the configured seeds.
    pub fn new(config: ClusterConfig) -> ClientResult<Self> {
        let handler = ConnectionHandler::new(&config)?;
        Ok(ClusterClient {
            handler: Arc::new(handler),
            max_redirections: config.max_redirections,
        })
    }

    /// Runs `work` against the node serving `key`, following redirects.
    ///
    /// `work` runs once per attempt, so it must be safe to repeat.
    pub fn run<T, F>(&self, key: &[u8], work: F) -> ClientResult<T>
    where
        F: FnMut(&mut Connection) -> ClientResult<T>,
    {
        ClusterCommand::new(&self.handler, self.max_redirections).run(key, work)
    }

    /// Sends a raw command routed by `key`.
    pub fn exec(&self, key: &[u8], args: &[&[u8]]) -> ClientResult<Reply> {
        self.run(key, |conn| conn.exec(args))
    }

    pub fn get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        self.run(key, |conn| conn.get(key))
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        self.run(key, |conn| conn.set(key, value))
    }

    pub fn del(&self, key: &[u8]) -> ClientResult<bool> {
        self.run(key, |conn| conn.del(key))
    }

    /// Blocking list pop routed by `key`; see `Connection::blpop`.
    pub fn blpop(&self, key: &[u8], timeout: Duration) -> ClientResult<Option<(Vec<u8>, Vec<u8>)>> {
        self.run(key, |conn| conn.blpop(key, timeout))
    }

    /// The current topology view.
    pub fn cache(&self) -> &ClusterInfoCache {
        self.handler.cache()
    }

    /// Re-reads the slot table from any reachable node.
    pub fn renew_slot_cache(&self) {
        self.handler.renew_slot_cache();
    }

    /// Closes every node pool.
    pub fn close(&self) {
        self.handler.close();
    }
}
