//! # Connection Handler
//!
//! Purpose: Hand out pooled connections by slot, by node, or from any node
//! that answers, and keep the slot cache fresh.
//!
//! ## Design Principles
//! 1. **Best-Effort Bootstrap**: Seeds are tried in order; the first one that
//!    answers `CLUSTER NODES` defines the topology.
//! 2. **Live Random Node**: A random connection is only handed out after it
//!    answered `PING`.
//! 3. **Quiet Renewal**: Slot cache renewal tries every known node and never
//!    fails the caller; the next redirect will trigger another attempt.

use rand::seq::SliceRandom;
use slotline_common::NodeAddress;

use crate::cluster::cache::ClusterInfoCache;
use crate::config::{ClusterConfig, ConnectionConfig};
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::factory::{flag_if_broken, PooledConnection};

/// Slot-aware source of pooled connections.
pub struct ConnectionHandler {
    cache: ClusterInfoCache,
    connection: ConnectionConfig,
}

impl ConnectionHandler {
    /// Builds the handler and discovers the topology through the seeds.
    ///
    /// Unreachable seeds are not an error here: every seed is registered as a
    /// node so later commands can still find one that came up.
    pub fn new(config: &ClusterConfig) -> ClientResult<Self> {
        let seeds = config
            .seeds
            .iter()
            .map(|seed| {
                seed.parse::<NodeAddress>()
                    .map_err(|_| ClientError::InvalidAddress(seed.clone()))
            })
            .collect::<ClientResult<Vec<_>>>()?;

        let handler = ConnectionHandler {
            cache: ClusterInfoCache::new(config.connection.clone(), config.pool.clone()),
            connection: config.connection.clone(),
        };
        handler.initialize_slots_cache(&seeds);
        Ok(handler)
    }

    pub fn cache(&self) -> &ClusterInfoCache {
        &self.cache
    }

    fn initialize_slots_cache(&self, seeds: &[NodeAddress]) {
        let mut discovered = false;
        for seed in seeds {
            match self.discover_from_seed(seed) {
                Ok(()) => {
                    discovered = true;
                    break;
                }
                Err(err) => {
                    tracing::debug!(node = %seed, error = %err, "seed did not answer topology query");
                }
            }
        }
        if !discovered {
            tracing::warn!(seeds = seeds.len(), "no seed node answered; slot cache is empty");
        }

        for seed in seeds {
            self.cache.set_node_if_not_exist(seed);
        }
    }

    fn discover_from_seed(&self, seed: &NodeAddress) -> ClientResult<()> {
        let mut conn = Connection::connect(seed, &self.connection)?;
        let result = self.cache.discover_nodes_and_slots(&mut conn);
        conn.close();
        result
    }

    /// Borrows a connection from a random node that answers `PING`.
    pub fn get_connection(&self) -> ClientResult<PooledConnection> {
        let mut pools = self.cache.nodes();
        pools.shuffle(&mut rand::rng());

        for (key, pool) in pools {
            let mut conn = match pool.get() {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::debug!(node = %key, error = %err, "cannot borrow from node");
                    continue;
                }
            };
            match conn.ping() {
                Ok(_) => return Ok(conn),
                Err(err) => {
                    tracing::debug!(node = %key, error = %err, "node did not answer ping");
                    flag_if_broken(&mut conn);
                }
            }
        }
        Err(ClientError::NoReachableNode)
    }

    /// Borrows a connection to the node serving `slot`, or to a random node
    /// when the slot is unmapped.
    pub fn get_connection_from_slot(&self, slot: u16) -> ClientResult<PooledConnection> {
        match self.cache.slot_pool(slot) {
            Some(pool) => Ok(pool.get()?),
            None => {
                tracing::debug!(slot, "slot not mapped; using random node");
                self.get_connection()
            }
        }
    }

    /// Borrows a connection to `node`, registering the node first if unseen.
    pub fn get_connection_from_node(&self, node: &NodeAddress) -> ClientResult<PooledConnection> {
        self.cache.set_node_if_not_exist(node);
        let pool = self
            .cache
            .node_pool(&node.key())
            .ok_or(ClientError::NoReachableNode)?;
        Ok(pool.get()?)
    }

    /// Re-reads the slot table from the first node that answers `CLUSTER SLOTS`.
    pub fn renew_slot_cache(&self) {
        for (key, pool) in self.cache.nodes() {
            let mut conn = match pool.get() {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::debug!(node = %key, error = %err, "cannot borrow for slot renewal");
                    continue;
                }
            };
            match self.cache.discover_slots(&mut conn) {
                Ok(()) => return,
                Err(err) => {
                    flag_if_broken(&mut conn);
                    tracing::debug!(node = %key, error = %err, "slot renewal failed on node");
                }
            }
        }
        tracing::warn!("could not renew slot cache from any node");
    }

    /// Closes every node pool.
    pub fn close(&self) {
        self.cache.close();
    }
}
