//! # Slot Cache
//!
//! Purpose: Map node keys to connection pools and hash slots to the pool of
//! the node that serves them.
//!
//! ## Design Principles
//! 1. **One Lock**: Both maps live behind a single `RwLock`; reads share it,
//!    topology changes take it exclusively.
//! 2. **No IO Under Lock**: Topology queries run first; only the parsed result
//!    is applied while the write lock is held.
//! 3. **Pool Reuse**: Rediscovery keeps the pools of nodes that are still
//!    present so their idle connections survive.
//!
//! ## Structure Overview
//!
//! ```text
//! ClusterInfoCache
//!   └── state: RwLock<CacheState>
//!         ├── nodes: HashMap<"host:port", ConnectionPool>
//!         └── slots: Vec<Option<ConnectionPool>>   (SLOT_COUNT entries)
//! ```

use hashbrown::HashMap;
use parking_lot::RwLock;
use slotline_common::{NodeAddress, SLOT_COUNT};
use slotline_pool::PoolConfig;

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::ClientResult;
use crate::factory::{connection_pool, ConnectionPool};

struct CacheState {
    nodes: HashMap<String, ConnectionPool>,
    slots: Vec<Option<ConnectionPool>>,
}

impl CacheState {
    fn new() -> Self {
        CacheState {
            nodes: HashMap::new(),
            slots: vec![None; usize::from(SLOT_COUNT)],
        }
    }

    fn clear_slots(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }
}

/// Shared view of the cluster topology.
pub struct ClusterInfoCache {
    connection: ConnectionConfig,
    pool: PoolConfig,
    state: RwLock<CacheState>,
}

impl ClusterInfoCache {
    pub fn new(connection: ConnectionConfig, pool: PoolConfig) -> Self {
        ClusterInfoCache {
            connection,
            pool,
            state: RwLock::new(CacheState::new()),
        }
    }

    /// Rebuilds both maps from `CLUSTER NODES` sent over `conn`.
    ///
    /// Pools of nodes missing from the new topology are closed.
    pub fn discover_nodes_and_slots(&self, conn: &mut Connection) -> ClientResult<()> {
        let infos = conn.cluster_nodes()?;

        let dropped = {
            let mut state = self.state.write();
            let mut previous = std::mem::take(&mut state.nodes);
            state.clear_slots();
            for info in &infos {
                let key = info.node.key();
                let pool = match previous.remove(&key) {
                    Some(pool) => pool,
                    None => self.new_pool(&info.node),
                };
                let pool = state.nodes.entry(key).or_insert(pool).clone();
                for &slot in &info.slots {
                    if let Some(entry) = state.slots.get_mut(usize::from(slot)) {
                        *entry = Some(pool.clone());
                    }
                }
            }
            previous
        };

        for pool in dropped.values() {
            pool.close();
        }
        tracing::info!(
            from = %conn.node(),
            nodes = infos.len(),
            dropped = dropped.len(),
            "discovered cluster nodes and slots"
        );
        Ok(())
    }

    /// Rebuilds the slot table from `CLUSTER SLOTS` sent over `conn`.
    ///
    /// Existing node pools are kept; nodes that own a range but were unknown
    /// get a new pool.
    pub fn discover_slots(&self, conn: &mut Connection) -> ClientResult<()> {
        let ranges = conn.cluster_slots()?;

        {
            let mut state = self.state.write();
            state.clear_slots();
            for range in &ranges {
                let pool = self.pool_for(&mut state, &range.primary);
                for slot in range.slots() {
                    if let Some(entry) = state.slots.get_mut(usize::from(slot)) {
                        *entry = Some(pool.clone());
                    }
                }
            }
        }

        tracing::info!(from = %conn.node(), ranges = ranges.len(), "discovered cluster slots");
        Ok(())
    }

    /// Registers `node` with a fresh pool unless it is already known.
    pub fn set_node_if_not_exist(&self, node: &NodeAddress) {
        let mut state = self.state.write();
        self.pool_for(&mut state, node);
    }

    pub fn assign_slot_to_node(&self, slot: u16, node: &NodeAddress) {
        self.assign_slots_to_node(&[slot], node);
    }

    /// Points every slot in `slots` at `node`, registering the node if needed.
    pub fn assign_slots_to_node(&self, slots: &[u16], node: &NodeAddress) {
        let mut state = self.state.write();
        let pool = self.pool_for(&mut state, node);
        for &slot in slots {
            if let Some(entry) = state.slots.get_mut(usize::from(slot)) {
                *entry = Some(pool.clone());
            }
        }
    }

    /// Pool of the node serving `slot`, if the slot is mapped.
    pub fn slot_pool(&self, slot: u16) -> Option<ConnectionPool> {
        self.state.read().slots.get(usize::from(slot)).cloned().flatten()
    }

    /// Pool of the node with key `host:port`, if known.
    pub fn node_pool(&self, key: &str) -> Option<ConnectionPool> {
        self.state.read().nodes.get(key).cloned()
    }

    /// Snapshot of every known node and its pool.
    pub fn nodes(&self) -> Vec<(String, ConnectionPool)> {
        self.state
            .read()
            .nodes
            .iter()
            .map(|(key, pool)| (key.clone(), pool.clone()))
            .collect()
    }

    /// Number of slots currently mapped to a node.
    pub fn mapped_slots(&self) -> usize {
        self.state.read().slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Closes every pool and forgets the topology.
    pub fn close(&self) {
        let nodes = {
            let mut state = self.state.write();
            state.clear_slots();
            std::mem::take(&mut state.nodes)
        };
        for pool in nodes.values() {
            pool.close();
        }
    }

    fn pool_for(&self, state: &mut CacheState, node: &NodeAddress) -> ConnectionPool {
        state
            .nodes
            .entry(node.key())
            .or_insert_with(|| self.new_pool(node))
            .clone()
    }

    fn new_pool(&self, node: &NodeAddress) -> ConnectionPool {
        tracing::debug!(node = %node, "registering cluster node");
        connection_pool(node.clone(), self.connection.clone(), self.pool.clone())
    }
}
