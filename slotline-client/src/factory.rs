//! Pool hooks for node connections.

use slotline_common::NodeAddress;
use slotline_pool::{FactoryError, ObjectFactory, ObjectPool, PoolConfig, Pooled};

use crate::config::ConnectionConfig;
use crate::connection::Connection;

/// Pool of connections to one node.
pub type ConnectionPool = ObjectPool<Connection>;

/// A connection borrowed from a `ConnectionPool`; returned on drop.
pub type PooledConnection = Pooled<Connection>;

/// Opens, checks and closes connections to a single node.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    node: NodeAddress,
    config: ConnectionConfig,
}

impl ConnectionFactory {
    pub fn new(node: NodeAddress, config: ConnectionConfig) -> Self {
        ConnectionFactory { node, config }
    }

    pub fn node(&self) -> &NodeAddress {
        &self.node
    }
}

impl ObjectFactory<Connection> for ConnectionFactory {
    fn make(&self) -> Result<Connection, FactoryError> {
        tracing::debug!(node = %self.node, "opening connection");
        Ok(Connection::connect(&self.node, &self.config)?)
    }

    // A blocking command may have been abandoned with the timeout lifted.
    fn activate(&self, conn: &mut Connection) -> Result<(), FactoryError> {
        Ok(conn.restore_timeout()?)
    }

    fn validate(&self, conn: &mut Connection) -> Result<bool, FactoryError> {
        if conn.is_broken() {
            return Ok(false);
        }
        if self.config.ping_on_validate {
            return Ok(conn.ping().is_ok());
        }
        Ok(true)
    }

    fn destroy(&self, mut conn: Connection) -> Result<(), FactoryError> {
        conn.close();
        Ok(())
    }
}

/// Marks the guard broken when the connection behind it broke, so it is
/// invalidated instead of returned.
pub(crate) fn flag_if_broken(conn: &mut PooledConnection) {
    if Connection::is_broken(conn) {
        conn.mark_broken();
    }
}

/// Builds a pool for `node`.
pub fn connection_pool(node: NodeAddress, connection: ConnectionConfig, pool: PoolConfig) -> ConnectionPool {
    ObjectPool::new(ConnectionFactory::new(node, connection), pool)
}
