//! # Node Addresses
//!
//! Host and port of one cluster node, with the `host:port` key used to index
//! per-node connection pools.

use std::fmt;
use std::str::FromStr;

use crate::resp::RespError;

/// Immutable host + port pair identifying a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    host: String,
    port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        NodeAddress {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Key used by the cluster view to index node pools.
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for NodeAddress {
    type Err = RespError;

    /// Parses `host:port`. The split happens on the last colon so bare IPv6
    /// hosts such as `::1:7000` keep their inner colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or(RespError::Protocol("node address missing port"))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| RespError::Protocol("node address has invalid port"))?;
        Ok(NodeAddress::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let node: NodeAddress = "10.0.0.7:7001".parse().unwrap();
        assert_eq!(node.host(), "10.0.0.7");
        assert_eq!(node.port(), 7001);
        assert_eq!(node.key(), "10.0.0.7:7001");
    }

    #[test]
    fn keeps_ipv6_colons_in_host() {
        let node: NodeAddress = "::1:7000".parse().unwrap();
        assert_eq!(node.host(), "::1");
        assert_eq!(node.port(), 7000);
    }

    #[test]
    fn rejects_missing_or_bad_port() {
        assert!("localhost".parse::<NodeAddress>().is_err());
        assert!("localhost:http".parse::<NodeAddress>().is_err());
    }
}
