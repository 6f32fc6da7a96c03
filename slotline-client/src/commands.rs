//! Thin command helpers on `Connection`.
//!
//! Only the commands the client itself relies on (validation, ASK handling,
//! topology discovery) plus a few basic key commands for callers and tests.

use std::time::Duration;

use slotline_common::{parse_cluster_nodes, parse_cluster_slots, ClusterNodeInfo, Reply, SlotRange};

use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};

impl Connection {
    /// Sends `PING` and returns the reply payload.
    pub fn ping(&mut self) -> ClientResult<Vec<u8>> {
        match self.exec(&[b"PING"])? {
            Reply::Status(text) => Ok(text.into_bytes()),
            Reply::Bulk(Some(data)) => Ok(data),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Sends `ASKING`, allowing the next command to hit a migrating slot.
    pub fn asking(&mut self) -> ClientResult<()> {
        expect_status(self.exec(&[b"ASKING"])?)
    }

    /// Runs `CLUSTER NODES` and parses every line.
    pub fn cluster_nodes(&mut self) -> ClientResult<Vec<ClusterNodeInfo>> {
        let text = match self.exec(&[b"CLUSTER", b"NODES"])? {
            Reply::Bulk(Some(data)) => {
                String::from_utf8(data).map_err(|_| ClientError::UnexpectedResponse)?
            }
            _ => return Err(ClientError::UnexpectedResponse),
        };
        let current = self.node().clone();
        Ok(parse_cluster_nodes(&text, &current)?)
    }

    /// Runs `CLUSTER SLOTS` and keeps the primary of every range.
    pub fn cluster_slots(&mut self) -> ClientResult<Vec<SlotRange>> {
        let reply = self.exec(&[b"CLUSTER", b"SLOTS"])?;
        Ok(parse_cluster_slots(&reply)?)
    }

    /// Fetches a value by key.
    ///
    /// Returns `Ok(None)` when the key is missing.
    pub fn get(&mut self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        match self.exec(&[b"GET", key])? {
            Reply::Bulk(data) => Ok(data),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Sets a value for a key without expiration.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        expect_status(self.exec(&[b"SET", key, value])?)
    }

    /// Deletes a key. Returns true when a key was removed.
    pub fn del(&mut self, key: &[u8]) -> ClientResult<bool> {
        match self.exec(&[b"DEL", key])? {
            Reply::Integer(count) => Ok(count > 0),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Pops from the head of a list, waiting up to `timeout` for an element.
    ///
    /// A zero timeout waits forever; any other timeout is rounded up to whole
    /// seconds so it never turns into zero. The socket read timeout is lifted
    /// for the duration of the call and restored afterwards, even on error.
    pub fn blpop(&mut self, key: &[u8], timeout: Duration) -> ClientResult<Option<(Vec<u8>, Vec<u8>)>> {
        let seconds = blocking_seconds(timeout).to_string();
        self.set_infinite_timeout()?;
        let reply = self.exec(&[b"BLPOP", key, seconds.as_bytes()]);
        let restored = self.restore_timeout();
        let reply = reply?;
        restored?;

        match reply {
            Reply::Array(None) => Ok(None),
            Reply::Array(Some(items)) => {
                let mut items = items.into_iter();
                match (items.next(), items.next(), items.next()) {
                    (Some(Reply::Bulk(Some(list))), Some(Reply::Bulk(Some(value))), None) => {
                        Ok(Some((list, value)))
                    }
                    _ => Err(ClientError::UnexpectedResponse),
                }
            }
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

fn blocking_seconds(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

fn expect_status(reply: Reply) -> ClientResult<()> {
    match reply {
        Reply::Status(_) => Ok(()),
        _ => Err(ClientError::UnexpectedResponse),
    }
}
