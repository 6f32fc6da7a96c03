//! # Topology Replies
//!
//! Purpose: Turn the two cluster topology queries into plain structs the slot
//! cache can apply.
//!
//! ## Formats
//!
//! `CLUSTER NODES` is a bulk string with one node per line:
//!
//! ```text
//! <id> <host:port[@cport]> <flags> <primary-id> <ping> <pong> <epoch> <link> <slot>...
//! ```
//!
//! Slot fields are `n`, `a-b`, or a bracketed migration marker such as
//! `[93->-<id>]`, which is skipped. An empty host means "the node you asked".
//!
//! `CLUSTER SLOTS` is a multi-bulk reply of `[start, end, [host, port, ...], replicas...]`.
//! Only element 2 (the primary) is consulted.

use crate::node::NodeAddress;
use crate::resp::{Reply, RespError, RespResult};
use crate::slot::SLOT_COUNT;

const HOST_AND_PORT_INDEX: usize = 1;
const FLAGS_INDEX: usize = 2;
const SLOT_INFORMATIONS_START_INDEX: usize = 8;

/// One line of `CLUSTER NODES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNodeInfo {
    pub id: String,
    pub node: NodeAddress,
    pub primary: bool,
    /// Slots this node serves, expanded from single slots and ranges.
    pub slots: Vec<u16>,
}

/// One entry of `CLUSTER SLOTS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
    pub primary: NodeAddress,
}

impl SlotRange {
    pub fn slots(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

/// Parses the text of `CLUSTER NODES`.
///
/// `current` is the node the query was sent to; it fills in an empty host.
pub fn parse_cluster_nodes(text: &str, current: &NodeAddress) -> RespResult<Vec<ClusterNodeInfo>> {
    let mut nodes = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        nodes.push(parse_node_line(line, current)?);
    }
    Ok(nodes)
}

fn parse_node_line(line: &str, current: &NodeAddress) -> RespResult<ClusterNodeInfo> {
    let fields: Vec<&str> = line.split(' ').filter(|f| !f.is_empty()).collect();
    if fields.len() <= FLAGS_INDEX {
        return Err(RespError::Protocol("truncated cluster nodes line"));
    }

    // Strip the cluster bus port and any hostname suffix (`host:port@cport,hostname`).
    let addr = fields[HOST_AND_PORT_INDEX];
    let addr = addr.split(['@', ',']).next().unwrap_or(addr);
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or(RespError::Protocol("cluster node address missing port"))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| RespError::Protocol("cluster node address has invalid port"))?;
    let node = if host.is_empty() {
        NodeAddress::new(current.host(), port)
    } else {
        NodeAddress::new(host, port)
    };

    let primary = fields[FLAGS_INDEX].split(',').any(|flag| flag == "master");

    let mut slots = Vec::new();
    for field in fields.iter().skip(SLOT_INFORMATIONS_START_INDEX) {
        if field.starts_with('[') {
            continue;
        }
        push_slot_field(field, &mut slots)?;
    }

    Ok(ClusterNodeInfo {
        id: fields[0].to_string(),
        node,
        primary,
        slots,
    })
}

fn push_slot_field(field: &str, slots: &mut Vec<u16>) -> RespResult<()> {
    match field.split_once('-') {
        Some((start, end)) => {
            let start = parse_slot(start)?;
            let end = parse_slot(end)?;
            slots.extend(start..=end);
        }
        None => slots.push(parse_slot(field)?),
    }
    Ok(())
}

fn parse_slot(text: &str) -> RespResult<u16> {
    let slot = text
        .parse::<u16>()
        .map_err(|_| RespError::Protocol("invalid slot number"))?;
    check_slot(slot)
}

fn check_slot(slot: u16) -> RespResult<u16> {
    if slot >= SLOT_COUNT {
        return Err(RespError::Protocol("slot out of range"));
    }
    Ok(slot)
}

/// Parses a `CLUSTER SLOTS` reply, keeping only primary endpoints.
///
/// Entries with fewer than three elements or an empty host list are skipped.
pub fn parse_cluster_slots(reply: &Reply) -> RespResult<Vec<SlotRange>> {
    let entries = match reply {
        Reply::Array(Some(entries)) => entries,
        Reply::Array(None) => return Ok(Vec::new()),
        _ => return Err(RespError::Protocol("cluster slots reply is not an array")),
    };

    let mut ranges = Vec::with_capacity(entries.len());
    for entry in entries {
        let items = match entry {
            Reply::Array(Some(items)) => items,
            _ => return Err(RespError::Protocol("cluster slots entry is not an array")),
        };
        if items.len() <= 2 {
            continue;
        }

        let start = slot_number(&items[0])?;
        let end = slot_number(&items[1])?;
        let host_info = match &items[2] {
            Reply::Array(Some(info)) if !info.is_empty() => info,
            Reply::Array(_) => continue,
            _ => return Err(RespError::Protocol("cluster slots node is not an array")),
        };
        ranges.push(SlotRange {
            start,
            end,
            primary: host_and_port(host_info)?,
        });
    }
    Ok(ranges)
}

fn slot_number(reply: &Reply) -> RespResult<u16> {
    reply
        .as_integer()
        .and_then(|value| u16::try_from(value).ok())
        .ok_or(RespError::Protocol("invalid slot number"))
        .and_then(check_slot)
}

fn host_and_port(info: &[Reply]) -> RespResult<NodeAddress> {
    if info.len() < 2 {
        return Err(RespError::Protocol("cluster slots node missing port"));
    }
    let host = info[0]
        .as_bytes()
        .ok_or(RespError::Protocol("cluster slots host is not a string"))?;
    let port = info[1]
        .as_integer()
        .and_then(|value| u16::try_from(value).ok())
        .ok_or(RespError::Protocol("cluster slots port is not a port number"))?;
    Ok(NodeAddress::new(String::from_utf8_lossy(host), port))
}
