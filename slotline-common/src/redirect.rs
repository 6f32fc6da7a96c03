//! # Cluster Redirections
//!
//! Parse `MOVED <slot> <host>:<port>` and `ASK <slot> <host>:<port>` error
//! replies into a typed redirect.

use std::fmt;

use crate::node::NodeAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// The slot now lives on another node; the topology changed.
    Moved,
    /// The slot is migrating; retry once on the target after `ASKING`.
    Ask,
}

/// A parsed redirection reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub slot: u16,
    pub target: NodeAddress,
}

impl Redirect {
    /// Parses a server error message. Returns `None` for anything that is not
    /// a well-formed redirection.
    pub fn parse(message: &str) -> Option<Redirect> {
        let (kind, rest) = if let Some(rest) = message.strip_prefix("MOVED ") {
            (RedirectKind::Moved, rest)
        } else if let Some(rest) = message.strip_prefix("ASK ") {
            (RedirectKind::Ask, rest)
        } else {
            return None;
        };

        let mut parts = rest.split_whitespace();
        let slot = parts.next()?.parse::<u16>().ok()?;
        let target = parts.next()?.parse::<NodeAddress>().ok()?;
        Some(Redirect { kind, slot, target })
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RedirectKind::Moved => "MOVED",
            RedirectKind::Ask => "ASK",
        };
        write!(f, "{} {} {}", kind, self.slot, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_moved() {
        let redirect = Redirect::parse("MOVED 3999 127.0.0.1:6381").unwrap();
        assert_eq!(redirect.kind, RedirectKind::Moved);
        assert_eq!(redirect.slot, 3999);
        assert_eq!(redirect.target, NodeAddress::new("127.0.0.1", 6381));
        assert_eq!(redirect.to_string(), "MOVED 3999 127.0.0.1:6381");
    }

    #[test]
    fn parses_ask() {
        let redirect = Redirect::parse("ASK 12182 redis-b.internal:7002").unwrap();
        assert_eq!(redirect.kind, RedirectKind::Ask);
        assert_eq!(redirect.slot, 12182);
        assert_eq!(redirect.target.host(), "redis-b.internal");
    }

    #[test]
    fn ignores_other_errors() {
        assert!(Redirect::parse("ERR unknown command").is_none());
        assert!(Redirect::parse("WRONGTYPE Operation against a key").is_none());
        assert!(Redirect::parse("MOVED abc 127.0.0.1:1").is_none());
        assert!(Redirect::parse("MOVED 1").is_none());
    }
}
