//! # Cluster Command Executor
//!
//! Purpose: Run one unit of work against the node that owns a key, following
//! redirects and recovering from node failures within a bounded budget.
//!
//! ## Design Principles
//! 1. **Explicit State**: The retry loop carries its state (budget, random-node
//!    flag, pinned ASK connection) in locals instead of recursion.
//! 2. **Tagged Outcomes**: Every attempt ends as `Done`, `Redirect`,
//!    `Transport` or `Fatal`; only the loop decides what happens next.
//! 3. **Guaranteed Release**: Borrowed connections live in guards, so each
//!    attempt hands its connection back on every path.
//!
//! ## State Machine
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//!  budget? ─no─► TooManyRedirections                         │
//!     │yes                                                  │
//!  Resolve (pinned ASK conn | random node | slot owner)     │
//!     │                                                     │
//!  Dispatch ([ASKING] + work)                               │
//!     ├─ Done ─────► Ok                                     │
//!     ├─ Fatal ────► Err                                    │
//!     ├─ Transport ─ random? ─yes─► ClusterUnreachable      │
//!     │                 └no── random next ─────────────────┤
//!     ├─ ASK ──────► pin target conn ───────────────────────┤
//!     └─ MOVED ────► renew slot cache ──────────────────────┘
//! ```

use slotline_common::{hash_slot, Redirect, RedirectKind};

use crate::cluster::handler::ConnectionHandler;
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::factory::{flag_if_broken, PooledConnection};

/// Result of a single attempt.
enum Attempt<T> {
    Done(T),
    Redirect(Redirect),
    Transport(ClientError),
    Fatal(ClientError),
}

impl<T> From<ClientResult<T>> for Attempt<T> {
    fn from(result: ClientResult<T>) -> Self {
        match result {
            Ok(value) => Attempt::Done(value),
            Err(ClientError::Redirect(redirect)) => Attempt::Redirect(redirect),
            Err(err) if err.is_transport() => Attempt::Transport(err),
            Err(err) => Attempt::Fatal(err),
        }
    }
}

/// Executes keyed work with slot routing and redirect handling.
pub struct ClusterCommand<'a> {
    handler: &'a ConnectionHandler,
    max_redirections: usize,
}

impl<'a> ClusterCommand<'a> {
    pub fn new(handler: &'a ConnectionHandler, max_redirections: usize) -> Self {
        ClusterCommand {
            handler,
            max_redirections,
        }
    }

    /// Runs `work` on a connection to the node serving `key`.
    ///
    /// `work` may be invoked several times, once per attempt.
    ///
    /// **Logic**:
    /// 1. Stop with `TooManyRedirections` once the budget is spent.
    /// 2. Use the pinned ASK connection if any, else a random node after a
    ///    transport failure, else the slot owner.
    /// 3. On ASK pin a connection to the target; on MOVED renew the slot cache;
    ///    on a transport failure switch to a random node, unless this attempt
    ///    already was on one.
    /// 4. Every retry costs one unit of budget.
    pub fn run<T, F>(&self, key: &[u8], mut work: F) -> ClientResult<T>
    where
        F: FnMut(&mut Connection) -> ClientResult<T>,
    {
        let slot = hash_slot(key);
        let mut redirections = self.max_redirections;
        let mut try_random_node = false;
        let mut asking: Option<PooledConnection> = None;

        loop {
            if redirections == 0 {
                return Err(ClientError::TooManyRedirections);
            }

            match self.attempt(slot, asking.take(), try_random_node, &mut work) {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fatal(err) => return Err(err),
                Attempt::Transport(err) => {
                    if try_random_node {
                        tracing::warn!(slot, error = %err, "random node failed; cluster unreachable");
                        return Err(ClientError::ClusterUnreachable(Box::new(err)));
                    }
                    tracing::warn!(slot, error = %err, "transport failure; retrying on random node");
                    try_random_node = true;
                }
                Attempt::Redirect(redirect) => {
                    tracing::debug!(slot, %redirect, "following redirect");
                    try_random_node = false;
                    match redirect.kind {
                        RedirectKind::Ask => {
                            match self.handler.get_connection_from_node(&redirect.target) {
                                Ok(conn) => asking = Some(conn),
                                Err(err) => {
                                    tracing::warn!(
                                        node = %redirect.target,
                                        error = %err,
                                        "cannot reach ASK target; retrying on random node"
                                    );
                                    try_random_node = true;
                                }
                            }
                        }
                        RedirectKind::Moved => self.handler.renew_slot_cache(),
                    }
                }
            }

            redirections -= 1;
        }
    }

    fn attempt<T, F>(
        &self,
        slot: u16,
        pinned: Option<PooledConnection>,
        random: bool,
        work: &mut F,
    ) -> Attempt<T>
    where
        F: FnMut(&mut Connection) -> ClientResult<T>,
    {
        let asking = pinned.is_some();
        let acquired = match pinned {
            Some(conn) => Ok(conn),
            None if random => self.handler.get_connection(),
            None => self.handler.get_connection_from_slot(slot),
        };
        let mut conn = match acquired {
            Ok(conn) => conn,
            Err(err) => return Attempt::from(Err(err)),
        };

        let result = if asking {
            conn.asking().and_then(|()| work(&mut *conn))
        } else {
            work(&mut *conn)
        };
        flag_if_broken(&mut conn);
        Attempt::from(result)
    }
}
