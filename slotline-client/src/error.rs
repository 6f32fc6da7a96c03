use slotline_common::{Redirect, RespError};
use slotline_pool::PoolError;
use thiserror::Error;

/// Result type for the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the single-node and cluster clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed reply bytes; the connection is no longer usable.
    #[error("protocol error: {0}")]
    Protocol(&'static str),
    /// Server returned an application error reply (e.g. `WRONGTYPE`).
    #[error("server error: {message}")]
    Server { message: String },
    /// Server redirected the command to another node.
    #[error("redirected: {0}")]
    Redirect(Redirect),
    /// Reply type did not match the expected command reply.
    #[error("unexpected response")]
    UnexpectedResponse,
    /// Address could not be parsed or resolved.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// A connection could not be borrowed from a node pool.
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
    /// No known node answered.
    #[error("no reachable node in cluster")]
    NoReachableNode,
    /// A transport failure happened even on a randomly chosen node.
    #[error("cluster unreachable: {0}")]
    ClusterUnreachable(#[source] Box<ClientError>),
    /// The redirection budget ran out.
    #[error("too many cluster redirections")]
    TooManyRedirections,
}

impl ClientError {
    /// True for failures of the transport itself, which the cluster executor
    /// retries on another node.
    pub fn is_transport(&self) -> bool {
        match self {
            ClientError::Io(_) | ClientError::NoReachableNode => true,
            ClientError::Pool(PoolError::Closed) => false,
            ClientError::Pool(_) => true,
            _ => false,
        }
    }
}

impl From<RespError> for ClientError {
    fn from(err: RespError) -> Self {
        match err {
            RespError::Io(err) => ClientError::Io(err),
            RespError::Protocol(detail) => ClientError::Protocol(detail),
            RespError::Server(message) => match Redirect::parse(&message) {
                Some(redirect) => ClientError::Redirect(redirect),
                None => ClientError::Server { message },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotline_common::RedirectKind;

    #[test]
    fn server_errors_become_redirects_when_they_parse() {
        let err = ClientError::from(RespError::Server("ASK 42 127.0.0.1:7001".into()));
        match err {
            ClientError::Redirect(redirect) => assert_eq!(redirect.kind, RedirectKind::Ask),
            other => panic!("unexpected: {other:?}"),
        }

        let err = ClientError::from(RespError::Server("WRONGTYPE bad".into()));
        assert!(matches!(err, ClientError::Server { .. }));
        assert!(!err.is_transport());
    }

    #[test]
    fn classifies_transport_failures() {
        let io = ClientError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(io.is_transport());
        assert!(ClientError::Pool(PoolError::Exhausted).is_transport());
        assert!(!ClientError::Pool(PoolError::Closed).is_transport());
        assert!(!ClientError::Protocol("bad").is_transport());
    }
}
