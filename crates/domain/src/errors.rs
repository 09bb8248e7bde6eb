use crate::message::ResponseCode;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("malformed DNS message: {0}")]
    WireFormat(String),

    #[error("query to {server} timed out")]
    Timeout { server: SocketAddr },

    #[error("transient transport failure on {server}: {reason}")]
    TransientTransport { server: SocketAddr, reason: String },

    #[error("permanent transport failure on {server}: {reason}")]
    PermanentTransport { server: SocketAddr, reason: String },

    #[error("{server} answered {rcode}")]
    DnsError {
        server: SocketAddr,
        rcode: ResponseCode,
    },

    #[error("query was cancelled")]
    Cancelled,

    #[error("connection failure: {0}")]
    ConnectionError(Box<ResolveError>),

    #[error("no name server responded; tried: {}", join_endpoints(.servers))]
    ConnectionTimeout { servers: Vec<SocketAddr> },

    #[error("invalid domain name: {0}")]
    InvalidName(String),

    #[error("invalid client options: {0}")]
    InvalidOptions(String),
}

impl ResolveError {
    /// True when retrying the same server is expected to help.
    ///
    /// Aggregate `ConnectionError`s are unwrapped and classified by their
    /// inner cause.
    pub fn is_transient(&self) -> bool {
        match self {
            ResolveError::Timeout { .. } | ResolveError::TransientTransport { .. } => true,
            ResolveError::ConnectionError(inner) => inner.is_transient(),
            _ => false,
        }
    }
}

fn join_endpoints(servers: &[SocketAddr]) -> String {
    servers
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
