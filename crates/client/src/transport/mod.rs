pub mod tcp;
pub mod udp;

use async_trait::async_trait;
use lodestone_dns_domain::ResolveError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

pub use tcp::TcpTransport;
pub use udp::UdpTransport;

// EAFNOSUPPORT on Linux; io::ErrorKind has no stable mapping for it.
#[cfg(target_os = "linux")]
const AF_NOT_SUPPORTED: i32 = 97;
#[cfg(not(target_os = "linux"))]
const AF_NOT_SUPPORTED: i32 = 47;

#[async_trait]
pub trait DnsTransport: Send + Sync {
    /// Exchanges one request for one response within the per-attempt
    /// deadline. `request_id` lets the datagram variant discard responses
    /// that belong to other requests.
    async fn exchange(
        &self,
        request: &[u8],
        request_id: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, ResolveError>;

    fn protocol_name(&self) -> &'static str;
}

pub enum Transport {
    Udp(UdpTransport),
    Tcp(TcpTransport),
}

impl Transport {
    pub fn udp(server: SocketAddr, max_payload_size: u16) -> Self {
        Self::Udp(UdpTransport::new(server, max_payload_size))
    }

    pub fn tcp(server: SocketAddr) -> Self {
        Self::Tcp(TcpTransport::new(server))
    }

    pub fn is_udp(&self) -> bool {
        matches!(self, Self::Udp(_))
    }

    pub async fn exchange(
        &self,
        request: &[u8],
        request_id: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, ResolveError> {
        match self {
            Self::Udp(t) => DnsTransport::exchange(t, request, request_id, timeout).await,
            Self::Tcp(t) => DnsTransport::exchange(t, request, request_id, timeout).await,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Udp(_) => "UDP",
            Self::Tcp(_) => "TCP",
        }
    }
}

/// Maps an I/O failure into the retry taxonomy: timeouts and reset-style
/// failures are transient (retry the same server), an unsupported address
/// family is permanent (disable the server and move on).
pub(crate) fn classify_io_error(server: SocketAddr, err: &io::Error) -> ResolveError {
    use io::ErrorKind;

    if err.raw_os_error() == Some(AF_NOT_SUPPORTED) {
        return ResolveError::PermanentTransport {
            server,
            reason: err.to_string(),
        };
    }
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => ResolveError::Timeout { server },
        ErrorKind::Unsupported | ErrorKind::AddrNotAvailable | ErrorKind::InvalidInput => {
            ResolveError::PermanentTransport {
                server,
                reason: err.to_string(),
            }
        }
        _ => ResolveError::TransientTransport {
            server,
            reason: err.to_string(),
        },
    }
}

/// Runs `fut` under the per-attempt deadline. `Duration::MAX` disables the
/// timer entirely (the configured "infinite" timeout).
pub(crate) async fn within_deadline<T, F>(
    server: SocketAddr,
    timeout: Duration,
    fut: F,
) -> Result<T, ResolveError>
where
    F: std::future::Future<Output = Result<T, ResolveError>>,
{
    if timeout == Duration::MAX {
        return fut.await;
    }
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ResolveError::Timeout { server }),
    }
}
