//! TCP transport (RFC 1035 §4.2.2): 16-bit big-endian length prefix on both
//! directions. Connects on demand; one connection per attempt, so a
//! connection is never shared across concurrent outstanding queries, and
//! every exit path drops the socket.

use super::{classify_io_error, within_deadline, DnsTransport};
use async_trait::async_trait;
use lodestone_dns_domain::ResolveError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

pub struct TcpTransport {
    server: SocketAddr,
}

impl TcpTransport {
    pub fn new(server: SocketAddr) -> Self {
        Self { server }
    }
}

#[async_trait]
impl DnsTransport for TcpTransport {
    async fn exchange(
        &self,
        request: &[u8],
        _request_id: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, ResolveError> {
        let server = self.server;
        if u16::try_from(request.len()).is_err() {
            return Err(ResolveError::WireFormat(format!(
                "request of {} octets cannot be TCP-framed",
                request.len()
            )));
        }

        within_deadline(server, timeout, async move {
            let mut stream = TcpStream::connect(server)
                .await
                .map_err(|e| classify_io_error(server, &e))?;

            write_framed(&mut stream, request)
                .await
                .map_err(|e| classify_io_error(server, &e))?;
            debug!(server = %server, bytes_sent = request.len(), "TCP query sent");

            let response = read_framed(&mut stream)
                .await
                .map_err(|e| classify_io_error(server, &e))?;
            debug!(server = %server, bytes_received = response.len(), "TCP response received");

            Ok(response)
        })
        .await
    }

    fn protocol_name(&self) -> &'static str {
        "TCP"
    }
}

pub(crate) async fn write_framed<S>(stream: &mut S, message: &[u8]) -> io::Result<()>
where
    S: AsyncWriteExt + Unpin,
{
    let length = message.len() as u16;
    stream.write_all(&length.to_be_bytes()).await?;
    stream.write_all(message).await?;
    stream.flush().await
}

pub(crate) async fn read_framed<S>(stream: &mut S) -> io::Result<Vec<u8>>
where
    S: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let length = u16::from_be_bytes(len_buf) as usize;

    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).await?;
    Ok(body)
}
