//! UDP transport (RFC 1035 §4.2.1).
//!
//! One datagram out, one in. Datagrams whose transaction id does not match
//! the outstanding request are discarded and the receive continues until the
//! per-attempt deadline. A truncated response (TC=1) is returned as-is; the
//! caller decides whether to fall back to TCP.

use super::{classify_io_error, within_deadline, DnsTransport};
use crate::protocol;
use async_trait::async_trait;
use lodestone_dns_domain::server::PLAIN_UDP_PAYLOAD_SIZE;
use lodestone_dns_domain::ResolveError;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

pub struct UdpTransport {
    server: SocketAddr,
    max_payload_size: u16,
}

impl UdpTransport {
    /// `max_payload_size` is the server's negotiated EDNS payload size; the
    /// receive buffer never shrinks below the plain 512-octet limit.
    pub fn new(server: SocketAddr, max_payload_size: u16) -> Self {
        Self {
            server,
            max_payload_size: max_payload_size.max(PLAIN_UDP_PAYLOAD_SIZE),
        }
    }
}

#[async_trait]
impl DnsTransport for UdpTransport {
    async fn exchange(
        &self,
        request: &[u8],
        request_id: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, ResolveError> {
        let server = self.server;
        let buf_size = self.max_payload_size as usize;

        within_deadline(server, timeout, async move {
            // Ephemeral socket per attempt, family matched to the server.
            let bind_addr: SocketAddr = if server.is_ipv4() {
                (Ipv4Addr::UNSPECIFIED, 0).into()
            } else {
                (Ipv6Addr::UNSPECIFIED, 0).into()
            };
            let socket = UdpSocket::bind(bind_addr)
                .await
                .map_err(|e| classify_io_error(server, &e))?;
            socket
                .connect(server)
                .await
                .map_err(|e| classify_io_error(server, &e))?;

            socket
                .send(request)
                .await
                .map_err(|e| classify_io_error(server, &e))?;
            debug!(server = %server, bytes_sent = request.len(), "UDP query sent");

            let mut buf = vec![0u8; buf_size];
            loop {
                let received = socket
                    .recv(&mut buf)
                    .await
                    .map_err(|e| classify_io_error(server, &e))?;

                match protocol::message_id(&buf[..received]) {
                    Some(id) if id == request_id => {
                        debug!(server = %server, bytes_received = received, "UDP response received");
                        buf.truncate(received);
                        return Ok(buf);
                    }
                    other => {
                        debug!(
                            server = %server,
                            expected_id = request_id,
                            received_id = ?other,
                            "Discarding datagram with mismatched transaction id"
                        );
                    }
                }
            }
        })
        .await
    }

    fn protocol_name(&self) -> &'static str {
        "UDP"
    }
}
