//! Loopback mock resolvers for engine tests. Each mock binds an ephemeral
//! port, counts the requests it receives, and answers according to one
//! scripted behavior.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

/// Opt-in engine logs for a failing test run: `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Clone, Copy)]
pub enum UdpBehavior {
    /// Echo the question and answer with one A record.
    AnswerA { ip: [u8; 4], ttl: u32 },
    /// Echo the question with the given RCODE and no answers.
    Rcode(u8),
    /// Empty TC=1 response (the answer did not fit).
    Truncated,
    /// Never reply.
    Silent,
    /// First a datagram with a corrupted id, then the real answer.
    WrongIdThenAnswer { ip: [u8; 4], ttl: u32 },
}

pub struct MockUdpServer {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

pub async fn spawn_udp(behavior: UdpBehavior) -> MockUdpServer {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_handle = Arc::clone(&hits);

    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            hits_handle.fetch_add(1, Ordering::SeqCst);
            let request = &buf[..len];
            match behavior {
                UdpBehavior::Silent => {}
                UdpBehavior::AnswerA { ip, ttl } => {
                    let _ = socket.send_to(&build_answer(request, ip, ttl), from).await;
                }
                UdpBehavior::Rcode(rcode) => {
                    let _ = socket.send_to(&build_rcode(request, rcode), from).await;
                }
                UdpBehavior::Truncated => {
                    let _ = socket.send_to(&build_truncated(request), from).await;
                }
                UdpBehavior::WrongIdThenAnswer { ip, ttl } => {
                    let mut bogus = build_answer(request, ip, ttl);
                    bogus[0] ^= 0xFF;
                    let _ = socket.send_to(&bogus, from).await;
                    let _ = socket.send_to(&build_answer(request, ip, ttl), from).await;
                }
            }
        }
    });

    MockUdpServer { addr, hits }
}

pub struct MockDualServer {
    pub addr: SocketAddr,
    pub udp_hits: Arc<AtomicUsize>,
    pub tcp_hits: Arc<AtomicUsize>,
    /// Transaction ids observed on each transport, stored as `id + 1`
    /// (zero means "nothing seen yet").
    pub udp_id: Arc<AtomicU32>,
    pub tcp_id: Arc<AtomicU32>,
}

/// UDP answers truncated, TCP (same endpoint) serves the real answer.
pub async fn spawn_truncating_dual(ip: [u8; 4], ttl: u32) -> MockDualServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let socket = UdpSocket::bind(addr).await.unwrap();

    let udp_hits = Arc::new(AtomicUsize::new(0));
    let tcp_hits = Arc::new(AtomicUsize::new(0));
    let udp_id = Arc::new(AtomicU32::new(0));
    let tcp_id = Arc::new(AtomicU32::new(0));

    let udp_hits_handle = Arc::clone(&udp_hits);
    let udp_id_handle = Arc::clone(&udp_id);
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            udp_hits_handle.fetch_add(1, Ordering::SeqCst);
            let request = &buf[..len];
            if let Some(id) = request_id(request) {
                udp_id_handle.store(u32::from(id) + 1, Ordering::SeqCst);
            }
            let _ = socket.send_to(&build_truncated(request), from).await;
        }
    });

    let tcp_hits_handle = Arc::clone(&tcp_hits);
    let tcp_id_handle = Arc::clone(&tcp_id);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let tcp_hits = Arc::clone(&tcp_hits_handle);
            let tcp_id = Arc::clone(&tcp_id_handle);
            tokio::spawn(async move {
                let mut len_buf = [0u8; 2];
                if stream.read_exact(&mut len_buf).await.is_err() {
                    return;
                }
                let len = u16::from_be_bytes(len_buf) as usize;
                let mut request = vec![0u8; len];
                if stream.read_exact(&mut request).await.is_err() {
                    return;
                }
                tcp_hits.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = request_id(&request) {
                    tcp_id.store(u32::from(id) + 1, Ordering::SeqCst);
                }
                let response = build_answer(&request, ip, ttl);
                let _ = stream.write_all(&(response.len() as u16).to_be_bytes()).await;
                let _ = stream.write_all(&response).await;
            });
        }
    });

    MockDualServer {
        addr,
        udp_hits,
        tcp_hits,
        udp_id,
        tcp_id,
    }
}

pub struct MockTcpServer {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

pub async fn spawn_tcp_answer(ip: [u8; 4], ttl: u32) -> MockTcpServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_handle = Arc::clone(&hits);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let hits = Arc::clone(&hits_handle);
            tokio::spawn(async move {
                let mut len_buf = [0u8; 2];
                if stream.read_exact(&mut len_buf).await.is_err() {
                    return;
                }
                let len = u16::from_be_bytes(len_buf) as usize;
                let mut request = vec![0u8; len];
                if stream.read_exact(&mut request).await.is_err() {
                    return;
                }
                hits.fetch_add(1, Ordering::SeqCst);
                let response = build_answer(&request, ip, ttl);
                let _ = stream.write_all(&(response.len() as u16).to_be_bytes()).await;
                let _ = stream.write_all(&response).await;
            });
        }
    });

    MockTcpServer { addr, hits }
}

pub fn request_id(request: &[u8]) -> Option<u16> {
    Some(u16::from_be_bytes([*request.first()?, *request.get(1)?]))
}

/// Byte offset just past QTYPE/QCLASS of the first question.
pub fn question_end(request: &[u8]) -> Option<usize> {
    let mut pos = 12;
    loop {
        let len = *request.get(pos)? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        pos += len;
    }
    let end = pos + 4;
    (end <= request.len()).then_some(end)
}

/// NOERROR response echoing the question with one A answer (owner is a
/// pointer to the question name).
pub fn build_answer(request: &[u8], ip: [u8; 4], ttl: u32) -> Vec<u8> {
    let end = question_end(request).expect("mock received a malformed request");
    let mut response = Vec::with_capacity(end + 16);
    response.extend_from_slice(&request[..2]);
    response.extend_from_slice(&[0x81, 0x80]); // QR RD RA, NOERROR
    response.extend_from_slice(&[0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
    response.extend_from_slice(&request[12..end]);
    response.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01]);
    response.extend_from_slice(&ttl.to_be_bytes());
    response.extend_from_slice(&[0x00, 0x04]);
    response.extend_from_slice(&ip);
    response
}

/// Answerless response echoing the question with the given RCODE.
pub fn build_rcode(request: &[u8], rcode: u8) -> Vec<u8> {
    let end = question_end(request).expect("mock received a malformed request");
    let mut response = Vec::with_capacity(end);
    response.extend_from_slice(&request[..2]);
    response.extend_from_slice(&[0x81, 0x80 | (rcode & 0x0F)]);
    response.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    response.extend_from_slice(&request[12..end]);
    response
}

/// Empty TC=1 response: header flags advertise truncation, question echoed.
pub fn build_truncated(request: &[u8]) -> Vec<u8> {
    let end = question_end(request).expect("mock received a malformed request");
    let mut response = Vec::with_capacity(end);
    response.extend_from_slice(&request[..2]);
    response.extend_from_slice(&[0x83, 0x80]); // QR TC RD RA
    response.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    response.extend_from_slice(&request[12..end]);
    response
}
