use crate::question::Question;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_DNS_PORT: u16 = 53;

/// Payload ceiling for plain (non-EDNS) UDP exchanges, RFC 1035 §4.2.1.
pub const PLAIN_UDP_PAYLOAD_SIZE: u16 = 512;

/// One configured recursive name server.
///
/// The health flag, the negotiated EDNS payload size, and the last question
/// that succeeded against this server are shared mutable state: the engine
/// updates them from whichever query happens to touch the server, and the
/// pool and health prober read them concurrently. Races are harmless — the
/// worst outcome is one extra attempt against a bad server.
#[derive(Debug)]
pub struct NameServer {
    endpoint: SocketAddr,
    enabled: AtomicBool,
    udp_payload_size: AtomicU16,
    last_successful_question: Mutex<Option<Question>>,
}

impl NameServer {
    pub fn new(endpoint: SocketAddr) -> Self {
        Self {
            endpoint,
            enabled: AtomicBool::new(true),
            udp_payload_size: AtomicU16::new(PLAIN_UDP_PAYLOAD_SIZE),
            last_successful_question: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// The UDP payload size this server negotiated via EDNS OPT, never below
    /// the plain 512-octet floor.
    pub fn udp_payload_size(&self) -> u16 {
        self.udp_payload_size.load(Ordering::Relaxed)
    }

    pub fn set_udp_payload_size(&self, size: u16) {
        self.udp_payload_size
            .store(size.max(PLAIN_UDP_PAYLOAD_SIZE), Ordering::Relaxed);
    }

    pub fn last_successful_question(&self) -> Option<Question> {
        self.last_successful_question
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records a successful exchange: re-enables the server and remembers the
    /// question for later health probes.
    pub fn record_success(&self, question: &Question) {
        self.set_enabled(true);
        *self
            .last_successful_question
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(question.clone());
    }
}

impl FromStr for NameServer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Bare address first ("8.8.8.8", "::1"), then addr:port forms
        // including bracketed IPv6 ("[2001:db8::1]:5353").
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::new(SocketAddr::new(ip, DEFAULT_DNS_PORT)));
        }
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Self::new(addr));
        }
        Err(format!(
            "Invalid name server endpoint '{}'. Expected IP, IP:PORT, or [IPv6]:PORT",
            s
        ))
    }
}

impl fmt::Display for NameServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint)
    }
}
