use crate::errors::ResolveError;
use crate::server::PLAIN_UDP_PAYLOAD_SIZE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Behavior knobs for a resolver client.
///
/// Every field may be changed after construction; a query snapshots the
/// options once at its start so a mid-flight change never splits one logical
/// query across two configurations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientOptions {
    /// Re-issue the query over TCP when a UDP response has TC=1.
    #[serde(default = "default_true")]
    pub use_tcp_fallback: bool,

    /// Skip UDP entirely and query over TCP from the start.
    #[serde(default = "default_false")]
    pub use_tcp_only: bool,

    /// Collect a human-readable per-query transcript and attach it to the
    /// response (or the error).
    #[serde(default = "default_false")]
    pub enable_audit_trail: bool,

    /// Set the RD bit on outgoing requests.
    #[serde(default = "default_true")]
    pub recursion_desired: bool,

    /// Additional attempts per server beyond the first (0 = one attempt).
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Surface RCODE errors as failures instead of returning the response.
    #[serde(default = "default_false")]
    pub throw_errors: bool,

    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Raises any positive computed cache TTL to at least this value. When
    /// set, zero-TTL responses become cacheable at the floor.
    #[serde(default)]
    pub min_cache_ttl: Option<Duration>,

    /// Rotate the server pool by one position per query (round-robin).
    #[serde(default = "default_true")]
    pub use_random_server: bool,

    /// On RCODE ≠ NOERROR, record the error and move to the next server
    /// instead of propagating immediately.
    #[serde(default = "default_true")]
    pub continue_on_dns_error: bool,

    /// Per-attempt deadline. `Duration::MAX` means no deadline; anything
    /// else must be non-zero and at most `i32::MAX` milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// UDP payload size advertised via EDNS(0). A value of 512 disables the
    /// OPT record entirely (plain RFC 1035 framing).
    #[serde(default = "default_udp_buffer_size")]
    pub extended_udp_buffer_size: u16,
}

impl ClientOptions {
    /// EDNS is in use exactly when the advertised buffer exceeds the plain
    /// 512-octet limit.
    pub fn use_extended_dns(&self) -> bool {
        self.extended_udp_buffer_size > PLAIN_UDP_PAYLOAD_SIZE
    }

    pub fn is_timeout_infinite(&self) -> bool {
        self.timeout == Duration::MAX
    }

    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.timeout.is_zero() {
            return Err(ResolveError::InvalidOptions(
                "timeout must be greater than zero".into(),
            ));
        }
        if !self.is_timeout_infinite() && self.timeout.as_millis() > i32::MAX as u128 {
            return Err(ResolveError::InvalidOptions(format!(
                "timeout must be at most {}ms or infinite",
                i32::MAX
            )));
        }
        if self.extended_udp_buffer_size < PLAIN_UDP_PAYLOAD_SIZE {
            return Err(ResolveError::InvalidOptions(format!(
                "extended_udp_buffer_size must be at least {}",
                PLAIN_UDP_PAYLOAD_SIZE
            )));
        }
        Ok(())
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            use_tcp_fallback: true,
            use_tcp_only: false,
            enable_audit_trail: false,
            recursion_desired: true,
            retries: default_retries(),
            throw_errors: false,
            use_cache: true,
            min_cache_ttl: None,
            use_random_server: true,
            continue_on_dns_error: true,
            timeout: default_timeout(),
            extended_udp_buffer_size: default_udp_buffer_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_retries() -> u32 {
    5
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_udp_buffer_size() -> u16 {
    4096
}
