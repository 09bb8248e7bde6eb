//! Process-local response cache keyed by question fingerprint.
//!
//! Entries expire lazily: a read past `expires_at` treats the entry as
//! absent and removes it opportunistically. There is no background
//! eviction.

use dashmap::DashMap;
use lodestone_dns_domain::{DnsResponse, QuestionFingerprint, ResponseCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct ResponseCache {
    entries: DashMap<QuestionFingerprint, CacheEntry>,
    enabled: AtomicBool,
}

struct CacheEntry {
    response: Arc<DnsResponse>,
    expires_at: Instant,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// While disabled, `get` returns nothing and `put` is a no-op. Existing
    /// entries stay put and become visible again when re-enabled.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, fingerprint: &QuestionFingerprint) -> Option<Arc<DnsResponse>> {
        if !self.is_enabled() {
            return None;
        }
        let now = Instant::now();
        if let Some(entry) = self.entries.get(fingerprint) {
            if entry.expires_at > now {
                return Some(Arc::clone(&entry.response));
            }
        } else {
            return None;
        }
        // Expired; the read guard is released above, so removal cannot
        // deadlock against this shard.
        self.entries
            .remove_if(fingerprint, |_, entry| entry.expires_at <= now);
        None
    }

    /// Inserts the response when its computed lifetime is positive.
    ///
    /// Lifetime = `max(floor, min TTL over answers ∪ authorities ∪
    /// additionals)`; a response without answers falls back to the authority
    /// SOA minimum (RFC 2308). Responses offering neither are not cached.
    /// Only NOERROR and NXDOMAIN responses are cacheable; other RCODEs are
    /// refused.
    pub fn put(
        &self,
        fingerprint: QuestionFingerprint,
        response: Arc<DnsResponse>,
        min_ttl_floor: Option<Duration>,
        now: Instant,
    ) {
        if !self.is_enabled() {
            return;
        }
        let Some(ttl) = effective_ttl(&response, min_ttl_floor) else {
            debug!(rcode = %response.rcode(), "Response not cacheable");
            return;
        };
        debug!(ttl_secs = ttl.as_secs(), "Caching response");
        self.entries.insert(
            fingerprint,
            CacheEntry {
                response,
                expires_at: now + ttl,
            },
        );
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

fn effective_ttl(response: &DnsResponse, floor: Option<Duration>) -> Option<Duration> {
    match response.rcode() {
        ResponseCode::NoError => {}
        // negative caching rides the SOA-minimum rule below
        ResponseCode::NxDomain => {}
        _ => return None,
    }
    let base = if response.answers.is_empty() {
        response.soa_minimum_ttl()
    } else {
        response.min_ttl()
    }?;
    let secs = u64::from(base).max(floor.map_or(0, |f| f.as_secs()));
    (secs > 0).then(|| Duration::from_secs(secs))
}
