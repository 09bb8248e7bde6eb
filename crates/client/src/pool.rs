//! Ordered name-server pool with round-robin rotation and degraded mode.

use lodestone_dns_domain::NameServer;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// The per-query server snapshot. Most deployments configure a handful of
/// resolvers, so the snapshot lives on the stack.
pub type ServerSnapshot = SmallVec<[Arc<NameServer>; 4]>;

pub struct ServerPool {
    servers: Mutex<VecDeque<Arc<NameServer>>>,
    len: usize,
}

impl ServerPool {
    pub fn new(servers: Vec<Arc<NameServer>>) -> Self {
        let len = servers.len();
        Self {
            servers: Mutex::new(servers.into()),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The snapshot one logical query walks, in order.
    ///
    /// A single-server pool returns that server unconditionally. Otherwise
    /// the enabled subset is returned; when every server is disabled the
    /// full set is returned instead (degraded mode) so the engine can
    /// recover. With `rotate` the backing order advances by one position
    /// afterwards, yielding round-robin across successive queries, not
    /// per-attempt randomness.
    pub fn next_servers(&self, rotate: bool) -> ServerSnapshot {
        let mut servers = self
            .servers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if servers.len() == 1 {
            return servers.iter().cloned().collect();
        }

        let mut snapshot: ServerSnapshot =
            servers.iter().filter(|s| s.is_enabled()).cloned().collect();
        if snapshot.is_empty() {
            debug!("All servers disabled, returning full set (degraded mode)");
            snapshot = servers.iter().cloned().collect();
        }

        if rotate {
            if let Some(front) = servers.pop_front() {
                servers.push_back(front);
            }
        }

        snapshot
    }

    /// Marks a server unhealthy. A single-server pool is never disabled:
    /// the engine must keep trying its only resolver.
    pub fn disable(&self, server: &NameServer) {
        if self.len <= 1 {
            debug!(server = %server.endpoint(), "Single-server pool, not disabling");
            return;
        }
        warn!(server = %server.endpoint(), "Disabling server");
        server.set_enabled(false);
    }

    pub fn servers(&self) -> Vec<Arc<NameServer>> {
        self.servers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn endpoints(&self) -> Vec<SocketAddr> {
        self.servers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.endpoint())
            .collect()
    }
}
