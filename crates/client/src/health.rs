//! Background re-probing of disabled servers.
//!
//! Probing is driven by server selection rather than a standing task: every
//! pool snapshot kicks the gate, which fires at most once per 30-second
//! window and never runs two cycles concurrently. A disabled server is
//! probed with the last question that succeeded against it, bypassing the
//! cache; success re-enables it, every failure is swallowed.

use crate::client::ClientInner;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const PROBE_INTERVAL_SECS: i32 = 30;

/// Overall deadline for one probe cycle's query against one server.
pub(crate) const PROBE_DEADLINE: Duration = Duration::from_secs(60);

/// Non-reentrant rate gate over a packed `(last_check_tick, running)` pair.
///
/// The tick is seconds since client construction, wrapped into a signed
/// 32-bit counter; when the pair would overflow, the baseline resets to zero
/// and the next window starts fresh.
pub(crate) struct ProbeGate {
    // bits 32..64: last probe tick (i32), bit 0: cycle running
    state: AtomicU64,
    started: Instant,
}

impl ProbeGate {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    fn tick(&self) -> i32 {
        self.started.elapsed().as_secs() as i32
    }

    /// Claims the probe slot when a cycle is due and none is running.
    /// A successful claim must be released with [`ProbeGate::finish`].
    pub(crate) fn try_begin(&self) -> bool {
        let tick = self.tick();
        loop {
            let current = self.state.load(Ordering::Acquire);
            if current & 1 == 1 {
                return false;
            }
            let last_tick = (current >> 32) as i32;
            let since = if tick >= last_tick {
                tick - last_tick
            } else {
                // tick counter overflowed; restart the window from zero
                tick
            };
            if since < PROBE_INTERVAL_SECS {
                return false;
            }
            let next = ((tick as u32 as u64) << 32) | 1;
            if self
                .state
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub(crate) fn finish(&self) {
        self.state.fetch_and(!1u64, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn force_due(&self) {
        let rewound = (-(PROBE_INTERVAL_SECS + 1)) as u32 as u64;
        self.state.store(rewound << 32, Ordering::Release);
    }
}

/// One probe cycle: re-query every disabled server that has a remembered
/// successful question. Errors and timeouts are logged and swallowed.
pub(crate) async fn probe_disabled_servers(inner: &Arc<ClientInner>) {
    for server in inner.pool().servers() {
        if server.is_enabled() {
            continue;
        }
        let Some(question) = server.last_successful_question() else {
            continue;
        };
        debug!(server = %server.endpoint(), question = %question, "Re-probing disabled server");

        match tokio::time::timeout(PROBE_DEADLINE, inner.probe_server(&server, question)).await {
            Ok(Ok(())) => {
                info!(server = %server.endpoint(), "Server re-enabled by health probe");
            }
            Ok(Err(e)) => {
                debug!(server = %server.endpoint(), error = %e, "Health probe failed");
            }
            Err(_) => {
                debug!(server = %server.endpoint(), "Health probe timed out");
            }
        }
    }
}
