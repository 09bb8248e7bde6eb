//! The query engine: cache lookup, server selection, the per-server attempt
//! loop with retry/failover classification, truncation upgrade to TCP, and
//! cooperative cancellation.

use crate::audit::AuditTrail;
use crate::cache::ResponseCache;
use crate::health::{self, ProbeGate};
use crate::pool::{ServerPool, ServerSnapshot};
use crate::protocol::{self, DnsRequest};
use crate::transport::Transport;
use lodestone_dns_domain::{
    ClientOptions, DnsName, DnsResponse, NameServer, Question, RecordClass, RecordType,
    ResolveError,
};
use smallvec::smallvec;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// Sentinel: the transaction-id counter has not been seeded yet.
const ID_UNSEEDED: u32 = u32::MAX;

/// A failed query: the error kind plus the audit transcript when the trail
/// was enabled.
#[derive(Error, Debug)]
#[error("{kind}")]
pub struct QueryError {
    kind: ResolveError,
    audit: Option<Arc<str>>,
}

impl QueryError {
    pub fn kind(&self) -> &ResolveError {
        &self.kind
    }

    pub fn into_kind(self) -> ResolveError {
        self.kind
    }

    pub fn audit(&self) -> Option<&str> {
        self.audit.as_deref()
    }
}

impl From<ResolveError> for QueryError {
    fn from(kind: ResolveError) -> Self {
        Self { kind, audit: None }
    }
}

/// Stub resolver client over a pool of recursive name servers.
///
/// Cloning is cheap and shares the pool, cache, and transaction-id counter.
/// All configuration stays mutable after construction via
/// [`DnsClient::update_options`]; each query works from a snapshot taken at
/// its start.
#[derive(Clone)]
pub struct DnsClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for DnsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsClient").finish_non_exhaustive()
    }
}

impl DnsClient {
    pub fn new(servers: Vec<NameServer>, options: ClientOptions) -> Result<Self, ResolveError> {
        if servers.is_empty() {
            return Err(ResolveError::InvalidOptions(
                "at least one name server is required".into(),
            ));
        }
        options.validate()?;
        info!(servers = servers.len(), "DNS client created");

        Ok(Self {
            inner: Arc::new(ClientInner {
                options: RwLock::new(options),
                pool: ServerPool::new(servers.into_iter().map(Arc::new).collect()),
                cache: ResponseCache::new(),
                next_id: AtomicU32::new(ID_UNSEEDED),
                probe_gate: ProbeGate::new(),
            }),
        })
    }

    /// Convenience constructor from textual endpoints (`"8.8.8.8"`,
    /// `"127.0.0.1:5353"`, `"[::1]:53"`); port 53 is the default.
    pub fn from_endpoints<S: AsRef<str>>(
        endpoints: &[S],
        options: ClientOptions,
    ) -> Result<Self, ResolveError> {
        let servers = endpoints
            .iter()
            .map(|e| {
                e.as_ref()
                    .parse::<NameServer>()
                    .map_err(ResolveError::InvalidOptions)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(servers, options)
    }

    /// A snapshot of the current options.
    pub fn options(&self) -> ClientOptions {
        self.inner
            .options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies a mutation to the options; the result must still validate.
    /// In-flight queries keep the snapshot they started with.
    pub fn update_options(
        &self,
        mutate: impl FnOnce(&mut ClientOptions),
    ) -> Result<(), ResolveError> {
        let mut guard = self
            .inner
            .options
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut updated = guard.clone();
        mutate(&mut updated);
        updated.validate()?;
        *guard = updated;
        Ok(())
    }

    pub fn servers(&self) -> Vec<SocketAddr> {
        self.inner.pool.endpoints()
    }

    pub async fn query(
        &self,
        name: &str,
        record_type: RecordType,
        class: RecordClass,
    ) -> Result<DnsResponse, QueryError> {
        let name: DnsName = name.parse().map_err(QueryError::from)?;
        self.inner
            .resolve(
                Question::new(name, record_type, class),
                CancellationToken::new(),
            )
            .await
    }

    /// Like [`DnsClient::query`] but cancellable: once `cancel` fires, the
    /// engine reports [`ResolveError::Cancelled`] instead of retrying, and
    /// the server being attempted is not marked unhealthy.
    pub async fn query_with_cancel(
        &self,
        question: Question,
        cancel: CancellationToken,
    ) -> Result<DnsResponse, QueryError> {
        self.inner.resolve(question, cancel).await
    }

    /// PTR lookup for an IP address via `in-addr.arpa` / `ip6.arpa`.
    pub async fn query_reverse(&self, ip: IpAddr) -> Result<DnsResponse, QueryError> {
        let question = Question::new(DnsName::reverse(ip), RecordType::PTR, RecordClass::IN);
        self.inner.resolve(question, CancellationToken::new()).await
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<ClientInner> {
        &self.inner
    }
}

pub(crate) struct ClientInner {
    options: RwLock<ClientOptions>,
    pool: ServerPool,
    cache: ResponseCache,
    next_id: AtomicU32,
    pub(crate) probe_gate: ProbeGate,
}

impl ClientInner {
    pub(crate) fn pool(&self) -> &ServerPool {
        &self.pool
    }

    /// Monotonically incrementing 16-bit transaction id. Reseeds from a
    /// uniform value in `[0, u16::MAX / 2)` on first use and when the
    /// counter wraps past `u16::MAX`.
    fn next_id(&self) -> u16 {
        loop {
            let current = self.next_id.load(Ordering::Relaxed);
            let candidate = if current >= u32::from(u16::MAX) {
                u32::from(fastrand::u16(..u16::MAX / 2))
            } else {
                current + 1
            };
            if self
                .next_id
                .compare_exchange(current, candidate, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return candidate as u16;
            }
        }
    }

    pub(crate) async fn resolve(
        self: &Arc<Self>,
        question: Question,
        cancel: CancellationToken,
    ) -> Result<DnsResponse, QueryError> {
        let options = self
            .options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let fingerprint = question.fingerprint();
        if options.use_cache {
            if let Some(hit) = self.cache.get(&fingerprint) {
                debug!(question = %question, "Cache hit");
                return Ok((*hit).clone());
            }
        }

        let servers = self.next_servers(&options);
        let mut audit = options.enable_audit_trail.then(AuditTrail::new);
        if let Some(trail) = audit.as_mut() {
            trail.resolver_count(servers.len());
        }

        match self
            .resolve_over(&question, &servers, &options, &mut audit, &cancel)
            .await
        {
            Ok(mut response) => {
                if options.use_cache {
                    // The cached copy never carries this query's transcript.
                    self.cache.put(
                        fingerprint,
                        Arc::new(response.clone()),
                        options.min_cache_ttl,
                        Instant::now(),
                    );
                }
                if let Some(mut trail) = audit.take() {
                    trail.footer(response.server, response.message_size);
                    response.audit = Some(trail.finish());
                }
                Ok(response)
            }
            Err(kind) => Err(QueryError {
                kind,
                audit: audit.map(AuditTrail::finish),
            }),
        }
    }

    /// One probe attempt against a single server, bypassing the cache.
    /// Success re-enables the server via the usual bookkeeping.
    pub(crate) async fn probe_server(
        self: &Arc<Self>,
        server: &Arc<NameServer>,
        question: Question,
    ) -> Result<(), ResolveError> {
        let options = self
            .options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let snapshot: ServerSnapshot = smallvec![Arc::clone(server)];
        let mut audit = None;
        self.resolve_over(
            &question,
            &snapshot,
            &options,
            &mut audit,
            &CancellationToken::new(),
        )
        .await
        .map(|_| ())
    }

    fn next_servers(self: &Arc<Self>, options: &ClientOptions) -> ServerSnapshot {
        let snapshot = self.pool.next_servers(options.use_random_server);
        self.kick_probe();
        snapshot
    }

    fn kick_probe(self: &Arc<Self>) {
        if !self.probe_gate.try_begin() {
            return;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            health::probe_disabled_servers(&inner).await;
            inner.probe_gate.finish();
        });
    }

    /// Walks the server snapshot with the per-server retry loop; restarts
    /// once on the TCP transport when a UDP response is truncated and the
    /// fallback is enabled. The upgrade keeps the transaction id and does
    /// not count against `retries`.
    async fn resolve_over(
        self: &Arc<Self>,
        question: &Question,
        servers: &ServerSnapshot,
        options: &ClientOptions,
        audit: &mut Option<AuditTrail>,
        cancel: &CancellationToken,
    ) -> Result<DnsResponse, ResolveError> {
        let request = DnsRequest {
            id: self.next_id(),
            question: question.clone(),
            recursion_desired: options.recursion_desired,
            edns_payload_size: options
                .use_extended_dns()
                .then_some(options.extended_udp_buffer_size),
        };
        let request_bytes = protocol::encode_request(&request)?;
        let udp_buffer_size = if options.use_extended_dns() {
            options.extended_udp_buffer_size
        } else {
            lodestone_dns_domain::server::PLAIN_UDP_PAYLOAD_SIZE
        };

        let mut last_dns_error: Option<ResolveError> = None;
        let mut last_response: Option<DnsResponse> = None;
        let mut last_exception: Option<ResolveError> = None;
        let mut tcp_mode = options.use_tcp_only;

        'resolution: loop {
            for server in servers {
                if cancel.is_cancelled() {
                    return Err(ResolveError::Cancelled);
                }
                let endpoint = server.endpoint();
                let mut tries: u32 = 0;

                'attempts: loop {
                    tries += 1;
                    if cancel.is_cancelled() {
                        return Err(ResolveError::Cancelled);
                    }

                    let transport = if tcp_mode {
                        Transport::tcp(endpoint)
                    } else {
                        Transport::udp(endpoint, udp_buffer_size)
                    };
                    debug!(
                        server = %endpoint,
                        protocol = transport.protocol_name(),
                        attempt = tries,
                        question = %question,
                        "Querying"
                    );

                    let attempt = async {
                        let bytes = transport
                            .exchange(&request_bytes, request.id, options.timeout)
                            .await?;
                        let response = protocol::decode_response(&bytes, endpoint)?;
                        validate_response(question, request.id, response)
                    };
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(ResolveError::Cancelled),
                        result = attempt => result,
                    };

                    match result {
                        Ok(mut response) => {
                            if response.is_truncated() && !tcp_mode && options.use_tcp_fallback {
                                debug!(server = %endpoint, "Response truncated, upgrading to TCP");
                                if let Some(trail) = audit.as_mut() {
                                    trail.tcp_upgrade();
                                }
                                tcp_mode = true;
                                continue 'resolution;
                            }

                            if let Some(trail) = audit.as_mut() {
                                trail.response(&response);
                            }
                            if let Some(size) =
                                response.additionals.iter().find_map(|r| r.opt_udp_payload_size())
                            {
                                server.set_udp_payload_size(size);
                            }
                            response.additionals.retain(|r| !r.is_opt());

                            server.record_success(question);

                            let rcode = response.rcode();
                            if rcode.is_error()
                                && (options.throw_errors || options.continue_on_dns_error)
                            {
                                debug!(server = %endpoint, rcode = %rcode, "DNS-level error, moving to next server");
                                if let Some(trail) = audit.as_mut() {
                                    trail.dns_error(endpoint, rcode);
                                }
                                last_dns_error = Some(ResolveError::DnsError {
                                    server: endpoint,
                                    rcode,
                                });
                                last_response = Some(response);
                                // a protocol-level error is not retried on this server
                                break 'attempts;
                            }

                            return Ok(response);
                        }
                        Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
                        Err(err) if err.is_transient() => {
                            if cancel.is_cancelled() {
                                return Err(ResolveError::Cancelled);
                            }
                            debug!(server = %endpoint, attempt = tries, error = %err, "Transient failure");
                            if let Some(trail) = audit.as_mut() {
                                trail.retry(endpoint, tries, &err);
                            }
                            // Timeouts fall through to ConnectionTimeout at
                            // exhaustion; other transient causes are kept.
                            if !matches!(err, ResolveError::Timeout { .. }) {
                                last_exception = Some(err);
                            }
                            if tries > options.retries {
                                self.pool.disable(server);
                                break 'attempts;
                            }
                            if !server.is_enabled() {
                                break 'attempts;
                            }
                            continue 'attempts;
                        }
                        Err(err @ ResolveError::WireFormat(_)) => {
                            warn!(server = %endpoint, error = %err, "Malformed response");
                            if let Some(trail) = audit.as_mut() {
                                trail.retry(endpoint, tries, &err);
                            }
                            last_exception = Some(err);
                            self.pool.disable(server);
                            break 'attempts;
                        }
                        Err(err) => {
                            warn!(server = %endpoint, error = %err, "Permanent transport failure");
                            if let Some(trail) = audit.as_mut() {
                                trail.retry(endpoint, tries, &err);
                            }
                            last_exception = Some(err);
                            self.pool.disable(server);
                            break 'attempts;
                        }
                    }
                }
            }

            // every server exhausted
            if let Some(err) = last_dns_error {
                if options.throw_errors {
                    return Err(err);
                }
            }
            if let Some(response) = last_response {
                return Ok(response);
            }
            if let Some(err) = last_exception {
                return Err(ResolveError::ConnectionError(Box::new(err)));
            }
            return Err(ResolveError::ConnectionTimeout {
                servers: servers.iter().map(|s| s.endpoint()).collect(),
            });
        }
    }
}

/// A response is only acceptable when its id echoes the request and its
/// question section, if present, matches what was asked.
fn validate_response(
    question: &Question,
    request_id: u16,
    response: DnsResponse,
) -> Result<DnsResponse, ResolveError> {
    if response.header.id != request_id {
        return Err(ResolveError::WireFormat(format!(
            "response id {} does not match request id {}",
            response.header.id, request_id
        )));
    }
    if let Some(echoed) = response.questions.first() {
        if echoed != question {
            return Err(ResolveError::WireFormat(format!(
                "response question '{}' does not match request '{}'",
                echoed, question
            )));
        }
    }
    Ok(response)
}
