//! Synchronous facade over the async engine.
//!
//! Owns a current-thread runtime and drives the exact same code paths with
//! `block_on`, so both call styles share one state machine, one audit
//! trail, and one error classification.

use crate::client::{DnsClient, QueryError};
use lodestone_dns_domain::{
    ClientOptions, DnsResponse, NameServer, Question, RecordClass, RecordType, ResolveError,
};
use std::net::IpAddr;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

pub struct BlockingClient {
    client: DnsClient,
    runtime: Runtime,
}

impl BlockingClient {
    pub fn new(servers: Vec<NameServer>, options: ClientOptions) -> Result<Self, ResolveError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                ResolveError::InvalidOptions(format!("cannot start blocking runtime: {}", e))
            })?;
        Ok(Self {
            client: DnsClient::new(servers, options)?,
            runtime,
        })
    }

    pub fn from_endpoints<S: AsRef<str>>(
        endpoints: &[S],
        options: ClientOptions,
    ) -> Result<Self, ResolveError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                ResolveError::InvalidOptions(format!("cannot start blocking runtime: {}", e))
            })?;
        Ok(Self {
            client: DnsClient::from_endpoints(endpoints, options)?,
            runtime,
        })
    }

    pub fn query(
        &self,
        name: &str,
        record_type: RecordType,
        class: RecordClass,
    ) -> Result<DnsResponse, QueryError> {
        self.runtime
            .block_on(self.client.query(name, record_type, class))
    }

    pub fn query_with_cancel(
        &self,
        question: Question,
        cancel: CancellationToken,
    ) -> Result<DnsResponse, QueryError> {
        self.runtime
            .block_on(self.client.query_with_cancel(question, cancel))
    }

    pub fn query_reverse(&self, ip: IpAddr) -> Result<DnsResponse, QueryError> {
        self.runtime.block_on(self.client.query_reverse(ip))
    }

    pub fn options(&self) -> ClientOptions {
        self.client.options()
    }

    pub fn update_options(
        &self,
        mutate: impl FnOnce(&mut ClientOptions),
    ) -> Result<(), ResolveError> {
        self.client.update_options(mutate)
    }
}
