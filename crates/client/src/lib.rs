//! Stub DNS resolver client.
//!
//! The entry point is [`DnsClient`]: given one or more recursive name
//! servers it serializes RFC 1035 queries, exchanges them over UDP with TCP
//! fallback on truncation, caches responses with TTL honoring, and drives
//! retries, failover, and background health probing across the pool.
//!
//! ```no_run
//! use lodestone_dns_client::{DnsClient, RecordClass, RecordType};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DnsClient::from_endpoints(&["8.8.8.8", "1.1.1.1"], Default::default())?;
//! let response = client.query("example.com", RecordType::A, RecordClass::IN).await?;
//! for record in &response.answers {
//!     println!("{}", record);
//! }
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod blocking;
pub mod cache;
mod client;
pub mod health;
pub mod pool;
pub mod protocol;
pub mod transport;

pub use blocking::BlockingClient;
pub use client::{DnsClient, QueryError};

pub use lodestone_dns_domain::{
    ClientOptions, DnsName, DnsResponse, NameServer, Question, RData, RecordClass, RecordType,
    ResolveError, ResourceRecord,
};
