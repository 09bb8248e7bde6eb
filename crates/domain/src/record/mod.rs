mod rdata;
mod record_class;
mod record_type;

pub use rdata::RData;
pub use record_class::RecordClass;
pub use record_type::RecordType;

use crate::name::DnsName;
use std::fmt;

/// A decoded resource record from any non-question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: DnsName,
    pub record_type: RecordType,
    pub class: RecordClass,
    pub ttl: u32,
    pub data: RData,
}

impl ResourceRecord {
    pub fn new(
        name: DnsName,
        record_type: RecordType,
        class: RecordClass,
        ttl: u32,
        data: RData,
    ) -> Self {
        Self {
            name,
            record_type,
            class,
            ttl,
            data,
        }
    }

    pub fn is_opt(&self) -> bool {
        self.record_type == RecordType::OPT
    }

    /// For OPT pseudo-records the class field carries the advertised UDP
    /// payload size (RFC 6891 §6.1.2).
    pub fn opt_udp_payload_size(&self) -> Option<u16> {
        self.is_opt().then(|| self.class.to_u16())
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. {} {} {} {}",
            self.name, self.ttl, self.class, self.record_type, self.data
        )
    }
}
