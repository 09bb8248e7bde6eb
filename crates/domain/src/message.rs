use crate::question::Question;
use crate::record::{RData, ResourceRecord};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Query,
    IQuery,
    Status,
    Unknown(u8),
}

impl OpCode {
    pub fn to_u8(self) -> u8 {
        match self {
            OpCode::Query => 0,
            OpCode::IQuery => 1,
            OpCode::Status => 2,
            OpCode::Unknown(code) => code,
        }
    }

    pub fn from_u8(code: u8) -> Self {
        match code {
            0 => OpCode::Query,
            1 => OpCode::IQuery,
            2 => OpCode::Status,
            other => OpCode::Unknown(other),
        }
    }
}

/// 4-bit response code from the DNS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    NoError,
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
    Unknown(u8),
}

impl ResponseCode {
    pub fn to_u8(self) -> u8 {
        match self {
            ResponseCode::NoError => 0,
            ResponseCode::FormErr => 1,
            ResponseCode::ServFail => 2,
            ResponseCode::NxDomain => 3,
            ResponseCode::NotImp => 4,
            ResponseCode::Refused => 5,
            ResponseCode::Unknown(code) => code,
        }
    }

    pub fn from_u8(code: u8) -> Self {
        match code {
            0 => ResponseCode::NoError,
            1 => ResponseCode::FormErr,
            2 => ResponseCode::ServFail,
            3 => ResponseCode::NxDomain,
            4 => ResponseCode::NotImp,
            5 => ResponseCode::Refused,
            other => ResponseCode::Unknown(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCode::NoError => "NOERROR",
            ResponseCode::FormErr => "FORMERR",
            ResponseCode::ServFail => "SERVFAIL",
            ResponseCode::NxDomain => "NXDOMAIN",
            ResponseCode::NotImp => "NOTIMP",
            ResponseCode::Refused => "REFUSED",
            ResponseCode::Unknown(_) => "UNKNOWN",
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, ResponseCode::NoError)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::Unknown(code) => write!(f, "RCODE{}", code),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Parsed 12-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub is_response: bool,
    pub op_code: OpCode,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub response_code: ResponseCode,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

/// A fully decoded response message plus the envelope the engine attaches:
/// the answering server, the wire size, and the optional audit transcript.
///
/// The origin server is shared by every record the response carries.
#[derive(Debug, Clone)]
pub struct DnsResponse {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
    pub server: SocketAddr,
    pub message_size: usize,
    pub audit: Option<Arc<str>>,
}

impl DnsResponse {
    pub fn rcode(&self) -> ResponseCode {
        self.header.response_code
    }

    pub fn is_truncated(&self) -> bool {
        self.header.truncated
    }

    /// Minimum TTL across answers, authorities, and additionals.
    pub fn min_ttl(&self) -> Option<u32> {
        self.answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
            .map(|r| r.ttl)
            .min()
    }

    /// The RFC 2308 negative-caching TTL: the SOA `minimum` field from the
    /// authority section, bounded by the SOA record's own TTL.
    pub fn soa_minimum_ttl(&self) -> Option<u32> {
        self.authorities.iter().find_map(|r| match &r.data {
            RData::Soa { minimum, .. } => Some((*minimum).min(r.ttl)),
            _ => None,
        })
    }

    pub fn record_count(&self) -> usize {
        self.answers.len() + self.authorities.len() + self.additionals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::DnsName;
    use crate::record::{RecordClass, RecordType};

    fn header() -> Header {
        Header {
            id: 1,
            is_response: true,
            op_code: OpCode::Query,
            authoritative: false,
            truncated: false,
            recursion_desired: true,
            recursion_available: true,
            response_code: ResponseCode::NoError,
            question_count: 1,
            answer_count: 0,
            authority_count: 0,
            additional_count: 0,
        }
    }

    fn response() -> DnsResponse {
        DnsResponse {
            header: header(),
            questions: vec![],
            answers: vec![],
            authorities: vec![],
            additionals: vec![],
            server: "192.0.2.1:53".parse().unwrap(),
            message_size: 12,
            audit: None,
        }
    }

    fn record(ttl: u32, data: RData) -> ResourceRecord {
        let record_type = match data {
            RData::Soa { .. } => RecordType::SOA,
            _ => RecordType::A,
        };
        ResourceRecord::new(
            "example.com".parse::<DnsName>().unwrap(),
            record_type,
            RecordClass::IN,
            ttl,
            data,
        )
    }

    fn soa(ttl: u32, minimum: u32) -> ResourceRecord {
        record(
            ttl,
            RData::Soa {
                mname: "ns1.example.com".parse().unwrap(),
                rname: "hostmaster.example.com".parse().unwrap(),
                serial: 1,
                refresh: 7200,
                retry: 3600,
                expire: 1209600,
                minimum,
            },
        )
    }

    #[test]
    fn min_ttl_spans_all_record_sections() {
        let mut resp = response();
        resp.answers.push(record(300, RData::A("192.0.2.1".parse().unwrap())));
        resp.additionals.push(record(60, RData::A("192.0.2.2".parse().unwrap())));
        assert_eq!(resp.min_ttl(), Some(60));
    }

    #[test]
    fn min_ttl_empty_response_is_none() {
        assert_eq!(response().min_ttl(), None);
    }

    #[test]
    fn soa_minimum_is_bounded_by_record_ttl() {
        let mut resp = response();
        resp.authorities.push(soa(120, 900));
        assert_eq!(resp.soa_minimum_ttl(), Some(120));

        let mut resp = response();
        resp.authorities.push(soa(900, 120));
        assert_eq!(resp.soa_minimum_ttl(), Some(120));
    }

    #[test]
    fn rcode_codes_round_trip() {
        for code in 0u8..16 {
            assert_eq!(ResponseCode::from_u8(code).to_u8(), code);
        }
    }
}
