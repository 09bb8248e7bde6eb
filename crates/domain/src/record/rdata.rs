use crate::name::DnsName;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Decoded rdata, polymorphic over the record type.
///
/// Types without a dedicated decoder are preserved raw in `Unknown` so a
/// response survives a round through the library without losing data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ns(DnsName),
    Cname(DnsName),
    Ptr(DnsName),
    Mx {
        preference: u16,
        exchange: DnsName,
    },
    Txt(Vec<String>),
    Soa {
        mname: DnsName,
        rname: DnsName,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: DnsName,
    },
    Opt {
        data: Vec<u8>,
    },
    Unknown {
        type_code: u16,
        data: Vec<u8>,
    },
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(ip) => write!(f, "{}", ip),
            RData::Aaaa(ip) => write!(f, "{}", ip),
            RData::Ns(name) => write!(f, "{}.", name),
            RData::Cname(name) => write!(f, "{}.", name),
            RData::Ptr(name) => write!(f, "{}.", name),
            RData::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}.", preference, exchange),
            RData::Txt(strings) => {
                for (i, s) in strings.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "\"{}\"", s)?;
                }
                Ok(())
            }
            RData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{}. {}. {} {} {} {} {}",
                mname, rname, serial, refresh, retry, expire, minimum
            ),
            RData::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}.", priority, weight, port, target),
            RData::Opt { data } | RData::Unknown { data, .. } => {
                // RFC 3597 generic presentation
                write!(f, "\\# {}", data.len())?;
                if !data.is_empty() {
                    write!(f, " ")?;
                    for b in data {
                        write!(f, "{:02x}", b)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_records_render_bare() {
        assert_eq!(RData::A("192.0.2.7".parse().unwrap()).to_string(), "192.0.2.7");
        assert_eq!(RData::Aaaa("2001:db8::1".parse().unwrap()).to_string(), "2001:db8::1");
    }

    #[test]
    fn mx_renders_preference_then_exchange() {
        let rdata = RData::Mx {
            preference: 10,
            exchange: "mail.example.com".parse().unwrap(),
        };
        assert_eq!(rdata.to_string(), "10 mail.example.com.");
    }

    #[test]
    fn txt_quotes_each_string() {
        let rdata = RData::Txt(vec!["v=spf1".into(), "-all".into()]);
        assert_eq!(rdata.to_string(), "\"v=spf1\" \"-all\"");
    }

    #[test]
    fn soa_renders_all_seven_fields() {
        let rdata = RData::Soa {
            mname: "ns1.example.com".parse().unwrap(),
            rname: "hostmaster.example.com".parse().unwrap(),
            serial: 2024010101,
            refresh: 7200,
            retry: 3600,
            expire: 1209600,
            minimum: 300,
        };
        assert_eq!(
            rdata.to_string(),
            "ns1.example.com. hostmaster.example.com. 2024010101 7200 3600 1209600 300"
        );
    }

    #[test]
    fn unknown_uses_generic_presentation() {
        let rdata = RData::Unknown {
            type_code: 4711,
            data: vec![0xDE, 0xAD],
        };
        assert_eq!(rdata.to_string(), "\\# 2 dead");

        let empty = RData::Unknown {
            type_code: 4711,
            data: vec![],
        };
        assert_eq!(empty.to_string(), "\\# 0");
    }
}
