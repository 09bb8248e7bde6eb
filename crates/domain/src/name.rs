use crate::errors::ResolveError;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Maximum presentation length of a domain name (RFC 1035 §2.3.4: 255 wire
/// octets including length prefixes, i.e. 253 presentation characters).
pub const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label.
pub const MAX_LABEL_LEN: usize = 63;

/// A domain name as a sequence of labels.
///
/// Labels are stored as raw octets: comparison and hashing are
/// case-insensitive over ASCII, non-ASCII octets compare bit-for-bit.
/// The original spelling is preserved for display.
#[derive(Debug, Clone, Default)]
pub struct DnsName {
    labels: Vec<Vec<u8>>,
}

impl DnsName {
    /// The root name (`.`).
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    /// Builds a name from decoded labels, enforcing the RFC 1035 limits.
    pub fn from_labels(labels: Vec<Vec<u8>>) -> Result<Self, ResolveError> {
        let mut wire_len = 1usize;
        for label in &labels {
            if label.is_empty() {
                return Err(ResolveError::InvalidName("empty label".into()));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(ResolveError::InvalidName(format!(
                    "label exceeds {} octets",
                    MAX_LABEL_LEN
                )));
            }
            wire_len += label.len() + 1;
        }
        if wire_len > MAX_NAME_LEN + 2 {
            return Err(ResolveError::InvalidName(format!(
                "name exceeds {} octets on the wire",
                MAX_NAME_LEN + 2
            )));
        }
        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Encoded length: one length octet per label plus the terminating zero.
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// Canonical lowercase presentation form, used for cache fingerprints.
    /// ASCII letters are lowercased; any other octet passes through.
    pub fn canonical(&self) -> String {
        if self.is_root() {
            return ".".to_string();
        }
        let mut out = String::with_capacity(self.wire_len());
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            for &b in label {
                out.push(b.to_ascii_lowercase() as char);
            }
        }
        out
    }

    /// The reverse-lookup name for an IP address: `in-addr.arpa` for IPv4,
    /// nibble-reversed `ip6.arpa` for IPv6 (RFC 1035 §3.5, RFC 3596 §2.5).
    pub fn reverse(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::reverse_v4(v4),
            IpAddr::V6(v6) => Self::reverse_v6(v6),
        }
    }

    fn reverse_v4(ip: Ipv4Addr) -> Self {
        let o = ip.octets();
        let mut labels: Vec<Vec<u8>> = o.iter().rev().map(|b| b.to_string().into_bytes()).collect();
        labels.push(b"in-addr".to_vec());
        labels.push(b"arpa".to_vec());
        Self { labels }
    }

    fn reverse_v6(ip: Ipv6Addr) -> Self {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut labels: Vec<Vec<u8>> = Vec::with_capacity(34);
        for byte in ip.octets().iter().rev() {
            labels.push(vec![HEX[(byte & 0x0F) as usize]]);
            labels.push(vec![HEX[(byte >> 4) as usize]]);
        }
        labels.push(b"ip6".to_vec());
        labels.push(b"arpa".to_vec());
        Self { labels }
    }
}

impl FromStr for DnsName {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "." {
            return Ok(Self::root());
        }
        let trimmed = s.strip_suffix('.').unwrap_or(s);
        if trimmed.len() > MAX_NAME_LEN {
            return Err(ResolveError::InvalidName(format!(
                "name exceeds {} characters: '{}'",
                MAX_NAME_LEN, s
            )));
        }
        let labels: Vec<Vec<u8>> = trimmed
            .split('.')
            .map(|l| l.as_bytes().to_vec())
            .collect();
        for label in &labels {
            if label.is_empty() {
                return Err(ResolveError::InvalidName(format!(
                    "empty label in '{}'",
                    s
                )));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(ResolveError::InvalidName(format!(
                    "label exceeds {} octets in '{}'",
                    MAX_LABEL_LEN, s
                )));
            }
        }
        Ok(Self { labels })
    }
}

impl fmt::Display for DnsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, ".");
        }
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            for &b in label {
                if b.is_ascii_graphic() && b != b'.' {
                    write!(f, "{}", b as char)?;
                } else {
                    write!(f, "\\{:03}", b)?;
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for DnsName {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(&other.labels)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for DnsName {}

impl Hash for DnsName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.labels.len().hash(state);
        for label in &self.labels {
            for &b in label {
                b.to_ascii_lowercase().hash(state);
            }
            0xFFu8.hash(state);
        }
    }
}
