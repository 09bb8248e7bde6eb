use super::{DnsRequest, FLAG_RD, TYPE_OPT};
use lodestone_dns_domain::{DnsName, ResolveError};

/// Serializes a request message: 12-byte header, one question, and an OPT
/// pseudo-record in Additionals when EDNS is in use.
///
/// Compression pointers are never emitted; a single-question request has
/// nothing worth compressing.
pub fn encode_request(request: &DnsRequest) -> Result<Vec<u8>, ResolveError> {
    let question = &request.question;
    let mut buf = Vec::with_capacity(12 + question.name.wire_len() + 4 + 11);

    // Header: id, flags (OPCODE=0, optionally RD), qdcount=1, arcount=0|1.
    buf.extend_from_slice(&request.id.to_be_bytes());
    let flags: u16 = if request.recursion_desired { FLAG_RD } else { 0 };
    buf.extend_from_slice(&flags.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
    let arcount: u16 = if request.edns_payload_size.is_some() { 1 } else { 0 };
    buf.extend_from_slice(&arcount.to_be_bytes());

    encode_name(&mut buf, &question.name)?;
    buf.extend_from_slice(&question.record_type.to_u16().to_be_bytes());
    buf.extend_from_slice(&question.class.to_u16().to_be_bytes());

    if let Some(payload_size) = request.edns_payload_size {
        // OPT: root owner, type 41, class = advertised payload size,
        // TTL = (extended-rcode << 24) | (version << 16) | flags, rdlen = 0.
        buf.push(0x00);
        buf.extend_from_slice(&TYPE_OPT.to_be_bytes());
        buf.extend_from_slice(&payload_size.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
    }

    Ok(buf)
}

fn encode_name(buf: &mut Vec<u8>, name: &DnsName) -> Result<(), ResolveError> {
    for label in name.labels() {
        // DnsName construction enforces the 63-octet limit; this guards
        // against a future constructor that forgets to.
        let len = u8::try_from(label.len())
            .ok()
            .filter(|&l| l <= 63)
            .ok_or_else(|| ResolveError::InvalidName(format!("label exceeds 63 octets in '{}'", name)))?;
        buf.push(len);
        buf.extend_from_slice(label);
    }
    buf.push(0x00);
    Ok(())
}
