use super::{
    FLAG_AA, FLAG_QR, FLAG_RA, FLAG_RD, FLAG_TC, OPCODE_MASK, OPCODE_SHIFT, RCODE_MASK,
};
use lodestone_dns_domain::message::{Header, OpCode, ResponseCode};
use lodestone_dns_domain::{
    DnsName, DnsResponse, Question, RData, RecordClass, RecordType, ResolveError, ResourceRecord,
};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

/// Decodes a full response message.
///
/// Truncation (TC=1) is surfaced on the header, not treated as an error.
/// Unknown record types are preserved with their raw rdata. Any framing
/// violation — short read, oversized label or name, pointer that does not
/// point strictly earlier, reserved label type — fails with
/// [`ResolveError::WireFormat`].
pub fn decode_response(bytes: &[u8], server: SocketAddr) -> Result<DnsResponse, ResolveError> {
    let mut reader = Reader::new(bytes);
    let header = decode_header(&mut reader)?;

    let mut questions = Vec::with_capacity(header.question_count as usize);
    for _ in 0..header.question_count {
        questions.push(decode_question(&mut reader)?);
    }
    let answers = decode_records(&mut reader, header.answer_count)?;
    let authorities = decode_records(&mut reader, header.authority_count)?;
    let additionals = decode_records(&mut reader, header.additional_count)?;

    Ok(DnsResponse {
        header,
        questions,
        answers,
        authorities,
        additionals,
        server,
        message_size: bytes.len(),
        audit: None,
    })
}

fn decode_header(reader: &mut Reader<'_>) -> Result<Header, ResolveError> {
    let id = reader.read_u16()?;
    let flags = reader.read_u16()?;
    let question_count = reader.read_u16()?;
    let answer_count = reader.read_u16()?;
    let authority_count = reader.read_u16()?;
    let additional_count = reader.read_u16()?;

    Ok(Header {
        id,
        is_response: flags & FLAG_QR != 0,
        op_code: OpCode::from_u8(((flags & OPCODE_MASK) >> OPCODE_SHIFT) as u8),
        authoritative: flags & FLAG_AA != 0,
        truncated: flags & FLAG_TC != 0,
        recursion_desired: flags & FLAG_RD != 0,
        recursion_available: flags & FLAG_RA != 0,
        response_code: ResponseCode::from_u8((flags & RCODE_MASK) as u8),
        question_count,
        answer_count,
        authority_count,
        additional_count,
    })
}

fn decode_question(reader: &mut Reader<'_>) -> Result<Question, ResolveError> {
    let name = reader.read_name()?;
    let record_type = RecordType::from_u16(reader.read_u16()?);
    let class = RecordClass::from_u16(reader.read_u16()?);
    Ok(Question::new(name, record_type, class))
}

fn decode_records(
    reader: &mut Reader<'_>,
    count: u16,
) -> Result<Vec<ResourceRecord>, ResolveError> {
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = reader.read_name()?;
        let type_code = reader.read_u16()?;
        let class = RecordClass::from_u16(reader.read_u16()?);
        let ttl = reader.read_u32()?;
        let rdlen = reader.read_u16()? as usize;
        if reader.remaining() < rdlen {
            return Err(ResolveError::WireFormat(format!(
                "rdata advertises {} octets but only {} remain",
                rdlen,
                reader.remaining()
            )));
        }
        let data = decode_rdata(reader, type_code, rdlen)?;
        records.push(ResourceRecord::new(
            name,
            RecordType::from_u16(type_code),
            class,
            ttl,
            data,
        ));
    }
    Ok(records)
}

/// Per-type rdata dispatch. Names inside rdata may be compressed against the
/// whole message; the rdata boundary is enforced after decoding.
fn decode_rdata(
    reader: &mut Reader<'_>,
    type_code: u16,
    rdlen: usize,
) -> Result<RData, ResolveError> {
    let end = reader.pos + rdlen;
    let data = match RecordType::from_u16(type_code) {
        RecordType::A => {
            let octets: [u8; 4] = reader
                .take(rdlen)?
                .try_into()
                .map_err(|_| ResolveError::WireFormat("A rdata must be 4 octets".into()))?;
            RData::A(Ipv4Addr::from(octets))
        }
        RecordType::AAAA => {
            let octets: [u8; 16] = reader
                .take(rdlen)?
                .try_into()
                .map_err(|_| ResolveError::WireFormat("AAAA rdata must be 16 octets".into()))?;
            RData::Aaaa(Ipv6Addr::from(octets))
        }
        RecordType::NS => RData::Ns(reader.read_name()?),
        RecordType::CNAME => RData::Cname(reader.read_name()?),
        RecordType::PTR => RData::Ptr(reader.read_name()?),
        RecordType::MX => RData::Mx {
            preference: reader.read_u16()?,
            exchange: reader.read_name()?,
        },
        RecordType::TXT => {
            let mut strings = Vec::new();
            while reader.pos < end {
                let len = reader.read_u8()? as usize;
                let chunk = reader.take(len)?;
                strings.push(String::from_utf8_lossy(chunk).into_owned());
            }
            RData::Txt(strings)
        }
        RecordType::SOA => RData::Soa {
            mname: reader.read_name()?,
            rname: reader.read_name()?,
            serial: reader.read_u32()?,
            refresh: reader.read_u32()?,
            retry: reader.read_u32()?,
            expire: reader.read_u32()?,
            minimum: reader.read_u32()?,
        },
        RecordType::SRV => RData::Srv {
            priority: reader.read_u16()?,
            weight: reader.read_u16()?,
            port: reader.read_u16()?,
            target: reader.read_name()?,
        },
        RecordType::OPT => RData::Opt {
            data: reader.take(rdlen)?.to_vec(),
        },
        RecordType::Unknown(code) => RData::Unknown {
            type_code: code,
            data: reader.take(rdlen)?.to_vec(),
        },
    };
    if reader.pos != end {
        return Err(ResolveError::WireFormat(format!(
            "rdata length mismatch for type {}: expected end {}, reached {}",
            type_code, end, reader.pos
        )));
    }
    Ok(data)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_u8(&mut self) -> Result<u8, ResolveError> {
        let b = *self.buf.get(self.pos).ok_or_else(short_read)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u16(&mut self) -> Result<u16, ResolveError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, ResolveError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ResolveError> {
        if self.remaining() < n {
            return Err(short_read());
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Decodes a possibly compressed name.
    ///
    /// Pointer targets must decrease strictly: the first must point before
    /// its own offset, every later one before the previous target. That rule
    /// terminates any loop and matches how real encoders emit chains.
    fn read_name(&mut self) -> Result<DnsName, ResolveError> {
        let mut labels: Vec<Vec<u8>> = Vec::new();
        let mut cursor = self.pos;
        let mut resume: Option<usize> = None;
        let mut max_target = usize::MAX;
        let mut wire_len = 1usize;

        loop {
            let len_byte = *self.buf.get(cursor).ok_or_else(short_read)? as usize;
            match len_byte & 0xC0 {
                0x00 => {
                    cursor += 1;
                    if len_byte == 0 {
                        if resume.is_none() {
                            resume = Some(cursor);
                        }
                        break;
                    }
                    if cursor + len_byte > self.buf.len() {
                        return Err(short_read());
                    }
                    wire_len += len_byte + 1;
                    if wire_len > 255 {
                        return Err(ResolveError::WireFormat(
                            "name exceeds 255 octets after decompression".into(),
                        ));
                    }
                    labels.push(self.buf[cursor..cursor + len_byte].to_vec());
                    cursor += len_byte;
                }
                0xC0 => {
                    let low = *self.buf.get(cursor + 1).ok_or_else(short_read)? as usize;
                    let target = ((len_byte & 0x3F) << 8) | low;
                    if target >= max_target.min(cursor) {
                        return Err(ResolveError::WireFormat(
                            "compression pointer does not point strictly earlier".into(),
                        ));
                    }
                    if resume.is_none() {
                        resume = Some(cursor + 2);
                    }
                    max_target = target;
                    cursor = target;
                }
                // 0b01 and 0b10 label types are reserved (RFC 1035 §4.1.4)
                _ => {
                    return Err(ResolveError::WireFormat(format!(
                        "reserved label type 0x{:02X}",
                        len_byte & 0xC0
                    )))
                }
            }
        }

        // resume is always set by the loop before it breaks
        if let Some(pos) = resume {
            self.pos = pos;
        }
        DnsName::from_labels(labels).map_err(|e| ResolveError::WireFormat(e.to_string()))
    }
}

fn short_read() -> ResolveError {
    ResolveError::WireFormat("message ended unexpectedly".into())
}
