//! Optional per-query transcript, rendered dig-style.
//!
//! One trail belongs to one logical query: it is carried through retries,
//! failover, and the TCP upgrade, then attached to the returned response or
//! the propagated error. Append-only, never shared across queries.

use lodestone_dns_domain::{DnsResponse, ResolveError, ResourceRecord, ResponseCode};
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use time::format_description::well_known::Rfc2822;
use time::OffsetDateTime;

pub struct AuditTrail {
    buf: String,
    start: Instant,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            start: Instant::now(),
        }
    }

    pub fn resolver_count(&mut self, count: usize) {
        let _ = writeln!(self.buf, "; ({} server found)", count);
    }

    /// Header summary, RCODE error line, EDNS OPT line, and the four section
    /// dumps, in that order. The OPT pseudo-record is rendered on its own
    /// line and excluded from the additional section dump.
    pub fn response(&mut self, response: &DnsResponse) {
        let header = &response.header;
        let _ = writeln!(self.buf, ";; Got answer:");
        let _ = writeln!(
            self.buf,
            ";; ->>HEADER<<- opcode: {:?}, status: {}, id: {}",
            header.op_code,
            header.response_code.as_str(),
            header.id
        );
        let mut flags = String::new();
        for (set, label) in [
            (header.is_response, "qr"),
            (header.authoritative, "aa"),
            (header.truncated, "tc"),
            (header.recursion_desired, "rd"),
            (header.recursion_available, "ra"),
        ] {
            if set {
                flags.push(' ');
                flags.push_str(label);
            }
        }
        let _ = writeln!(
            self.buf,
            ";; flags:{}; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
            flags,
            header.question_count,
            header.answer_count,
            header.authority_count,
            header.additional_count
        );

        if header.response_code.is_error() {
            let _ = writeln!(self.buf, ";; ERROR: {}", header.response_code);
        }

        if let Some(opt) = response.additionals.iter().find(|r| r.is_opt()) {
            let _ = writeln!(self.buf, "\n;; OPT PSEUDOSECTION:");
            let _ = writeln!(
                self.buf,
                "; EDNS: version: {}; udp: {}",
                (opt.ttl >> 16) & 0xFF,
                opt.opt_udp_payload_size().unwrap_or(0)
            );
        }

        if !response.questions.is_empty() {
            let _ = writeln!(self.buf, "\n;; QUESTION SECTION:");
            for question in &response.questions {
                let _ = writeln!(self.buf, ";{}", question);
            }
        }
        self.section("ANSWER", &response.answers);
        self.section("AUTHORITY", &response.authorities);
        self.section(
            "ADDITIONAL",
            &response
                .additionals
                .iter()
                .filter(|r| !r.is_opt())
                .cloned()
                .collect::<Vec<_>>(),
        );
    }

    fn section(&mut self, title: &str, records: &[ResourceRecord]) {
        if records.is_empty() {
            return;
        }
        let _ = writeln!(self.buf, "\n;; {} SECTION:", title);
        for record in records {
            let _ = writeln!(self.buf, "{}", record);
        }
    }

    /// Inline retry boundary: which attempt on which server failed and how.
    pub fn retry(&mut self, server: SocketAddr, tries: u32, error: &ResolveError) {
        let _ = writeln!(
            self.buf,
            ";; Attempt {} on {} failed: {}",
            tries, server, error
        );
    }

    pub fn dns_error(&mut self, server: SocketAddr, rcode: ResponseCode) {
        let _ = writeln!(self.buf, ";; {} answered {}, moving on", server, rcode);
    }

    pub fn tcp_upgrade(&mut self) {
        let _ = writeln!(self.buf, ";; Truncated, retrying in TCP mode.");
    }

    /// Elapsed time, chosen server, UTC timestamp, and message size.
    pub fn footer(&mut self, server: SocketAddr, message_size: usize) {
        let _ = writeln!(
            self.buf,
            "\n;; Query time: {} msec",
            self.start.elapsed().as_millis()
        );
        let _ = writeln!(self.buf, ";; SERVER: {}#{}", server.ip(), server.port());
        let when = OffsetDateTime::now_utc()
            .format(&Rfc2822)
            .unwrap_or_else(|_| "unknown".to_string());
        let _ = writeln!(self.buf, ";; WHEN: {}", when);
        let _ = writeln!(self.buf, ";; MSG SIZE  rcvd: {}", message_size);
    }

    pub fn finish(self) -> Arc<str> {
        Arc::from(self.buf)
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new()
    }
}
