//! DNS wire-format decoding
//!
//! Only the header and the first question are decoded; that is all a
//! captured send needs to be labelled. Answers are never parsed.

use bytes::Buf;
use std::fmt;

/// DNS header length (RFC 1035 section 4.1.1)
const HEADER_LEN: usize = 12;

/// Longest label allowed on the wire
const MAX_LABEL_LEN: usize = 63;

/// Longest presentation-format name
const MAX_NAME_LEN: usize = 255;

/// QR bit in the header flags
const FLAG_RESPONSE: u16 = 0x8000;

/// DNS record types (RFC 1035 section 3.2.2, RFC 3596, RFC 9460)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    A,
    Ns,
    Cname,
    Soa,
    Ptr,
    Mx,
    Txt,
    Aaaa,
    Srv,
    Https,
    Unknown(u16),
}

impl QueryType {
    /// Convert wire format u16 to `QueryType`
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::A,
            2 => Self::Ns,
            5 => Self::Cname,
            6 => Self::Soa,
            12 => Self::Ptr,
            15 => Self::Mx,
            16 => Self::Txt,
            28 => Self::Aaaa,
            33 => Self::Srv,
            65 => Self::Https,
            n => Self::Unknown(n),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::Ns => f.write_str("NS"),
            Self::Cname => f.write_str("CNAME"),
            Self::Soa => f.write_str("SOA"),
            Self::Ptr => f.write_str("PTR"),
            Self::Mx => f.write_str("MX"),
            Self::Txt => f.write_str("TXT"),
            Self::Aaaa => f.write_str("AAAA"),
            Self::Srv => f.write_str("SRV"),
            Self::Https => f.write_str("HTTPS"),
            Self::Unknown(n) => write!(f, "TYPE{n}"),
        }
    }
}

/// Header fields and first question of a DNS message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub id: u16,
    pub is_response: bool,
    pub name: String,
    pub qtype: QueryType,
}

/// Decode a captured payload
///
/// TCP payloads may start with the two-byte length prefix from RFC 1035
/// section 4.2.2; it is stripped when it matches the captured length. A
/// message id can collide with that length, so the whole payload is tried
/// when the stripped one does not decode.
/// Returns `None` for anything that is not a well-formed question.
pub fn parse_message(payload: &[u8], protocol: u16) -> Option<DnsQuestion> {
    if protocol != dnsflux_common::IPPROTO_TCP as u16 {
        return parse_question(payload);
    }

    let stripped = strip_length_prefix(payload);
    if stripped.len() == payload.len() {
        return parse_question(payload);
    }
    parse_question(stripped).or_else(|| parse_question(payload))
}

fn strip_length_prefix(payload: &[u8]) -> &[u8] {
    if payload.len() >= 2 + HEADER_LEN {
        let declared = u16::from_be_bytes([payload[0], payload[1]]) as usize;
        if declared == payload.len() - 2 {
            return &payload[2..];
        }
    }
    payload
}

fn parse_question(message: &[u8]) -> Option<DnsQuestion> {
    let mut buf = message;
    if buf.remaining() < HEADER_LEN {
        return None;
    }

    let id = buf.get_u16();
    let flags = buf.get_u16();
    let qdcount = buf.get_u16();
    buf.advance(6); // ancount, nscount, arcount

    if qdcount == 0 {
        return None;
    }

    let name = read_name(&mut buf)?;
    if buf.remaining() < 4 {
        return None;
    }
    let qtype = QueryType::from_u16(buf.get_u16());

    Some(DnsQuestion {
        id,
        is_response: flags & FLAG_RESPONSE != 0,
        name,
        qtype,
    })
}

/// Read an uncompressed name; the root name is returned as "."
fn read_name(buf: &mut &[u8]) -> Option<String> {
    let mut name = String::new();

    loop {
        if !buf.has_remaining() {
            return None;
        }
        let len = buf.get_u8() as usize;
        if len == 0 {
            break;
        }
        // Compression pointers and extended label types never appear in
        // the question of a well-formed query
        if len > MAX_LABEL_LEN || buf.remaining() < len {
            return None;
        }
        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(&String::from_utf8_lossy(&buf[..len]));
        buf.advance(len);

        if name.len() > MAX_NAME_LEN {
            return None;
        }
    }

    if name.is_empty() {
        name.push('.');
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a single-question query
    fn query(id: u16, flags: u16, name: &str, qtype: u16) -> Vec<u8> {
        let mut msg = Vec::new();
        msg.extend_from_slice(&id.to_be_bytes());
        msg.extend_from_slice(&flags.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());
        msg.extend_from_slice(&[0; 6]);
        for label in name.split('.').filter(|l| !l.is_empty()) {
            msg.push(label.len() as u8);
            msg.extend_from_slice(label.as_bytes());
        }
        msg.push(0);
        msg.extend_from_slice(&qtype.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());
        msg
    }

    #[test]
    fn test_parse_udp_query() {
        let msg = query(0xabcd, 0x0100, "www.example.com", 1);
        let q = parse_message(&msg, 17).unwrap();

        assert_eq!(q.id, 0xabcd);
        assert!(!q.is_response);
        assert_eq!(q.name, "www.example.com");
        assert_eq!(q.qtype, QueryType::A);
    }

    #[test]
    fn test_parse_response_flag() {
        let msg = query(7, 0x8180, "example.org", 28);
        let q = parse_message(&msg, 17).unwrap();

        assert!(q.is_response);
        assert_eq!(q.qtype, QueryType::Aaaa);
    }

    #[test]
    fn test_parse_tcp_length_prefixed() {
        let msg = query(1, 0x0100, "example.net", 15);
        let mut framed = (msg.len() as u16).to_be_bytes().to_vec();
        framed.extend_from_slice(&msg);

        let q = parse_message(&framed, 6).unwrap();
        assert_eq!(q.name, "example.net");
        assert_eq!(q.qtype, QueryType::Mx);
    }

    #[test]
    fn test_parse_tcp_without_prefix() {
        let msg = query(1, 0x0100, "example.net", 16);
        let q = parse_message(&msg, 6).unwrap();
        assert_eq!(q.qtype, QueryType::Txt);
    }

    #[test]
    fn test_parse_tcp_id_matching_length() {
        let mut msg = query(0, 0x0100, "example.net", 1);
        let id = (msg.len() - 2) as u16;
        msg[..2].copy_from_slice(&id.to_be_bytes());

        let q = parse_message(&msg, 6).unwrap();
        assert_eq!(q.id, id);
        assert_eq!(q.name, "example.net");
    }

    #[test]
    fn test_root_name() {
        let msg = query(1, 0x0100, "", 2);
        assert_eq!(parse_message(&msg, 17).unwrap().name, ".");
    }

    #[test]
    fn test_rejects_short_header() {
        assert!(parse_message(&[0x12, 0x34, 0x01], 17).is_none());
        assert!(parse_message(&[], 17).is_none());
    }

    #[test]
    fn test_rejects_header_only_query() {
        let header = [0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        assert!(parse_message(&header, 17).is_none());
    }

    #[test]
    fn test_rejects_zero_questions() {
        let mut msg = query(1, 0x0100, "example.com", 1);
        msg[4] = 0;
        msg[5] = 0;
        assert!(parse_message(&msg, 17).is_none());
    }

    #[test]
    fn test_rejects_truncated_label() {
        let mut msg = query(1, 0x0100, "example.com", 1);
        msg.truncate(HEADER_LEN + 4);
        assert!(parse_message(&msg, 17).is_none());
    }

    #[test]
    fn test_rejects_missing_type() {
        let mut msg = query(1, 0x0100, "example.com", 1);
        msg.truncate(msg.len() - 4);
        assert!(parse_message(&msg, 17).is_none());
    }

    #[test]
    fn test_rejects_compression_pointer() {
        let mut msg = query(1, 0x0100, "", 1);
        msg[HEADER_LEN] = 0xc0;
        assert!(parse_message(&msg, 17).is_none());
    }

    #[test]
    fn test_query_type_names() {
        assert_eq!(QueryType::from_u16(1).to_string(), "A");
        assert_eq!(QueryType::from_u16(28).to_string(), "AAAA");
        assert_eq!(QueryType::from_u16(65).to_string(), "HTTPS");
        assert_eq!(QueryType::from_u16(99).to_string(), "TYPE99");
    }
}
