//! Userspace type definitions
//!
//! Defines the data structures used by the userspace program for
//! record output, metrics collection and export.
//!
//! ## Organization
//!
//! This module separates kernel and userspace types:
//! - **Kernel Types**: Types shared with eBPF programs (from dnsflux_common)
//! - **Userspace Types**: Types used only in userspace for output and export

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, net::Ipv4Addr};

// ============================================================================
// Kernel Types (from eBPF programs)
// ============================================================================

pub mod kernel {
    //! Types shared between kernel eBPF programs and userspace
    //!
    //! These are re-exported from the dnsflux-common crate and must
    //! maintain binary compatibility with the eBPF programs.

    pub use dnsflux_common::constants;
    pub use dnsflux_common::DnsEvent;
}

// Re-export commonly used kernel types at module level for convenience
pub use kernel::DnsEvent;

/// Whether a captured send carried a question or an answer
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Query,
    Response,
}

impl Direction {
    /// Infer direction from host-order ports
    ///
    /// Traffic towards port 53 is a query; anything else that reached us
    /// was sent from port 53 and is a response.
    pub fn from_ports(_sport: u16, dport: u16) -> Self {
        if dport == kernel::constants::DNS_PORT {
            Direction::Query
        } else {
            Direction::Response
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Query => "query",
            Direction::Response => "response",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured DNS send, decoded and enriched
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    /// RFC 3339 wall-clock capture time
    pub timestamp: String,
    /// "UDP" or "TCP"
    pub protocol: String,
    pub direction: Direction,
    /// Source address:port
    pub source: String,
    /// Destination address:port
    pub destination: String,
    /// Source address of the sending socket
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    pub process_id: u32,
    pub thread_id: u32,
    pub uid: u32,
    pub gid: u32,
    /// Task name captured in the kernel
    pub comm: String,
    /// Name from /proc/<pid>/comm, or the kernel comm
    pub process_name: String,
    /// Executable path from /proc/<pid>/exe
    pub process_path: String,
    pub ifindex: u32,
    /// DNS message id, if the payload decoded
    pub transaction_id: Option<u16>,
    pub query_name: Option<String>,
    pub query_type: Option<String>,
    /// Captured payload bytes
    pub payload_len: u16,
}

impl DnsRecord {
    /// Whether the payload decoded into a DNS question
    pub fn is_decoded(&self) -> bool {
        self.query_name.is_some()
    }
}

/// Kernel capture counters read from the STATS map
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    /// Sends accepted by the classifier
    pub dns_sends: u64,
    /// Events committed to the ring buffer
    pub events_emitted: u64,
    /// Events lost to a full ring buffer
    pub events_dropped: u64,
    /// Events committed without payload
    pub payload_skipped: u64,
}

/// A label with its occurrence count
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NameCount {
    pub name: String,
    pub count: u64,
}

/// Aggregated metrics for export
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DnsMetrics {
    /// ISO 8601 timestamp when metrics were collected
    pub timestamp: String,
    /// Duration of collection period in seconds
    pub duration_seconds: u64,
    /// Total number of events received from the ring buffer
    pub total_events: u64,
    /// Events whose payload decoded into a DNS question
    pub decoded_events: u64,
    /// Events with missing or malformed payload
    pub undecoded_events: u64,
    /// Captured payload bytes across all events
    pub payload_bytes: u64,
    /// Events per transport protocol
    pub by_protocol: HashMap<String, u64>,
    /// Events per direction
    pub by_direction: HashMap<String, u64>,
    /// Queries per record type
    pub query_types: HashMap<String, u64>,
    /// Most queried names
    pub top_domains: Vec<NameCount>,
    /// Processes sending the most DNS traffic
    pub top_processes: Vec<NameCount>,
    /// Names dropped from the bounded counters; top counts are upper
    /// bounds when this is non-zero
    pub evicted_names: u64,
    /// Kernel-side counters
    pub kernel: CaptureStats,
}

/// Human-readable name of a transport protocol tag
pub fn protocol_name(protocol: u16) -> &'static str {
    match protocol {
        p if p == kernel::constants::IPPROTO_UDP as u16 => "UDP",
        p if p == kernel::constants::IPPROTO_TCP as u16 => "TCP",
        _ => "UNKNOWN",
    }
}

/// Address in network byte order as dotted quad
pub fn ipv4_from_be(addr: u32) -> Ipv4Addr {
    Ipv4Addr::from(u32::from_be(addr))
}

/// Convert an address/port pair in network byte order to "ip:port"
pub fn endpoint_to_string(addr: u32, port: u16) -> String {
    format!("{}:{}", ipv4_from_be(addr), u16::from_be(port))
}

/// Process name bytes up to the first NUL
pub fn comm_to_string(comm: &[u8]) -> String {
    let end = comm.iter().position(|&b| b == 0).unwrap_or(comm.len());
    String::from_utf8_lossy(&comm[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_to_string() {
        let addr = u32::from_ne_bytes([192, 168, 1, 10]);
        assert_eq!(endpoint_to_string(addr, 53u16.to_be()), "192.168.1.10:53");
    }

    #[test]
    fn test_comm_to_string() {
        let mut comm = [0u8; 16];
        comm[..8].copy_from_slice(b"resolved");
        assert_eq!(comm_to_string(&comm), "resolved");
        assert_eq!(comm_to_string(b"systemd-resolve!"), "systemd-resolve!");
        assert_eq!(comm_to_string(&[0u8; 16]), "");
    }

    #[test]
    fn test_direction_from_ports() {
        assert_eq!(Direction::from_ports(40000, 53), Direction::Query);
        assert_eq!(Direction::from_ports(53, 40000), Direction::Response);
    }

    #[test]
    fn test_protocol_name() {
        assert_eq!(protocol_name(17), "UDP");
        assert_eq!(protocol_name(6), "TCP");
        assert_eq!(protocol_name(1), "UNKNOWN");
    }

    #[test]
    fn test_record_json_keys() {
        let record = DnsRecord {
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            protocol: "UDP".to_string(),
            direction: Direction::Query,
            source: "10.0.0.5:41234".to_string(),
            destination: "1.1.1.1:53".to_string(),
            client_ip: "10.0.0.5".to_string(),
            process_id: 10,
            thread_id: 11,
            uid: 0,
            gid: 0,
            comm: "curl".to_string(),
            process_name: "curl".to_string(),
            process_path: "/usr/bin/curl".to_string(),
            ifindex: 2,
            transaction_id: Some(0x1234),
            query_name: Some("example.com".to_string()),
            query_type: Some("A".to_string()),
            payload_len: 29,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["queryName"], "example.com");
        assert_eq!(json["clientIP"], "10.0.0.5");
        assert_eq!(json["processId"], 10);
        assert_eq!(json["direction"], "query");
    }
}
