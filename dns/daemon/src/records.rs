//! Event to record conversion
//!
//! Turns a raw `DnsEvent` into a `DnsRecord`: decodes the payload,
//! converts wire byte order, maps the monotonic timestamp onto wall-clock
//! time and attaches process information.

use crate::{
    dns::parse_message,
    process::ProcessResolver,
    types::*,
};
use chrono::{DateTime, Duration as ChronoDuration, Local};
use log::debug;

/// Maps `bpf_ktime_get_ns` timestamps to wall-clock time
#[derive(Debug, Clone, Copy)]
pub struct BootClock {
    /// Wall-clock time at monotonic zero
    origin: DateTime<Local>,
}

impl BootClock {
    /// Sample CLOCK_MONOTONIC and the wall clock together
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid, writable timespec
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        let mono_ns = if rc == 0 {
            ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
        } else {
            0
        };
        Self::from_monotonic(Local::now(), mono_ns)
    }

    /// Clock whose monotonic reading `mono_ns` corresponds to `wall`
    pub fn from_monotonic(wall: DateTime<Local>, mono_ns: u64) -> Self {
        Self {
            origin: wall - ChronoDuration::nanoseconds(mono_ns as i64),
        }
    }

    /// Wall-clock time of a monotonic timestamp
    pub fn to_wall(&self, mono_ns: u64) -> DateTime<Local> {
        self.origin + ChronoDuration::nanoseconds(mono_ns as i64)
    }
}

/// Builds enriched records from kernel events
pub struct RecordBuilder {
    clock: BootClock,
    processes: ProcessResolver,
}

impl RecordBuilder {
    pub fn new(clock: BootClock, processes: ProcessResolver) -> Self {
        Self { clock, processes }
    }

    /// Build a record from one event
    ///
    /// Direction comes from the QR bit when the payload decodes, otherwise
    /// from which side of the connection uses port 53.
    pub fn build(&mut self, event: &DnsEvent) -> DnsRecord {
        let sport = u16::from_be(event.sport);
        let dport = u16::from_be(event.dport);
        let comm = comm_to_string(&event.comm);

        let question = parse_message(event.payload(), event.protocol);
        if question.is_none() && event.pkt_len > 0 {
            debug!(
                "Undecodable {}-byte payload from pid {}",
                event.pkt_len, event.pid
            );
        }

        let direction = match &question {
            Some(q) if q.is_response => Direction::Response,
            Some(_) => Direction::Query,
            None => Direction::from_ports(sport, dport),
        };

        let process = self.processes.lookup(event.pid, &comm);

        DnsRecord {
            timestamp: self.clock.to_wall(event.timestamp).to_rfc3339(),
            protocol: protocol_name(event.protocol).to_string(),
            direction,
            source: endpoint_to_string(event.saddr, event.sport),
            destination: endpoint_to_string(event.daddr, event.dport),
            client_ip: ipv4_from_be(event.saddr).to_string(),
            process_id: event.pid,
            thread_id: event.tgid,
            uid: event.uid,
            gid: event.gid,
            comm,
            process_name: process.name,
            process_path: process.path,
            ifindex: event.ifindex,
            transaction_id: question.as_ref().map(|q| q.id),
            query_type: question.as_ref().map(|q| q.qtype.to_string()),
            query_name: question.map(|q| q.name),
            payload_len: event.pkt_len,
        }
    }
}
