//! Shared data structures between kernel and userspace
//!
//! These structures must be repr(C) to ensure consistent memory layout
//! between eBPF programs and userspace code.

use crate::constants::{COMM_LEN, MAX_PKT_LEN};

/// DNS send event written by the kprobes into the EVENTS ring buffer
///
/// Ports and addresses are in network byte order; every other
/// multi-byte field is in host byte order.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct DnsEvent {
    /// Monotonic capture time (nanoseconds since boot)
    pub timestamp: u64,
    /// Process ID (upper half of pid_tgid)
    pub pid: u32,
    /// Thread ID (lower half of pid_tgid)
    pub tgid: u32,
    /// User ID (lower half of uid_gid)
    pub uid: u32,
    /// Group ID (upper half of uid_gid)
    pub gid: u32,
    /// Interface the socket is bound to (0 if unbound)
    pub ifindex: u32,
    /// Process name, NUL padded
    pub comm: [u8; COMM_LEN],
    /// Source port (network byte order)
    pub sport: u16,
    /// Destination port (network byte order)
    pub dport: u16,
    /// Source IPv4 address (network byte order)
    pub saddr: u32,
    /// Destination IPv4 address (network byte order)
    pub daddr: u32,
    /// IPPROTO_TCP or IPPROTO_UDP
    pub protocol: u16,
    /// Number of valid bytes in `pkt_data`
    pub pkt_len: u16,
    /// First I/O vector segment of the outgoing message
    pub pkt_data: [u8; MAX_PKT_LEN],
}

impl DnsEvent {
    /// An event with every field set to zero
    pub const fn zeroed() -> Self {
        Self {
            timestamp: 0,
            pid: 0,
            tgid: 0,
            uid: 0,
            gid: 0,
            ifindex: 0,
            comm: [0; COMM_LEN],
            sport: 0,
            dport: 0,
            saddr: 0,
            daddr: 0,
            protocol: 0,
            pkt_len: 0,
            pkt_data: [0; MAX_PKT_LEN],
        }
    }

    /// Captured payload bytes
    pub fn payload(&self) -> &[u8] {
        let len = (self.pkt_len as usize).min(MAX_PKT_LEN);
        &self.pkt_data[..len]
    }

    /// Rewrite ports and addresses from host to network byte order
    #[inline(always)]
    pub fn to_network_order(&mut self) {
        self.sport = self.sport.to_be();
        self.dport = self.dport.to_be();
        self.saddr = self.saddr.to_be();
        self.daddr = self.daddr.to_be();
    }
}

/// Split a `bpf_get_current_pid_tgid` value into (pid, tid)
#[inline(always)]
pub const fn split_pid_tgid(pid_tgid: u64) -> (u32, u32) {
    ((pid_tgid >> 32) as u32, (pid_tgid & 0xFFFF_FFFF) as u32)
}

/// Split a `bpf_get_current_uid_gid` value into (uid, gid)
#[inline(always)]
pub const fn split_uid_gid(uid_gid: u64) -> (u32, u32) {
    ((uid_gid & 0xFFFF_FFFF) as u32, (uid_gid >> 32) as u32)
}

// Compile-time layout checks
// The userspace reader depends on this exact size
const _: () = {
    assert!(core::mem::size_of::<DnsEvent>() == 576);
    assert!(core::mem::size_of::<DnsEvent>() % core::mem::align_of::<DnsEvent>() == 0);
};

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem;

    #[test]
    fn test_dns_event_field_offsets() {
        assert_eq!(mem::offset_of!(DnsEvent, timestamp), 0);
        assert_eq!(mem::offset_of!(DnsEvent, pid), 8);
        assert_eq!(mem::offset_of!(DnsEvent, tgid), 12);
        assert_eq!(mem::offset_of!(DnsEvent, uid), 16);
        assert_eq!(mem::offset_of!(DnsEvent, gid), 20);
        assert_eq!(mem::offset_of!(DnsEvent, ifindex), 24);
        assert_eq!(mem::offset_of!(DnsEvent, comm), 28);
        assert_eq!(mem::offset_of!(DnsEvent, sport), 44);
        assert_eq!(mem::offset_of!(DnsEvent, dport), 46);
        assert_eq!(mem::offset_of!(DnsEvent, saddr), 48);
        assert_eq!(mem::offset_of!(DnsEvent, daddr), 52);
        assert_eq!(mem::offset_of!(DnsEvent, protocol), 56);
        assert_eq!(mem::offset_of!(DnsEvent, pkt_len), 58);
        assert_eq!(mem::offset_of!(DnsEvent, pkt_data), 60);
        assert_eq!(mem::align_of::<DnsEvent>(), 8);
    }

    #[test]
    fn test_split_pid_tgid() {
        let (pid, tid) = split_pid_tgid((4321u64 << 32) | 8765);
        assert_eq!(pid, 4321);
        assert_eq!(tid, 8765);
    }

    #[test]
    fn test_split_uid_gid() {
        let (uid, gid) = split_uid_gid((100u64 << 32) | 1000);
        assert_eq!(uid, 1000);
        assert_eq!(gid, 100);
    }

    #[test]
    fn test_payload_is_clamped() {
        let mut event = DnsEvent::zeroed();
        event.pkt_len = 4;
        event.pkt_data[..4].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(event.payload(), &[1, 2, 3, 4]);

        event.pkt_len = u16::MAX;
        assert_eq!(event.payload().len(), MAX_PKT_LEN);
    }

    #[test]
    fn test_to_network_order() {
        let mut event = DnsEvent::zeroed();
        event.sport = 53;
        event.dport = 40000;
        event.saddr = 0x7f00_0001;
        event.daddr = 0x0808_0808;
        event.to_network_order();

        assert_eq!(u16::from_be(event.sport), 53);
        assert_eq!(u16::from_be(event.dport), 40000);
        assert_eq!(event.saddr.to_ne_bytes(), [127, 0, 0, 1]);
        assert_eq!(event.daddr.to_ne_bytes(), [8, 8, 8, 8]);
    }
}
