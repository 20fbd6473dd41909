//! Event extraction
//!
//! Turns one outbound send into at most one `DnsEvent`. Every step after
//! classification degrades instead of failing: a field that cannot be read
//! stays zero, an unreadable payload leaves `pkt_len` at 0, and only a full
//! channel suppresses the event entirely.

use crate::{
    channel::{EventChannel, EventSlot},
    classify::is_dns_traffic,
    constants::{COMM_LEN, MAX_PKT_LEN},
    types::{split_pid_tgid, split_uid_gid, DnsEvent},
};

/// One segment of the outgoing message as seen by the kernel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IoVec {
    /// User-space address of the segment
    pub base: u64,
    /// Segment length in bytes
    pub len: u64,
}

impl IoVec {
    /// Number of bytes to copy, or `None` if the segment cannot be captured
    #[inline(always)]
    pub fn capture_len(&self) -> Option<usize> {
        if self.base != 0 && self.len <= MAX_PKT_LEN as u64 {
            Some(self.len as usize)
        } else {
            None
        }
    }
}

/// Kernel state visible to a send handler
///
/// Each accessor is an independent read; `None` means that read failed.
pub trait SendSource {
    /// Local port (`skc_num`, host byte order)
    fn local_port(&self) -> Option<u16>;
    /// Remote port (`skc_dport`, network byte order)
    fn remote_port(&self) -> Option<u16>;
    /// Local IPv4 address (`skc_rcv_saddr`, network byte order)
    fn local_addr(&self) -> Option<u32>;
    /// Remote IPv4 address (`skc_daddr`, network byte order)
    fn remote_addr(&self) -> Option<u32>;
    /// Bound device index (`skc_bound_dev_if`)
    fn bound_ifindex(&self) -> Option<u32>;

    fn timestamp(&self) -> u64;
    fn pid_tgid(&self) -> u64;
    fn uid_gid(&self) -> u64;
    fn comm(&self) -> Option<[u8; COMM_LEN]>;

    /// First I/O vector of the message being sent
    fn first_iovec(&self) -> Option<IoVec>;

    /// Copy `dst.len()` bytes of caller memory starting at `base`
    fn read_user(&self, base: u64, dst: &mut [u8]) -> bool;
}

/// What a single handler invocation did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capture {
    /// Not DNS traffic, or the ports could not be read
    Filtered,
    /// DNS traffic, but the channel had no room
    ChannelFull,
    /// Event committed; `payload` is false when `pkt_len` is 0
    Emitted { payload: bool },
}

/// Classify a send and, for DNS traffic, publish one event
#[inline(always)]
pub fn capture<S, C>(src: &S, channel: &C, protocol: u8) -> Capture
where
    S: SendSource,
    C: EventChannel,
{
    // Host order on both sides before comparing
    let (sport, dport) = match (src.local_port(), src.remote_port()) {
        (Some(local), Some(remote)) => (local, u16::from_be(remote)),
        _ => return Capture::Filtered,
    };
    if !is_dns_traffic(sport, dport) {
        return Capture::Filtered;
    }

    let mut slot = match channel.reserve() {
        Some(slot) => slot,
        None => return Capture::ChannelFull,
    };

    let event = slot.zeroed();
    fill_identity(event, src);
    fill_network(event, src, sport, dport, protocol);
    let payload = fill_payload(event, src);
    event.to_network_order();

    slot.commit();
    Capture::Emitted { payload }
}

#[inline(always)]
fn fill_identity<S: SendSource>(event: &mut DnsEvent, src: &S) {
    event.timestamp = src.timestamp();

    let (pid, tgid) = split_pid_tgid(src.pid_tgid());
    event.pid = pid;
    event.tgid = tgid;

    let (uid, gid) = split_uid_gid(src.uid_gid());
    event.uid = uid;
    event.gid = gid;

    if let Some(comm) = src.comm() {
        event.comm = comm;
    }
}

/// Populates ports and addresses in host byte order
#[inline(always)]
fn fill_network<S: SendSource>(
    event: &mut DnsEvent,
    src: &S,
    sport: u16,
    dport: u16,
    protocol: u8,
) {
    event.sport = sport;
    event.dport = dport;
    if let Some(addr) = src.local_addr() {
        event.saddr = u32::from_be(addr);
    }
    if let Some(addr) = src.remote_addr() {
        event.daddr = u32::from_be(addr);
    }
    if let Some(ifindex) = src.bound_ifindex() {
        event.ifindex = ifindex;
    }
    event.protocol = protocol as u16;
}

/// Copies the first I/O vector segment only; multi-segment sends are not
/// reassembled.
#[inline(always)]
fn fill_payload<S: SendSource>(event: &mut DnsEvent, src: &S) -> bool {
    let iov = match src.first_iovec() {
        Some(iov) => iov,
        None => return false,
    };
    let len = match iov.capture_len() {
        Some(len) => len,
        None => return false,
    };
    let dst = match event.pkt_data.get_mut(..len) {
        Some(dst) => dst,
        None => return false,
    };

    if src.read_user(iov.base, dst) {
        event.pkt_len = len as u16;
    }
    event.pkt_len > 0
}
