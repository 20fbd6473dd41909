//! Helper functions for eBPF programs
//!
//! Provides safe wrappers around BPF helper functions and
//! utility functions for common operations.

use aya_ebpf::helpers::{
    bpf_get_current_comm, bpf_get_current_pid_tgid, bpf_get_current_uid_gid, bpf_ktime_get_ns,
};
use dnsflux_common::{constants::*, Capture};

use crate::maps::STATS;

/// Get current timestamp in nanoseconds
#[inline(always)]
pub fn get_timestamp() -> u64 {
    unsafe { bpf_ktime_get_ns() }
}

/// Combined pid (upper half) and thread id (lower half)
#[inline(always)]
pub fn get_pid_tgid() -> u64 {
    bpf_get_current_pid_tgid()
}

/// Combined gid (upper half) and uid (lower half)
#[inline(always)]
pub fn get_uid_gid() -> u64 {
    bpf_get_current_uid_gid()
}

/// Current task name, or `None` if the helper failed
#[inline(always)]
pub fn get_comm() -> Option<[u8; COMM_LEN]> {
    bpf_get_current_comm().ok()
}

/// Increment a statistics counter
///
/// The STATS map is per-CPU, so a plain add is race free.
#[inline(always)]
pub fn increment_stat(stat_id: u32) {
    if let Some(count) = STATS.get_ptr_mut(stat_id) {
        unsafe { *count += 1 };
    }
}

/// Account for one handler invocation
///
/// Filtered sends are not counted so non-DNS traffic pays nothing here.
#[inline(always)]
pub fn record_capture(outcome: Capture) {
    match outcome {
        Capture::Filtered => {}
        Capture::ChannelFull => {
            increment_stat(STAT_DNS_SENDS);
            increment_stat(STAT_EVENTS_DROPPED);
        }
        Capture::Emitted { payload } => {
            increment_stat(STAT_DNS_SENDS);
            increment_stat(STAT_EVENTS_EMITTED);
            if !payload {
                increment_stat(STAT_PAYLOAD_SKIPPED);
            }
        }
    }
}
