//! BPF map definitions for DNS capture
//!
//! Defines the ring buffer shared with userspace and the handlers
//! statistics counters.

use aya_ebpf::{
    macros::map,
    maps::{ring_buf::RingBufEntry, PerCpuArray, RingBuf},
};
use dnsflux_common::{constants::*, DnsEvent, EventChannel, EventSlot};

/// Ring buffer carrying `DnsEvent` records to userspace
///
/// Shared by all CPUs. Reservation fails instead of blocking when the
/// consumer falls behind.
#[map]
pub static EVENTS: RingBuf = RingBuf::with_byte_size(RING_BUF_BYTES, 0);

/// Statistics counter map
///
/// Tracks capture health per CPU; userspace sums across CPUs.
/// Index: STAT_* constants
/// Value: u64 counter
#[map]
pub static STATS: PerCpuArray<u64> = PerCpuArray::with_max_entries(MAX_STATS, 0);

/// `EventChannel` view of the EVENTS ring buffer
pub struct RingChannel {
    ring: &'static RingBuf,
}

impl RingChannel {
    #[inline(always)]
    pub fn events() -> Self {
        Self { ring: &EVENTS }
    }
}

impl EventChannel for RingChannel {
    type Slot = RingSlot;

    #[inline(always)]
    fn reserve(&self) -> Option<RingSlot> {
        self.ring.reserve::<DnsEvent>(0).map(RingSlot)
    }
}

/// A reserved ring buffer record
pub struct RingSlot(RingBufEntry<DnsEvent>);

// SAFETY: bpf_ringbuf_reserve hands out an exclusive, 8-byte aligned
// region of size_of::<DnsEvent>() that stays valid until submit/discard.
unsafe impl EventSlot for RingSlot {
    #[inline(always)]
    fn as_mut_ptr(&mut self) -> *mut DnsEvent {
        self.0.as_mut_ptr()
    }

    #[inline(always)]
    fn commit(self) {
        self.0.submit(0);
    }

    #[inline(always)]
    fn discard(self) {
        self.0.discard(0);
    }
}
