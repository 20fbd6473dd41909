//! Event channel abstraction
//!
//! The kernel implements these traits over the EVENTS ring buffer map.
//! Reservation hands out exclusive write access to one record; the slot
//! is consumed by `commit` or `discard`, so it can be published at most
//! once.

use crate::types::DnsEvent;

/// Bounded channel that records are reserved from
pub trait EventChannel {
    type Slot: EventSlot;

    /// Reserve space for one `DnsEvent`
    ///
    /// Returns `None` when the channel is out of space. Must never block.
    fn reserve(&self) -> Option<Self::Slot>;
}

/// A reserved, not yet published record
///
/// # Safety
///
/// `as_mut_ptr` must return a pointer that is valid, aligned and
/// exclusively owned by this slot for `size_of::<DnsEvent>()` bytes
/// until the slot is committed or discarded.
pub unsafe trait EventSlot: Sized {
    /// Raw pointer to the reserved storage (contents uninitialised)
    fn as_mut_ptr(&mut self) -> *mut DnsEvent;

    /// Publish the record to the consumer
    fn commit(self);

    /// Release the reservation without exposing its contents
    fn discard(self);

    /// Zero the reserved record and borrow it for population
    #[inline(always)]
    fn zeroed(&mut self) -> &mut DnsEvent {
        let ptr = self.as_mut_ptr();
        // SAFETY: the trait contract guarantees `ptr` is valid and exclusive;
        // every bit pattern of zero is a valid DnsEvent.
        unsafe {
            ptr.write_bytes(0, 1);
            &mut *ptr
        }
    }
}
