//! Shared constants for dnsflux capture
//!
//! These constants are used by both kernel and userspace programs
//! to ensure consistency in behavior and limits.

// ============================================================================
// BPF Map Sizes
// ============================================================================

/// Byte budget of the EVENTS ring buffer (must be a power of two and a
/// multiple of the page size)
pub const RING_BUF_BYTES: u32 = 256 * 1024;

// ============================================================================
// Event Layout
// ============================================================================

/// Capacity of `DnsEvent::pkt_data`; larger first segments are not captured
pub const MAX_PKT_LEN: usize = 512;

/// Length of the process name (kernel TASK_COMM_LEN)
pub const COMM_LEN: usize = 16;

// ============================================================================
// DNS
// ============================================================================

/// Well-known DNS port (host byte order)
pub const DNS_PORT: u16 = 53;

// ============================================================================
// Protocol Numbers (from linux/in.h)
// ============================================================================

/// TCP protocol number
pub const IPPROTO_TCP: u8 = 6;

/// UDP protocol number
pub const IPPROTO_UDP: u8 = 17;

// ============================================================================
// Statistics Counter Indices (for STATS map)
// ============================================================================

/// Sends accepted by the classifier
pub const STAT_DNS_SENDS: u32 = 0;

/// Events committed to the ring buffer
pub const STAT_EVENTS_EMITTED: u32 = 1;

/// Events lost because the ring buffer was full
pub const STAT_EVENTS_DROPPED: u32 = 2;

/// Events committed without payload bytes
pub const STAT_PAYLOAD_SKIPPED: u32 = 3;

/// Total number of statistics counters
pub const MAX_STATS: u32 = 4;
