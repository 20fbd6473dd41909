//! Shared types and capture logic for dnsflux
//!
//! This crate provides the event layout, constants, classifier and
//! extractor shared between the eBPF kernel program and the userspace
//! collector. It has no dependency on aya so the capture path can be
//! tested on the host.

#![cfg_attr(not(test), no_std)]

pub mod channel;
pub mod classify;
pub mod constants;
pub mod extract;
pub mod types;

// Re-export commonly used types
pub use channel::{EventChannel, EventSlot};
pub use classify::is_dns_traffic;
pub use constants::*;
pub use extract::{capture, Capture, IoVec, SendSource};
pub use types::DnsEvent;
