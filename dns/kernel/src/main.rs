//! dnsflux eBPF capture - Kernel Space Program
//!
//! Attaches to udp_sendmsg and tcp_sendmsg, keeps only sends where either
//! port is 53, and publishes one fixed-layout `DnsEvent` per matching send
//! through the EVENTS ring buffer.
//!
//! ## Architecture
//!
//! ```text
//! udp_sendmsg() / tcp_sendmsg()
//!        |
//!        v
//! classify ports -> (not DNS) return
//!        |
//!        v
//! reserve EVENTS slot -> (full) count drop, return
//!        |
//!        v
//! fill identity, socket and payload fields, commit
//!        |
//!        v
//! Userspace -> drain EVENTS, decode DNS, export records
//! ```
//!
//! ## Usage
//!
//! This program must be compiled for the bpfel-unknown-none target:
//!
//! ```bash
//! cargo +nightly build --release --target=bpfel-unknown-none -Z build-std=core -p dnsflux-ebpf
//! ```
//!
//! The compiled bytecode is then loaded by the userspace program.

#![no_std]
#![no_main]

mod handlers;
mod helpers;
mod maps;
mod socket_parser;

// Re-export kprobe functions so they're visible to the loader
pub use handlers::{tcp_sendmsg, udp_sendmsg};

// Re-export maps for verification
pub use maps::{EVENTS, STATS};

/// bpf_probe_read_user is GPL-only
#[link_section = "license"]
#[no_mangle]
static LICENSE: [u8; 13] = *b"Dual MIT/GPL\0";

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    // eBPF programs cannot panic - this should never be reached
    // The verifier should catch any potential panics
    loop {}
}
