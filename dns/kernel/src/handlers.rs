//! Kprobe handlers for DNS capture
//!
//! Both send paths share one handler; the two entry points differ only in the
//! protocol tag they pass along.

use aya_ebpf::{macros::kprobe, programs::ProbeContext};
use dnsflux_common::{capture, constants::*};

use crate::{helpers::record_capture, maps::RingChannel, socket_parser::SendCall};

/// Capture DNS over UDP
///
/// Attached to: udp_sendmsg
#[kprobe]
pub fn udp_sendmsg(ctx: ProbeContext) -> u32 {
    match try_dns_sendmsg(&ctx, IPPROTO_UDP) {
        Ok(ret) => ret,
        Err(_) => 1,
    }
}

/// Capture DNS over TCP
///
/// Attached to: tcp_sendmsg
#[kprobe]
pub fn tcp_sendmsg(ctx: ProbeContext) -> u32 {
    match try_dns_sendmsg(&ctx, IPPROTO_TCP) {
        Ok(ret) => ret,
        Err(_) => 1,
    }
}

#[inline(always)]
fn try_dns_sendmsg(ctx: &ProbeContext, protocol: u8) -> Result<u32, i64> {
    let call = match SendCall::from_context(ctx)? {
        Some(call) => call,
        None => return Ok(0),
    };

    let outcome = capture(&call, &RingChannel::events(), protocol);
    record_capture(outcome);

    Ok(0)
}
