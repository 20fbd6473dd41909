//! Socket and message parsing for the sendmsg kprobes
//!
//! Partial kernel struct definitions covering only the fields the handlers
//! read. The `sock_common` prefix is stable across kernels; the
//! `msghdr`/`iov_iter` layout matches kernels that still carry an `iov`
//! pointer in `iov_iter` (before 6.4). Every access goes through
//! bpf_probe_read_kernel, so a layout mismatch yields a failed or
//! meaningless read, never a fault.

#![allow(non_camel_case_types, dead_code)]

use aya_ebpf::{
    cty::c_void,
    helpers::{bpf_probe_read_kernel, bpf_probe_read_user_buf},
    programs::ProbeContext,
};
use core::ptr::addr_of;
use dnsflux_common::{constants::COMM_LEN, IoVec, SendSource};

use crate::helpers::{get_comm, get_pid_tgid, get_timestamp, get_uid_gid};

/// Kernel struct sock representation (partial)
#[repr(C)]
pub struct sock {
    __sk_common: sock_common,
}

/// Kernel struct sock_common (partial)
#[repr(C)]
struct sock_common {
    skc_daddr: u32,        // Destination address (network byte order)
    skc_rcv_saddr: u32,    // Source address (network byte order)
    skc_hash: u32,
    skc_dport: u16,        // Destination port (network byte order)
    skc_num: u16,          // Source port (host byte order)
    skc_family: u16,
    skc_state: u8,
    skc_flags: u8,
    skc_bound_dev_if: i32, // Bound interface index
}

/// Kernel struct msghdr (partial)
#[repr(C)]
pub struct msghdr {
    msg_name: *mut c_void,
    msg_namelen: i32,
    msg_iter: iov_iter,
}

/// Kernel struct iov_iter (partial)
#[repr(C)]
struct iov_iter {
    iter_type: u8,
    data_source: u8,
    iov_offset: usize,
    count: usize,
    iov: *const iovec,
}

/// Kernel struct iovec
#[repr(C)]
struct iovec {
    iov_base: *mut c_void,
    iov_len: usize,
}

// Offsets the field reads depend on (x86_64/arm64 layouts, pre-6.4 iov_iter)
const _: () = {
    use core::mem::offset_of;

    assert!(offset_of!(sock, __sk_common) == 0);
    assert!(offset_of!(sock_common, skc_daddr) == 0);
    assert!(offset_of!(sock_common, skc_rcv_saddr) == 4);
    assert!(offset_of!(sock_common, skc_dport) == 12);
    assert!(offset_of!(sock_common, skc_num) == 14);
    assert!(offset_of!(sock_common, skc_bound_dev_if) == 20);
    assert!(offset_of!(msghdr, msg_iter) == 16);
    assert!(offset_of!(iov_iter, iov) == 24);
    assert!(offset_of!(iovec, iov_base) == 0);
    assert!(offset_of!(iovec, iov_len) == 8);
};

/// Extract socket pointer from kprobe context
///
/// The first argument to udp_sendmsg and tcp_sendmsg is a pointer to
/// struct sock.
#[inline(always)]
pub fn get_sock_from_context(ctx: &ProbeContext) -> Result<*const sock, i64> {
    ctx.arg::<*const sock>(0).ok_or(-1)
}

/// Extract message pointer from kprobe context
///
/// The second argument to both send functions is a pointer to
/// struct msghdr.
#[inline(always)]
pub fn get_msghdr_from_context(ctx: &ProbeContext) -> Result<*const msghdr, i64> {
    ctx.arg::<*const msghdr>(1).ok_or(-1)
}

#[inline(always)]
fn read_kernel<T>(src: *const T) -> Option<T> {
    // SAFETY: bpf_probe_read_kernel validates the address and fails
    // instead of faulting
    unsafe { bpf_probe_read_kernel(src).ok() }
}

/// Kernel state of one in-flight sendmsg call
pub struct SendCall {
    sk: *const sock,
    msg: *const msghdr,
}

impl SendCall {
    /// Build from the kprobe arguments
    ///
    /// Returns `Ok(None)` when the socket is null, which happens under
    /// races and is not an error. A null or unreadable message only
    /// disables payload capture.
    #[inline(always)]
    pub fn from_context(ctx: &ProbeContext) -> Result<Option<Self>, i64> {
        let sk = get_sock_from_context(ctx)?;
        if sk.is_null() {
            return Ok(None);
        }
        let msg = get_msghdr_from_context(ctx).unwrap_or(core::ptr::null());
        Ok(Some(Self { sk, msg }))
    }

    #[inline(always)]
    fn common(&self) -> *const sock_common {
        // SAFETY: only computes the field address; nothing is dereferenced
        unsafe { addr_of!((*self.sk).__sk_common) }
    }
}

impl SendSource for SendCall {
    #[inline(always)]
    fn local_port(&self) -> Option<u16> {
        read_kernel(unsafe { addr_of!((*self.common()).skc_num) })
    }

    #[inline(always)]
    fn remote_port(&self) -> Option<u16> {
        read_kernel(unsafe { addr_of!((*self.common()).skc_dport) })
    }

    #[inline(always)]
    fn local_addr(&self) -> Option<u32> {
        read_kernel(unsafe { addr_of!((*self.common()).skc_rcv_saddr) })
    }

    #[inline(always)]
    fn remote_addr(&self) -> Option<u32> {
        read_kernel(unsafe { addr_of!((*self.common()).skc_daddr) })
    }

    #[inline(always)]
    fn bound_ifindex(&self) -> Option<u32> {
        read_kernel(unsafe { addr_of!((*self.common()).skc_bound_dev_if) }).map(|idx| idx as u32)
    }

    #[inline(always)]
    fn timestamp(&self) -> u64 {
        get_timestamp()
    }

    #[inline(always)]
    fn pid_tgid(&self) -> u64 {
        get_pid_tgid()
    }

    #[inline(always)]
    fn uid_gid(&self) -> u64 {
        get_uid_gid()
    }

    #[inline(always)]
    fn comm(&self) -> Option<[u8; COMM_LEN]> {
        get_comm()
    }

    #[inline(always)]
    fn first_iovec(&self) -> Option<IoVec> {
        if self.msg.is_null() {
            return None;
        }
        let iov = read_kernel(unsafe { addr_of!((*self.msg).msg_iter.iov) })?;
        if iov.is_null() {
            return None;
        }
        let base = read_kernel(unsafe { addr_of!((*iov).iov_base) })?;
        let len = read_kernel(unsafe { addr_of!((*iov).iov_len) })?;

        Some(IoVec {
            base: base as u64,
            len: len as u64,
        })
    }

    #[inline(always)]
    fn read_user(&self, base: u64, dst: &mut [u8]) -> bool {
        // SAFETY: the helper copies from the caller's address space and
        // reports failure for unmapped memory
        unsafe { bpf_probe_read_user_buf(base as *const u8, dst).is_ok() }
    }
}
