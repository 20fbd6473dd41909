//! eBPF program loader
//!
//! Handles privilege checks, loading the eBPF object, attaching the send
//! kprobes and handing out the maps.

use crate::types::{kernel::constants::*, CaptureStats};
use anyhow::{Context, Result};
use aya::{
    maps::{MapData, PerCpuArray, RingBuf},
    programs::KProbe,
    Bpf,
};
use log::{info, warn};
use std::path::PathBuf;

/// Kernel functions instrumented for capture; program names match
pub const KPROBES: [&str; 2] = ["udp_sendmsg", "tcp_sendmsg"];

/// Verify the process can load eBPF programs
///
/// Requires root. The memlock limit is raised for kernels that still
/// charge BPF maps against it; failure there is only a warning because
/// newer kernels account map memory through cgroups.
pub fn check_privileges() -> Result<()> {
    // SAFETY: geteuid has no preconditions
    if unsafe { libc::geteuid() } != 0 {
        anyhow::bail!("dnsflux must be run as root (or with CAP_BPF and CAP_PERFMON)");
    }

    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    // SAFETY: rlim is a valid rlimit for the duration of the call
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        warn!(
            "Failed to remove memlock limit: {}",
            std::io::Error::last_os_error()
        );
    }

    Ok(())
}

/// eBPF program loader and manager
pub struct CaptureLoader {
    ebpf: Bpf,
}

impl CaptureLoader {
    /// Load eBPF program from file or embedded bytecode
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to eBPF object file. If None, uses embedded bytecode.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        info!("Loading eBPF program...");

        let ebpf = if let Some(obj_path) = path {
            info!("Loading eBPF object from: {:?}", obj_path);
            let data = std::fs::read(&obj_path)
                .with_context(|| format!("Failed to read eBPF object file: {:?}", obj_path))?;
            Bpf::load(&data).context("Failed to load eBPF program")?
        } else {
            #[cfg(feature = "embedded")]
            {
                info!("Loading embedded eBPF program...");
                let data = include_bytes!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../target/bpfel-unknown-none/release/dnsflux"
                ));
                Bpf::load(data).context("Failed to load embedded eBPF program")?
            }
            #[cfg(not(feature = "embedded"))]
            {
                anyhow::bail!(
                    "No eBPF object file provided. Use --ebpf-object or compile with 'embedded' feature"
                );
            }
        };

        info!("eBPF program loaded successfully");

        Ok(Self { ebpf })
    }

    /// Attach kprobes to the UDP and TCP send paths
    pub fn attach_kprobes(&mut self) -> Result<()> {
        info!("Attaching kprobes for DNS capture...");

        for name in KPROBES {
            let program: &mut KProbe = self
                .ebpf
                .program_mut(name)
                .with_context(|| format!("{} program not found in eBPF object", name))?
                .try_into()
                .with_context(|| format!("Failed to get {} as KProbe", name))?;
            program
                .load()
                .with_context(|| format!("Failed to load {}", name))?;
            program
                .attach(name, 0)
                .with_context(|| format!("Failed to attach {} kprobe", name))?;
            info!("  ✓ Attached to {}", name);
        }

        info!("All kprobes attached successfully");

        Ok(())
    }

    /// Take the ring buffer carrying DNS events
    pub fn take_ring_buf(&mut self) -> Result<RingBuf<MapData>> {
        let map = self
            .ebpf
            .take_map("EVENTS")
            .context("EVENTS map not found in eBPF object")?;

        RingBuf::try_from(map).context("Failed to create RingBuf from EVENTS map")
    }

    /// Sum the per-CPU capture counters
    pub fn read_stats(&self) -> Result<CaptureStats> {
        let map = self
            .ebpf
            .map("STATS")
            .context("STATS map not found in eBPF object")?;
        let stats = PerCpuArray::<_, u64>::try_from(map)
            .context("Failed to create PerCpuArray from STATS map")?;

        let read = |index: u32| -> Result<u64> {
            let values = stats
                .get(&index, 0)
                .with_context(|| format!("Failed to read STATS[{}]", index))?;
            Ok(values.iter().sum())
        };

        Ok(CaptureStats {
            dns_sends: read(STAT_DNS_SENDS)?,
            events_emitted: read(STAT_EVENTS_EMITTED)?,
            events_dropped: read(STAT_EVENTS_DROPPED)?,
            payload_skipped: read(STAT_PAYLOAD_SKIPPED)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kprobe_names() {
        assert_eq!(KPROBES, ["udp_sendmsg", "tcp_sendmsg"]);
    }

    #[test]
    fn test_load_missing_object() {
        let path = std::env::temp_dir().join("dnsflux-does-not-exist.o");
        let err = CaptureLoader::load(Some(path)).err().unwrap();
        assert!(format!("{:#}", err).contains("Failed to read eBPF object file"));
    }
}
