//! Process information from /proc
//!
//! The kernel only hands us a 16-byte comm; the executable path and the
//! untruncated name come from procfs. Lookups are cached per pid and
//! validated against the process start time, so a recycled pid is never
//! reported under the previous owner's name.

use log::debug;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// Upper bound on cached pids before the cache is reset
const MAX_CACHED_PROCESSES: usize = 4096;

/// 1-based index of `starttime` in /proc/<pid>/stat
const STAT_START_TIME_FIELD: usize = 22;

const UNKNOWN: &str = "unknown";

/// Resolved process identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub name: String,
    pub path: String,
}

struct CachedProcess {
    /// Clock ticks after boot at which the process started
    start_time: u64,
    info: ProcessInfo,
}

/// Cached pid -> process lookup
pub struct ProcessResolver {
    proc_root: PathBuf,
    cache: HashMap<u32, CachedProcess>,
}

impl Default for ProcessResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessResolver {
    /// Resolver reading the host's /proc
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Resolver reading an alternate procfs mount
    pub fn with_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            cache: HashMap::new(),
        }
    }

    /// Look up a process
    ///
    /// Name falls back to `fallback_comm` when /proc/<pid>/comm is gone
    /// (short-lived processes exit before the event is read). Path falls
    /// back to the first cmdline argument, then "unknown".
    ///
    /// A cached entry is reused only while the pid keeps the same start
    /// time and the kernel-captured comm still matches; an exec or a
    /// recycled pid forces a fresh read.
    pub fn lookup(&mut self, pid: u32, fallback_comm: &str) -> ProcessInfo {
        let dir = self.proc_root.join(pid.to_string());
        let start_time = read_start_time(&dir);

        if let (Some(start), Some(cached)) = (start_time, self.cache.get(&pid)) {
            let same_comm = fallback_comm.is_empty() || cached.info.name == fallback_comm;
            if cached.start_time == start && same_comm {
                return cached.info.clone();
            }
        }

        let info = ProcessInfo {
            name: read_comm(&dir).unwrap_or_else(|| {
                if fallback_comm.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    fallback_comm.to_string()
                }
            }),
            path: read_exe(&dir)
                .or_else(|| read_cmdline_arg0(&dir))
                .unwrap_or_else(|| UNKNOWN.to_string()),
        };

        match start_time {
            Some(start_time) => {
                if self.cache.len() >= MAX_CACHED_PROCESSES && !self.cache.contains_key(&pid) {
                    debug!("Process cache full, clearing {} entries", self.cache.len());
                    self.cache.clear();
                }
                self.cache.insert(
                    pid,
                    CachedProcess {
                        start_time,
                        info: info.clone(),
                    },
                );
            }
            // Gone, or not a real procfs: nothing to validate against later
            None => {
                self.cache.remove(&pid);
            }
        }

        info
    }

    /// Number of cached pids
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Start time from /proc/<pid>/stat
///
/// The comm field may contain spaces and parentheses, so fields are
/// counted from the last ')'.
fn read_start_time(dir: &Path) -> Option<u64> {
    let stat = fs::read_to_string(dir.join("stat")).ok()?;
    parse_start_time(&stat)
}

fn parse_start_time(stat: &str) -> Option<u64> {
    let rest = &stat[stat.rfind(')')? + 1..];
    // Fields after the comm start at index 3
    rest.split_whitespace()
        .nth(STAT_START_TIME_FIELD - 3)?
        .parse()
        .ok()
}

fn read_comm(dir: &Path) -> Option<String> {
    let comm = fs::read_to_string(dir.join("comm")).ok()?;
    let comm = comm.trim_end_matches('\n');
    (!comm.is_empty()).then(|| comm.to_string())
}

fn read_exe(dir: &Path) -> Option<String> {
    fs::read_link(dir.join("exe"))
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

fn read_cmdline_arg0(dir: &Path) -> Option<String> {
    let cmdline = fs::read(dir.join("cmdline")).ok()?;
    let arg0 = cmdline.split(|&b| b == 0).next()?;
    (!arg0.is_empty()).then(|| String::from_utf8_lossy(arg0).into_owned())
}
