//! dnsflux - Userspace Program
//!
//! Loads the DNS capture programs, attaches the UDP and TCP send kprobes,
//! prints every captured DNS message and exports a summary on exit.
//!
//! ## Usage
//!
//! ```bash
//! # Capture until Ctrl-C, printing each record
//! sudo ./dnsflux --ebpf-object target/bpfel-unknown-none/release/dnsflux
//!
//! # JSON lines on stdout plus a daily log file
//! sudo ./dnsflux --format json --log-dir /var/log/dnsflux
//!
//! # Run for 60 seconds quietly and export Prometheus metrics
//! sudo ./dnsflux --duration 60 --quiet --metrics-format prometheus --output dns.prom
//!
//! # Configure through the environment and keep the last 100 records
//! sudo DNSFLUX_LOG_LEVEL=warn DNSFLUX_RECENT_OUTPUT=recent.json ./dnsflux
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use dnsflux_userspace::{
    collector::MetricsCollector,
    events::EventProcessor,
    exporter::ExporterType,
    loader::{self, CaptureLoader},
    output::{RecordFormat, RecordSink},
    process::ProcessResolver,
    records::{BootClock, RecordBuilder},
    store::{self, RecordStore},
    types::{CaptureStats, DnsMetrics, DnsRecord},
};
use log::{info, warn, LevelFilter};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{
    signal,
    sync::Mutex,
    time::{sleep, Instant},
};

/// DNS traffic capture using eBPF
///
/// Every option can also be set through the `DNSFLUX_*` variable shown in
/// its help; a command-line flag wins over the environment.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Duration to capture (in seconds, 0 = until Ctrl-C)
    #[clap(short, long, env = "DNSFLUX_DURATION", default_value_t = 0)]
    duration: u64,

    /// Per-record output format
    #[clap(short, long, env = "DNSFLUX_FORMAT", value_enum, default_value_t = RecordFormat::Text)]
    format: RecordFormat,

    /// Suppress per-record output
    #[clap(short, long, env = "DNSFLUX_QUIET")]
    quiet: bool,

    /// Directory for daily JSON-lines record logs
    #[clap(long, env = "DNSFLUX_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Output file for the summary metrics
    #[clap(short, long, env = "DNSFLUX_OUTPUT", default_value = "dns-metrics.json")]
    output: PathBuf,

    /// Summary metrics format
    #[clap(
        long,
        env = "DNSFLUX_METRICS_FORMAT",
        value_enum,
        default_value_t = ExporterType::Json
    )]
    metrics_format: ExporterType,

    /// Log level (off, error, warn, info, debug, trace)
    #[clap(short, long, env = "DNSFLUX_LOG_LEVEL", default_value = "info")]
    log_level: LevelFilter,

    /// Verbose logging; same as --log-level debug
    #[clap(short, long)]
    verbose: bool,

    /// Path to eBPF object file (if not embedded)
    #[clap(long, env = "DNSFLUX_EBPF_OBJECT")]
    ebpf_object: Option<PathBuf>,

    /// Progress reporting interval in seconds
    #[clap(long, env = "DNSFLUX_PROGRESS_INTERVAL", default_value_t = 10)]
    progress_interval: u64,

    /// Recent records kept in memory (0 = 5000)
    #[clap(
        long,
        env = "DNSFLUX_RECENT_CAPACITY",
        default_value_t = store::DEFAULT_CAPACITY
    )]
    recent_capacity: usize,

    /// Write the most recent records as a JSON array on exit
    #[clap(long, env = "DNSFLUX_RECENT_OUTPUT")]
    recent_output: Option<PathBuf>,

    /// Records written to --recent-output (0 = all retained)
    #[clap(long, env = "DNSFLUX_RECENT_LIMIT", default_value_t = 100)]
    recent_limit: usize,
}

impl Args {
    /// Effective log filter; --verbose raises anything below debug
    fn level_filter(&self) -> LevelFilter {
        if self.verbose {
            self.log_level.max(LevelFilter::Debug)
        } else {
            self.log_level
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(args.level_filter())
        .init();

    print_banner();

    info!("Starting dnsflux...");
    info!(
        "   Duration: {} seconds",
        if args.duration == 0 {
            "infinite".to_string()
        } else {
            args.duration.to_string()
        }
    );
    info!("   Record format: {:?}{}", args.format, if args.quiet { " (quiet)" } else { "" });
    if let Some(dir) = &args.log_dir {
        info!("   Record log dir: {:?}", dir);
    }
    info!("   Metrics: {:?} -> {:?}", args.metrics_format, args.output);
    if let Some(path) = &args.recent_output {
        info!("   Recent records: last {} -> {:?}", args.recent_limit, path);
    }

    loader::check_privileges()?;

    // Load eBPF program
    let mut loader = CaptureLoader::load(args.ebpf_object.clone())?;

    // Attach kprobes
    loader.attach_kprobes()?;

    // Get ring buffer
    let ring = loader.take_ring_buf()?;

    let store = Arc::new(RecordStore::new(args.recent_capacity));
    let sink = RecordSink::new(args.format, args.quiet, args.log_dir.clone())?;
    let builder = RecordBuilder::new(BootClock::now(), ProcessResolver::new());

    info!("Capturing DNS traffic...");

    // Create metrics collector
    let collector = Arc::new(Mutex::new(MetricsCollector::new()));

    // Create event processor
    let processor = EventProcessor::new(
        Arc::clone(&collector),
        Arc::clone(&store),
        args.verbose,
    );

    let reader = processor.spawn_ring_reader(ring, builder, sink)?;

    if args.progress_interval > 0 {
        processor.spawn_progress_reporter(args.progress_interval);
    }

    // Run for specified duration or until interrupted
    let start_time = Instant::now();

    if args.duration > 0 {
        tokio::select! {
            _ = sleep(Duration::from_secs(args.duration)) => {
                info!("Duration reached, shutting down...");
            }
            _ = signal::ctrl_c() => {
                info!("Interrupted, shutting down...");
            }
        }
    } else {
        signal::ctrl_c().await?;
        info!("Interrupted, shutting down...");
    }

    reader.abort();
    let elapsed = start_time.elapsed().as_secs();

    info!("Generating metrics report...");

    let kernel_stats = loader.read_stats().unwrap_or_else(|e| {
        warn!("Could not read kernel statistics: {:#}", e);
        CaptureStats::default()
    });

    let collector = collector.lock().await;
    let metrics = collector.generate_metrics(elapsed, kernel_stats);

    args.metrics_format
        .exporter(args.output.clone())
        .export(&metrics)?;

    info!("Metrics written to {:?}", args.output);

    if let Some(path) = &args.recent_output {
        let recent = store.recent(args.recent_limit).await;
        write_recent(path, &recent)?;
        info!("{} recent records written to {:?}", recent.len(), path);
    }
    store.close().await;

    print_summary(&metrics);

    Ok(())
}

/// Recent records as a pretty-printed JSON array
fn write_recent(path: &Path, records: &[DnsRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write recent records to {:?}", path))?;
    Ok(())
}

fn print_banner() {
    println!(
        r#"
╔═══════════════════════════════════════════════════╗
║        dnsflux - eBPF DNS Traffic Capture         ║
╚═══════════════════════════════════════════════════╝
    "#
    );
}

fn print_summary(metrics: &DnsMetrics) {
    info!("");
    info!("============================================");
    info!("             Summary Report");
    info!("============================================");
    info!("");
    info!("  Total events:       {}", metrics.total_events);
    info!("  Undecoded events:   {}", metrics.undecoded_events);
    info!("  Payload bytes:      {}", metrics.payload_bytes);
    info!("  Duration:           {} seconds", metrics.duration_seconds);
    info!("");
    info!("  Kernel Counters:");
    info!("    DNS sends:        {:>8}", metrics.kernel.dns_sends);
    info!("    Events emitted:   {:>8}", metrics.kernel.events_emitted);
    info!("    Events dropped:   {:>8}", metrics.kernel.events_dropped);
    info!("    Payload skipped:  {:>8}", metrics.kernel.payload_skipped);
    info!("");
    if !metrics.top_domains.is_empty() {
        info!("  Top Domains:");
        for entry in &metrics.top_domains {
            info!("    {:<40} {:>8}", entry.name, entry.count);
        }
        info!("");
    }
    if !metrics.top_processes.is_empty() {
        info!("  Top Processes:");
        for entry in &metrics.top_processes {
            info!("    {:<40} {:>8}", entry.name, entry.count);
        }
        info!("");
    }
    if metrics.evicted_names > 0 {
        info!(
            "  {} names evicted from the counters; top counts are upper bounds",
            metrics.evicted_names
        );
        info!("");
    }
    info!("============================================");
}
