//! Metrics exporters
//!
//! Writes the shutdown summary as JSON or Prometheus text exposition.

use crate::types::DnsMetrics;
use anyhow::{Context, Result};
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

/// Trait for metrics exporters
pub trait MetricsExporter {
    /// Export metrics
    ///
    /// # Arguments
    ///
    /// * `metrics` - Aggregated metrics to export
    fn export(&self, metrics: &DnsMetrics) -> Result<()>;
}

/// Export format type
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExporterType {
    /// JSON format
    Json,
    /// Prometheus format
    Prometheus,
}

impl ExporterType {
    /// Build the exporter for this format
    pub fn exporter(self, output_path: PathBuf) -> Box<dyn MetricsExporter> {
        match self {
            ExporterType::Json => Box::new(JsonExporter::new(output_path, true)),
            ExporterType::Prometheus => Box::new(PrometheusExporter::new(output_path)),
        }
    }
}

fn write_file(path: &Path, data: &str) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create output file: {:?}", path))?;

    file.write_all(data.as_bytes())
        .with_context(|| format!("Failed to write to output file: {:?}", path))?;

    Ok(())
}

/// JSON exporter
pub struct JsonExporter {
    output_path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Create a new JSON exporter
    ///
    /// # Arguments
    ///
    /// * `output_path` - Path to output file
    /// * `pretty` - Enable pretty-printing
    pub fn new(output_path: PathBuf, pretty: bool) -> Self {
        Self {
            output_path,
            pretty,
        }
    }
}

impl MetricsExporter for JsonExporter {
    fn export(&self, metrics: &DnsMetrics) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(metrics)?
        } else {
            serde_json::to_string(metrics)?
        };

        write_file(&self.output_path, &json)
    }
}

/// Prometheus exporter
pub struct PrometheusExporter {
    output_path: PathBuf,
}

impl PrometheusExporter {
    /// Create a new Prometheus exporter
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }

    /// Convert metrics to Prometheus format
    fn to_prometheus_format(metrics: &DnsMetrics) -> String {
        let mut output = String::new();

        output.push_str("# HELP dnsflux_events_total Total number of DNS events received\n");
        output.push_str("# TYPE dnsflux_events_total counter\n");
        output.push_str(&format!("dnsflux_events_total {}\n", metrics.total_events));
        output.push('\n');

        output.push_str("# HELP dnsflux_undecoded_events_total Events whose payload did not decode\n");
        output.push_str("# TYPE dnsflux_undecoded_events_total counter\n");
        output.push_str(&format!(
            "dnsflux_undecoded_events_total {}\n",
            metrics.undecoded_events
        ));
        output.push('\n');

        output.push_str("# HELP dnsflux_payload_bytes_total Captured DNS payload bytes\n");
        output.push_str("# TYPE dnsflux_payload_bytes_total counter\n");
        output.push_str(&format!(
            "dnsflux_payload_bytes_total {}\n",
            metrics.payload_bytes
        ));
        output.push('\n');

        output.push_str("# HELP dnsflux_duration_seconds Duration of collection period\n");
        output.push_str("# TYPE dnsflux_duration_seconds gauge\n");
        output.push_str(&format!(
            "dnsflux_duration_seconds {}\n",
            metrics.duration_seconds
        ));
        output.push('\n');

        output.push_str("# HELP dnsflux_events_by_protocol Events broken down by transport\n");
        output.push_str("# TYPE dnsflux_events_by_protocol counter\n");
        for (protocol, count) in sorted(&metrics.by_protocol) {
            output.push_str(&format!(
                "dnsflux_events_by_protocol{{protocol=\"{}\"}} {}\n",
                protocol, count
            ));
        }
        output.push('\n');

        output.push_str("# HELP dnsflux_events_by_direction Events broken down by direction\n");
        output.push_str("# TYPE dnsflux_events_by_direction counter\n");
        for (direction, count) in sorted(&metrics.by_direction) {
            output.push_str(&format!(
                "dnsflux_events_by_direction{{direction=\"{}\"}} {}\n",
                direction, count
            ));
        }
        output.push('\n');

        output.push_str("# HELP dnsflux_queries_by_type Queries broken down by record type\n");
        output.push_str("# TYPE dnsflux_queries_by_type counter\n");
        for (qtype, count) in sorted(&metrics.query_types) {
            output.push_str(&format!(
                "dnsflux_queries_by_type{{type=\"{}\"}} {}\n",
                qtype, count
            ));
        }
        output.push('\n');

        output.push_str("# HELP dnsflux_kernel_counter Kernel capture counters\n");
        output.push_str("# TYPE dnsflux_kernel_counter counter\n");
        output.push_str(&format!(
            "dnsflux_kernel_counter{{counter=\"dns_sends\"}} {}\n",
            metrics.kernel.dns_sends
        ));
        output.push_str(&format!(
            "dnsflux_kernel_counter{{counter=\"events_emitted\"}} {}\n",
            metrics.kernel.events_emitted
        ));
        output.push_str(&format!(
            "dnsflux_kernel_counter{{counter=\"events_dropped\"}} {}\n",
            metrics.kernel.events_dropped
        ));
        output.push_str(&format!(
            "dnsflux_kernel_counter{{counter=\"payload_skipped\"}} {}\n",
            metrics.kernel.payload_skipped
        ));
        output.push('\n');

        output
    }
}

impl MetricsExporter for PrometheusExporter {
    fn export(&self, metrics: &DnsMetrics) -> Result<()> {
        write_file(&self.output_path, &Self::to_prometheus_format(metrics))
    }
}

/// Stable label order for text output
fn sorted(map: &std::collections::HashMap<String, u64>) -> Vec<(&String, &u64)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort();
    entries
}
