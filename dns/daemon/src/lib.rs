//! dnsflux Userspace Library
//!
//! Provides reusable components for loading the DNS capture programs,
//! decoding its events and reporting on them.

pub mod collector;
pub mod dns;
pub mod events;
pub mod exporter;
pub mod loader;
pub mod output;
pub mod process;
pub mod records;
pub mod store;
pub mod types;

pub use collector::MetricsCollector;
pub use events::EventProcessor;
pub use exporter::{ExporterType, JsonExporter, MetricsExporter, PrometheusExporter};
pub use loader::CaptureLoader;
pub use output::{RecordFormat, RecordSink};
pub use records::{BootClock, RecordBuilder};
pub use store::RecordStore;
pub use types::*;
