//! Metrics collection and aggregation
//!
//! Aggregates decoded DNS records and computes summary statistics.

use crate::types::*;
use std::collections::{BTreeSet, HashMap};

/// Entries kept in each top-N list
pub const TOP_N: usize = 10;

/// Distinct names tracked per counter before eviction starts
pub const MAX_TRACKED_NAMES: usize = 10_000;

/// Bounded heavy-hitter counter (space-saving)
///
/// Holds at most `capacity` names. A new name arriving at capacity
/// replaces the least counted one and inherits its count plus one, so
/// reported counts are upper bounds once eviction has happened. Names
/// seen more often than total/capacity are never evicted.
#[derive(Debug)]
struct TopK {
    capacity: usize,
    counts: HashMap<String, u64>,
    /// (count, name) ordered for O(log n) minimum lookup
    order: BTreeSet<(u64, String)>,
    evictions: u64,
}

impl TopK {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            counts: HashMap::new(),
            order: BTreeSet::new(),
            evictions: 0,
        }
    }

    fn add(&mut self, name: &str) {
        if let Some(count) = self.counts.get_mut(name) {
            self.order.remove(&(*count, name.to_string()));
            *count += 1;
            self.order.insert((*count, name.to_string()));
            return;
        }

        let mut count = 1;
        if self.counts.len() >= self.capacity {
            if let Some((min, victim)) = self.order.pop_first() {
                self.counts.remove(&victim);
                self.evictions += 1;
                count = min + 1;
            }
        }

        self.counts.insert(name.to_string(), count);
        self.order.insert((count, name.to_string()));
    }

    fn len(&self) -> usize {
        self.counts.len()
    }

    fn top(&self, n: usize) -> Vec<NameCount> {
        top_n(&self.counts, n)
    }
}

/// Metrics collector for aggregating DNS records
#[derive(Debug)]
pub struct MetricsCollector {
    /// Total number of records processed
    total_events: u64,
    /// Records whose payload decoded
    decoded_events: u64,
    /// Records per protocol name
    by_protocol: HashMap<String, u64>,
    /// Records per direction
    by_direction: HashMap<String, u64>,
    /// Queries per record type
    query_types: HashMap<String, u64>,
    /// Queries per name
    domains: TopK,
    /// Records per process name
    processes: TopK,
    /// Captured payload bytes
    payload_bytes: u64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::with_capacity(MAX_TRACKED_NAMES)
    }
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector tracking at most `max_names` domains and processes
    pub fn with_capacity(max_names: usize) -> Self {
        Self {
            total_events: 0,
            decoded_events: 0,
            by_protocol: HashMap::new(),
            by_direction: HashMap::new(),
            query_types: HashMap::new(),
            domains: TopK::new(max_names),
            processes: TopK::new(max_names),
            payload_bytes: 0,
        }
    }

    /// Add a record to the collector
    ///
    /// Domains and query types are counted for queries only, so a
    /// response does not count the same lookup twice.
    pub fn add_record(&mut self, record: &DnsRecord) {
        self.total_events += 1;
        self.payload_bytes += record.payload_len as u64;

        *self.by_protocol.entry(record.protocol.clone()).or_insert(0) += 1;
        *self
            .by_direction
            .entry(record.direction.as_str().to_string())
            .or_insert(0) += 1;
        self.processes.add(&record.process_name);

        if record.is_decoded() {
            self.decoded_events += 1;
        }

        if record.direction == Direction::Query {
            if let Some(qtype) = &record.query_type {
                *self.query_types.entry(qtype.clone()).or_insert(0) += 1;
            }
            if let Some(name) = &record.query_name {
                self.domains.add(&name.to_lowercase());
            }
        }
    }

    /// Generate aggregated metrics
    ///
    /// # Arguments
    ///
    /// * `elapsed_secs` - Duration of collection period in seconds
    /// * `kernel` - Kernel-side counters read at shutdown
    pub fn generate_metrics(&self, elapsed_secs: u64, kernel: CaptureStats) -> DnsMetrics {
        DnsMetrics {
            timestamp: chrono::Utc::now().to_rfc3339(),
            duration_seconds: elapsed_secs,
            total_events: self.total_events,
            decoded_events: self.decoded_events,
            undecoded_events: self.total_events - self.decoded_events,
            payload_bytes: self.payload_bytes,
            by_protocol: self.by_protocol.clone(),
            by_direction: self.by_direction.clone(),
            query_types: self.query_types.clone(),
            top_domains: self.domains.top(TOP_N),
            top_processes: self.processes.top(TOP_N),
            evicted_names: self.domains.evictions + self.processes.evictions,
            kernel,
        }
    }

    /// Get current event count
    pub fn event_count(&self) -> u64 {
        self.total_events
    }

    /// Get number of distinct queried names currently tracked
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    /// Get captured payload bytes
    pub fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }
}

/// Highest counts first, ties broken by name
fn top_n(counts: &HashMap<String, u64>, n: usize) -> Vec<NameCount> {
    let mut entries: Vec<NameCount> = counts
        .iter()
        .map(|(name, &count)| NameCount {
            name: name.clone(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(n);
    entries
}
