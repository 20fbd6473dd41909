//! Event processing from the eBPF ring buffer
//!
//! Waits for ring readiness with `AsyncFd`, drains every pending event per
//! wakeup and hands them to the record builder. Built records go to the
//! sink, the recent-record store and the collector.

use crate::{
    collector::MetricsCollector,
    output::RecordSink,
    records::RecordBuilder,
    store::RecordStore,
    types::DnsEvent,
};
use anyhow::{Context, Result};
use aya::maps::{MapData, RingBuf};
use log::{debug, info, warn};
use std::{mem, sync::Arc, time::Duration};
use tokio::{
    io::{unix::AsyncFd, Interest},
    sync::Mutex,
    task::JoinHandle,
    time::interval,
};

/// Decode one ring buffer record
///
/// Returns `None` when the record is shorter than a `DnsEvent`, which
/// means the kernel object and this binary disagree on the layout.
pub fn parse_event(data: &[u8]) -> Option<DnsEvent> {
    if data.len() < mem::size_of::<DnsEvent>() {
        return None;
    }
    // SAFETY: length checked above; DnsEvent is repr(C) and valid for any
    // bit pattern
    Some(unsafe { (data.as_ptr() as *const DnsEvent).read_unaligned() })
}

/// Event processor that reads from the ring buffer
pub struct EventProcessor {
    collector: Arc<Mutex<MetricsCollector>>,
    store: Arc<RecordStore>,
    verbose: bool,
}

impl EventProcessor {
    /// Create a new event processor
    ///
    /// # Arguments
    ///
    /// * `collector` - Shared metrics collector
    /// * `store` - Shared recent-record store
    /// * `verbose` - Log every record at debug level
    pub fn new(
        collector: Arc<Mutex<MetricsCollector>>,
        store: Arc<RecordStore>,
        verbose: bool,
    ) -> Self {
        Self {
            collector,
            store,
            verbose,
        }
    }

    /// Spawn the ring buffer reader
    ///
    /// The ring is registered with the tokio reactor; each readiness
    /// notification drains the ring completely before waiting again.
    pub fn spawn_ring_reader(
        &self,
        ring: RingBuf<MapData>,
        mut builder: RecordBuilder,
        mut sink: RecordSink,
    ) -> Result<JoinHandle<()>> {
        let mut ring = AsyncFd::with_interest(ring, Interest::READABLE)
            .context("Failed to register EVENTS ring buffer with the reactor")?;
        let collector = Arc::clone(&self.collector);
        let store = Arc::clone(&self.store);
        let verbose = self.verbose;

        info!("Spawning ring buffer reader");

        Ok(tokio::spawn(async move {
            let mut batch = Vec::new();

            loop {
                {
                    let mut guard = match ring.readable_mut().await {
                        Ok(guard) => guard,
                        Err(e) => {
                            warn!("Error waiting on ring buffer: {}", e);
                            break;
                        }
                    };

                    let rb = guard.get_inner_mut();
                    while let Some(item) = rb.next() {
                        match parse_event(&item) {
                            Some(event) => batch.push(event),
                            None => warn!("Discarding short ring record ({} bytes)", item.len()),
                        }
                    }
                    guard.clear_ready();
                }

                let outputs = BatchOutputs {
                    sink: &mut sink,
                    store: &store,
                    collector: &collector,
                };
                process_batch(&mut builder, outputs, &mut batch, verbose).await;
            }
        }))
    }

    /// Spawn progress reporter
    ///
    /// # Arguments
    ///
    /// * `interval_secs` - Reporting interval in seconds
    pub fn spawn_progress_reporter(&self, interval_secs: u64) {
        let collector_clone = Arc::clone(&self.collector);

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));

            loop {
                ticker.tick().await;

                let collector = collector_clone.lock().await;
                info!(
                    "Progress: {} DNS events collected, {} distinct names",
                    collector.event_count(),
                    collector.domain_count()
                );
            }
        });
    }
}

/// Where a batch of records is delivered
pub struct BatchOutputs<'a> {
    pub sink: &'a mut RecordSink,
    pub store: &'a RecordStore,
    pub collector: &'a Mutex<MetricsCollector>,
}

/// Turn drained events into records, output them and aggregate
///
/// Leaves `batch` empty for reuse.
pub async fn process_batch(
    builder: &mut RecordBuilder,
    outputs: BatchOutputs<'_>,
    batch: &mut Vec<DnsEvent>,
    verbose: bool,
) {
    if batch.is_empty() {
        return;
    }

    let records: Vec<_> = batch.drain(..).map(|event| builder.build(&event)).collect();

    for record in &records {
        if verbose {
            debug!(
                "Event: {} {} -> {} {} {}",
                record.protocol,
                record.source,
                record.destination,
                record.process_name,
                record.query_name.as_deref().unwrap_or("-")
            );
        }
        outputs.sink.emit(record);
    }

    {
        let mut collector = outputs.collector.lock().await;
        for record in &records {
            collector.add_record(record);
        }
    }

    for record in records {
        outputs.store.add(record).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{output::RecordFormat, process::ProcessResolver, records::BootClock};
    use dnsflux_common::constants::IPPROTO_UDP;

    fn event_bytes(event: &DnsEvent) -> Vec<u8> {
        let ptr = event as *const DnsEvent as *const u8;
        unsafe { std::slice::from_raw_parts(ptr, mem::size_of::<DnsEvent>()) }.to_vec()
    }

    fn sample_event() -> DnsEvent {
        let mut event = DnsEvent::zeroed();
        event.pid = 77;
        event.sport = 33000;
        event.dport = 53;
        event.protocol = IPPROTO_UDP as u16;
        event.to_network_order();
        event
    }

    #[test]
    fn test_parse_event() {
        let bytes = event_bytes(&sample_event());
        let event = parse_event(&bytes).unwrap();

        assert_eq!(event.pid, 77);
        assert_eq!(u16::from_be(event.dport), 53);
    }

    #[test]
    fn test_parse_event_unaligned() {
        let mut bytes = vec![0u8];
        bytes.extend(event_bytes(&sample_event()));

        let event = parse_event(&bytes[1..]).unwrap();
        assert_eq!(event.pid, 77);
    }

    #[test]
    fn test_parse_event_short() {
        let bytes = event_bytes(&sample_event());
        assert!(parse_event(&bytes[..100]).is_none());
        assert!(parse_event(&[]).is_none());
    }

    fn test_builder() -> RecordBuilder {
        RecordBuilder::new(
            BootClock::now(),
            ProcessResolver::with_root(std::env::temp_dir().join("dnsflux-events-no-proc")),
        )
    }

    #[tokio::test]
    async fn test_process_batch() {
        let collector = Mutex::new(MetricsCollector::new());
        let store = RecordStore::new(10);
        let mut sink = RecordSink::new(RecordFormat::Json, true, None).unwrap();
        let mut builder = test_builder();
        let mut batch = vec![sample_event(), sample_event()];

        let outputs = BatchOutputs {
            sink: &mut sink,
            store: &store,
            collector: &collector,
        };
        process_batch(&mut builder, outputs, &mut batch, true).await;

        assert!(batch.is_empty());
        assert_eq!(collector.lock().await.event_count(), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_process_batch_feeds_subscribers() {
        let collector = Mutex::new(MetricsCollector::new());
        let store = RecordStore::new(10);
        let mut rx = store.subscribe().await;
        let mut sink = RecordSink::new(RecordFormat::Text, true, None).unwrap();
        let mut builder = test_builder();

        let mut first = sample_event();
        first.pid = 1;
        let mut second = sample_event();
        second.pid = 2;
        let mut batch = vec![first, second];

        let outputs = BatchOutputs {
            sink: &mut sink,
            store: &store,
            collector: &collector,
        };
        process_batch(&mut builder, outputs, &mut batch, false).await;

        assert_eq!(rx.recv().await.unwrap().process_id, 1);
        assert_eq!(rx.recv().await.unwrap().process_id, 2);

        let recent = store.recent(0).await;
        assert_eq!(recent[0].process_id, 2);
        assert_eq!(recent[0].destination, "0.0.0.0:53");
        assert_eq!(recent[1].process_id, 1);
    }

    #[tokio::test]
    async fn test_process_batch_empty() {
        let collector = Mutex::new(MetricsCollector::new());
        let store = RecordStore::new(10);
        let mut sink = RecordSink::new(RecordFormat::Json, true, None).unwrap();
        let mut batch = Vec::new();

        let outputs = BatchOutputs {
            sink: &mut sink,
            store: &store,
            collector: &collector,
        };
        process_batch(&mut test_builder(), outputs, &mut batch, false).await;

        assert_eq!(collector.lock().await.event_count(), 0);
        assert!(store.is_empty().await);
    }
}
