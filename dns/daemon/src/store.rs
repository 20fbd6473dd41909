//! Bounded in-memory store of recent records
//!
//! Keeps the newest records first and fans every new record out to live
//! subscribers. Slow subscribers lag instead of blocking capture.

use crate::types::DnsRecord;
use std::collections::VecDeque;
use tokio::sync::{broadcast, RwLock};

/// Records kept when no capacity is given
pub const DEFAULT_CAPACITY: usize = 5000;

/// Per-subscriber buffer before the receiver starts lagging
const SUBSCRIBER_BUFFER: usize = 64;

struct Inner {
    /// Newest first
    records: VecDeque<DnsRecord>,
    /// `None` once the store is closed
    live: Option<broadcast::Sender<DnsRecord>>,
}

/// Recent-record store shared between the ring reader and consumers
pub struct RecordStore {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl RecordStore {
    /// Create a store
    ///
    /// # Arguments
    ///
    /// * `capacity` - Records retained; 0 selects `DEFAULT_CAPACITY`
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        let (live, _) = broadcast::channel(SUBSCRIBER_BUFFER);

        Self {
            capacity,
            inner: RwLock::new(Inner {
                records: VecDeque::with_capacity(capacity),
                live: Some(live),
            }),
        }
    }

    /// Maximum number of records retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add a record, dropping the oldest past capacity
    ///
    /// Ignored after `close`.
    pub async fn add(&self, record: DnsRecord) {
        let mut inner = self.inner.write().await;
        let Some(live) = inner.live.clone() else {
            return;
        };

        inner.records.push_front(record.clone());
        inner.records.truncate(self.capacity);

        // No subscribers is not an error
        let _ = live.send(record);
    }

    /// Newest records first; `limit` 0 returns everything
    pub async fn recent(&self, limit: usize) -> Vec<DnsRecord> {
        let inner = self.inner.read().await;
        let limit = if limit == 0 {
            inner.records.len()
        } else {
            limit.min(inner.records.len())
        };
        inner.records.iter().take(limit).cloned().collect()
    }

    /// Receive every record added from now on
    ///
    /// A closed store hands out a receiver that reports closed at once.
    pub async fn subscribe(&self) -> broadcast::Receiver<DnsRecord> {
        let inner = self.inner.read().await;
        match &inner.live {
            Some(live) => live.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Number of records currently held
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop all records and end every subscription
    pub async fn close(&self) {
        let mut inner = self.inner.write().await;
        inner.live = None;
        inner.records.clear();
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
