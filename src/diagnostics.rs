//! Diagnostics history
//!
//! Bounded ring buffers of recent cycles, deliveries and faults, surfaced
//! through the status query.

use crate::alerts::ChannelId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Fixed-capacity FIFO that evicts the oldest item when full
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Append an item, evicting the oldest if at capacity
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        while self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Change the capacity, dropping the oldest items if needed
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.items.len() > capacity {
            self.items.pop_front();
        }
    }

    /// Items from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Most recent item
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Summary of one finished cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub healthy: usize,
    pub transient: usize,
    pub escalated: usize,
    pub dispatched: usize,
    pub timed_out: bool,
}

/// One dispatched alert or recovery notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub key: String,
    pub at: DateTime<Utc>,
    pub recovery: bool,
    pub results: BTreeMap<ChannelId, bool>,
    pub fallback: bool,
}

/// Fault category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Collector,
    Channel,
    CycleTimeout,
    Config,
    Fallback,
}

/// One recorded fault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub kind: FaultKind,
    pub key: Option<String>,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Diagnostics history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub cycles: RingBuffer<CycleSummary>,
    pub deliveries: RingBuffer<DeliveryRecord>,
    pub faults: RingBuffer<FaultRecord>,
}

impl Diagnostics {
    /// Create empty buffers of the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            cycles: RingBuffer::new(capacity),
            deliveries: RingBuffer::new(capacity),
            faults: RingBuffer::new(capacity),
        }
    }

    /// Apply a new capacity from reloaded configuration
    pub fn resize(&mut self, capacity: usize) {
        if capacity != self.cycles.capacity() {
            self.cycles.resize(capacity);
            self.deliveries.resize(capacity);
            self.faults.resize(capacity);
        }
    }

    /// Record a fault
    pub fn fault(
        &mut self,
        kind: FaultKind,
        key: Option<&str>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        self.faults.push(FaultRecord {
            kind,
            key: key.map(str::to_string),
            message: message.into(),
            at,
        });
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut ring = RingBuffer::new(3);
        for i in 0..5 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(ring.latest(), Some(&4));
    }

    #[test]
    fn test_ring_buffer_zero_capacity() {
        let mut ring = RingBuffer::new(0);
        ring.push(1);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_resize_drops_oldest() {
        let mut ring = RingBuffer::new(5);
        for i in 0..5 {
            ring.push(i);
        }
        ring.resize(2);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_fault_recording() {
        let mut diagnostics = Diagnostics::new(10);
        diagnostics.fault(
            FaultKind::Collector,
            Some("high_cpu"),
            "probe timed out",
            Utc::now(),
        );
        let fault = diagnostics.faults.latest().unwrap();
        assert_eq!(fault.kind, FaultKind::Collector);
        assert_eq!(fault.key.as_deref(), Some("high_cpu"));
    }
}
