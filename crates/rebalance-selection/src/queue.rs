//! Max-priority queue of workloads keyed by memory growth rate.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A workload and its growth rate in GB per minute.
#[derive(Debug, Clone, PartialEq)]
pub struct RateEntry {
    pub workload: String,
    pub rate: f64,
}

impl Eq for RateEntry {}

impl Ord for RateEntry {
    /// Higher rate first; equal rates pop in ascending id order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.rate
            .total_cmp(&other.rate)
            .then_with(|| other.workload.cmp(&self.workload))
    }
}

impl PartialOrd for RateEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct RateQueue {
    heap: BinaryHeap<RateEntry>,
}

impl RateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, workload: impl Into<String>, rate: f64) {
        self.heap.push(RateEntry {
            workload: workload.into(),
            rate,
        });
    }

    pub fn pop(&mut self) -> Option<RateEntry> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&RateEntry> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
