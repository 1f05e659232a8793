//! # Pipeline Metrics
//!
//! Concurrency-safe metrics shared by every task in a run: a latency record per message
//! id plus four independent counters. Per-message records live in a sharded
//! [`DashMap`] so producers and consumers touching different messages do not contend on
//! one lock; counters are plain atomics. No operation here can fail.
//!
//! Counters are not updated transactionally with each other or with the records, so a
//! snapshot may briefly show `total_messages` ahead of `processed_count`.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::message::{LatencyRecord, Message};

/// Metrics store shared through an `Arc` by all tasks of a run
#[derive(Debug, Default)]
pub struct MetricsStore {
    records: DashMap<String, LatencyRecord>,
    total_messages: AtomicU64,
    active_producers: AtomicUsize,
    active_consumers: AtomicUsize,
    error_count: AtomicU64,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a latency record starting now, replacing any record with the same id
    pub fn record_start(&self, message: &Message) {
        self.record_start_at(message, Instant::now());
    }

    pub fn record_start_at(&self, message: &Message, start: Instant) {
        self.records
            .insert(message.id.clone(), LatencyRecord::started_at(start));
    }

    /// Mark the message's record as completed now. Unknown ids are ignored.
    pub fn record_end(&self, message: &Message) {
        self.record_end_at(message, Instant::now());
    }

    pub fn record_end_at(&self, message: &Message, end: Instant) {
        if let Some(mut record) = self.records.get_mut(&message.id) {
            record.end = Some(end);
        }
    }

    pub fn increment_total_messages(&self) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_active_producers(&self) {
        self.active_producers.fetch_add(1, Ordering::AcqRel);
    }

    pub fn decrement_active_producers(&self) {
        saturating_decrement(&self.active_producers);
    }

    pub fn increment_active_consumers(&self) {
        self.active_consumers.fetch_add(1, Ordering::AcqRel);
    }

    pub fn decrement_active_consumers(&self) {
        saturating_decrement(&self.active_consumers);
    }

    pub fn increment_errors(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }

    pub fn active_producers(&self) -> usize {
        self.active_producers.load(Ordering::Acquire)
    }

    pub fn active_consumers(&self) -> usize {
        self.active_consumers.load(Ordering::Acquire)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Count a running producer until the returned guard is dropped
    pub fn track_producer(self: &Arc<Self>) -> ActivityGuard {
        ActivityGuard::new(Arc::clone(self), WorkerRole::Producer)
    }

    /// Count a running consumer until the returned guard is dropped
    pub fn track_consumer(self: &Arc<Self>) -> ActivityGuard {
        ActivityGuard::new(Arc::clone(self), WorkerRole::Consumer)
    }

    /// Aggregate counters and latency over the completed records
    pub fn snapshot_stats(&self) -> MetricsSnapshot {
        let mut processed_count: u64 = 0;
        let mut total_latency = Duration::ZERO;
        let mut min_latency: Option<Duration> = None;
        let mut max_latency: Option<Duration> = None;

        for entry in self.records.iter() {
            if let Some(latency) = entry.value().latency() {
                processed_count += 1;
                total_latency += latency;
                min_latency = Some(min_latency.map_or(latency, |m| m.min(latency)));
                max_latency = Some(max_latency.map_or(latency, |m| m.max(latency)));
            }
        }

        let average_latency = if processed_count > 0 {
            Duration::from_nanos((total_latency.as_nanos() / u128::from(processed_count)) as u64)
        } else {
            Duration::ZERO
        };

        MetricsSnapshot {
            total_messages: self.total_messages(),
            active_producers: self.active_producers(),
            active_consumers: self.active_consumers(),
            error_count: self.error_count(),
            processed_count,
            average_latency,
            min_latency,
            max_latency,
            queue_depth: 0,
        }
    }

    /// Lazily yield `(message id, latency)` for completed records only.
    ///
    /// Each call walks the live store again; iteration order is unspecified.
    pub fn all_completed_timings(&self) -> impl Iterator<Item = (String, Duration)> + '_ {
        self.records.iter().filter_map(|entry| {
            entry
                .value()
                .latency()
                .map(|latency| (entry.key().clone(), latency))
        })
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

fn saturating_decrement(counter: &AtomicUsize) {
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
}

/// Point-in-time view of the metrics store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_messages: u64,
    pub active_producers: usize,
    pub active_consumers: usize,
    pub error_count: u64,
    pub processed_count: u64,
    /// Zero when nothing has completed
    pub average_latency: Duration,
    pub min_latency: Option<Duration>,
    pub max_latency: Option<Duration>,
    pub queue_depth: usize,
}

impl MetricsSnapshot {
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    /// Messages sent but not yet processed
    pub fn in_flight(&self) -> u64 {
        self.total_messages.saturating_sub(self.processed_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerRole {
    Producer,
    Consumer,
}

/// Keeps an active-worker counter raised for as long as it lives.
///
/// Dropping the guard, including during unwinding, lowers the counter again.
#[derive(Debug)]
pub struct ActivityGuard {
    metrics: Arc<MetricsStore>,
    role: WorkerRole,
}

impl ActivityGuard {
    fn new(metrics: Arc<MetricsStore>, role: WorkerRole) -> Self {
        match role {
            WorkerRole::Producer => metrics.increment_active_producers(),
            WorkerRole::Consumer => metrics.increment_active_consumers(),
        }
        Self { metrics, role }
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        match self.role {
            WorkerRole::Producer => self.metrics.decrement_active_producers(),
            WorkerRole::Consumer => self.metrics.decrement_active_consumers(),
        }
    }
}
