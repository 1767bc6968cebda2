//! Metrics collection for peer message queues

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one message queue
#[derive(Debug, Default)]
pub struct Metrics {
    /// Messages handed to the connection (requests and fire-and-forget)
    pub messages_written: AtomicU64,

    /// Requests matched by an inbound answer
    pub requests_answered: AtomicU64,

    /// Answered requests removed from the requests queue
    pub requests_reaped: AtomicU64,

    /// Enqueue calls refused by the backpressure gate
    pub rejected: AtomicU64,

    /// Disconnects started on this queue
    pub disconnects: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_written(&self) {
        self.messages_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_answered(&self) {
        self.requests_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reaped(&self) {
        self.requests_reaped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> QueueMetrics {
        QueueMetrics {
            messages_written: self.messages_written.load(Ordering::Relaxed),
            requests_answered: self.requests_answered.load(Ordering::Relaxed),
            requests_reaped: self.requests_reaped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueMetrics {
    pub messages_written: u64,
    pub requests_answered: u64,
    pub requests_reaped: u64,
    pub rejected: u64,
    pub disconnects: u64,
}
