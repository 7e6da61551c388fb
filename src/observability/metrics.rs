//! Operation counters.
//!
//! Counters only, monotonic, reset only on process start.
//! Thread-safe with relaxed atomics; exactness under concurrent
//! increments matters, ordering between counters does not.

use std::sync::atomic::{AtomicU64, Ordering};

/// Space-wide operation counters.
#[derive(Debug, Default)]
pub struct SpaceMetrics {
    /// Successful entry writes
    writes_ok: AtomicU64,
    /// Failed entry writes
    writes_failed: AtomicU64,
    /// Successful entry reads
    reads_ok: AtomicU64,
    /// Failed entry reads
    reads_failed: AtomicU64,
    /// Successful entry takes
    takes_ok: AtomicU64,
    /// Failed entry takes
    takes_failed: AtomicU64,
    /// Containers created
    containers_created: AtomicU64,
    /// Containers destroyed
    containers_destroyed: AtomicU64,
    /// Transactions committed
    transactions_committed: AtomicU64,
    /// Transactions rolled back
    transactions_rolled_back: AtomicU64,
}

impl SpaceMetrics {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_write(&self, ok: bool) {
        let counter = if ok { &self.writes_ok } else { &self.writes_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read(&self, ok: bool) {
        let counter = if ok { &self.reads_ok } else { &self.reads_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_take(&self, ok: bool) {
        let counter = if ok { &self.takes_ok } else { &self.takes_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_containers_created(&self) {
        self.containers_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_containers_destroyed(&self) {
        self.containers_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transactions_committed(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transactions_rolled_back(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of every counter.
    pub fn snapshot(&self) -> SpaceMetricsSnapshot {
        SpaceMetricsSnapshot {
            writes_ok: self.writes_ok.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
            reads_ok: self.reads_ok.load(Ordering::Relaxed),
            reads_failed: self.reads_failed.load(Ordering::Relaxed),
            takes_ok: self.takes_ok.load(Ordering::Relaxed),
            takes_failed: self.takes_failed.load(Ordering::Relaxed),
            containers_created: self.containers_created.load(Ordering::Relaxed),
            containers_destroyed: self.containers_destroyed.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceMetricsSnapshot {
    pub writes_ok: u64,
    pub writes_failed: u64,
    pub reads_ok: u64,
    pub reads_failed: u64,
    pub takes_ok: u64,
    pub takes_failed: u64,
    pub containers_created: u64,
    pub containers_destroyed: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
}
