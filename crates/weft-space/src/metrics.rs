//! Store-owned observability counters.
//!
//! Purely observational: counters are updated on every mutation but never
//! affect correctness or ordering. The state lives inside the store value —
//! initialized by the constructor, dropped with the store — rather than in
//! a process-wide registry.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative mutation counters for one store.
#[derive(Debug, Default)]
pub(crate) struct SpaceMetrics {
    datums_put: AtomicU64,
    continuations_put: AtomicU64,
    datums_removed: AtomicU64,
    continuations_removed: AtomicU64,
    installs: AtomicU64,
    orphans_evicted: AtomicU64,
}

impl SpaceMetrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn datum_put(&self) {
        self.datums_put.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn continuation_put(&self) {
        self.continuations_put.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn datum_removed(&self) {
        self.datums_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn continuation_removed(&self) {
        self.continuations_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn install(&self) {
        self.installs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn orphan_evicted(&self) {
        self.orphans_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, records: usize, join_channels: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            records,
            join_channels,
            datums_put: self.datums_put.load(Ordering::Relaxed),
            continuations_put: self.continuations_put.load(Ordering::Relaxed),
            datums_removed: self.datums_removed.load(Ordering::Relaxed),
            continuations_removed: self.continuations_removed.load(Ordering::Relaxed),
            installs: self.installs.load(Ordering::Relaxed),
            orphans_evicted: self.orphans_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time read-out of the store's metrics.
///
/// `records` and `join_channels` are current gauges; the rest are
/// cumulative counters since the store was created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records: usize,
    pub join_channels: usize,
    pub datums_put: u64,
    pub continuations_put: u64,
    pub datums_removed: u64,
    pub continuations_removed: u64,
    pub installs: u64,
    pub orphans_evicted: u64,
}
