//! Ingestion counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters updated by the pipeline.
#[derive(Debug, Default)]
pub struct IngestStats {
    batches_completed: AtomicU64,
    batches_rejected: AtomicU64,
    batches_failed: AtomicU64,
    records_succeeded: AtomicU64,
    records_failed: AtomicU64,
    chunks_dispatched: AtomicU64,
    chunks_unresolved: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub batches_completed: u64,
    pub batches_rejected: u64,
    pub batches_failed: u64,
    pub records_succeeded: u64,
    pub records_failed: u64,
    pub chunks_dispatched: u64,
    pub chunks_unresolved: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn batch_completed(&self, succeeded: u64, failed: u64) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
        self.records_succeeded.fetch_add(succeeded, Ordering::Relaxed);
        self.records_failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub(crate) fn batch_rejected(&self) {
        self.batches_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn chunk_dispatched(&self) {
        self.chunks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn chunk_unresolved(&self) {
        self.chunks_unresolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            batches_rejected: self.batches_rejected.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records_succeeded: self.records_succeeded.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            chunks_dispatched: self.chunks_dispatched.load(Ordering::Relaxed),
            chunks_unresolved: self.chunks_unresolved.load(Ordering::Relaxed),
        }
    }
}
