//! In-process counters reported by the health endpoint

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording ingest counters
#[derive(Debug, Default)]
pub struct Metrics {
    videos_ingested: AtomicU64,
    ingest_failed: AtomicU64,
    duplicates_rejected: AtomicU64,
    videos_deleted: AtomicU64,
    rollbacks: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video_ingested(&self) {
        self.videos_ingested.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "videos_ingested", "Metric incremented");
    }

    pub fn ingest_failed(&self) {
        self.ingest_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "ingest_failed", "Metric incremented");
    }

    pub fn duplicate_rejected(&self) {
        self.duplicates_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "duplicates_rejected", "Metric incremented");
    }

    pub fn video_deleted(&self) {
        self.videos_deleted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "videos_deleted", "Metric incremented");
    }

    pub fn rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "rollbacks", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            videos_ingested: self.videos_ingested.load(Ordering::Relaxed),
            ingest_failed: self.ingest_failed.load(Ordering::Relaxed),
            duplicates_rejected: self.duplicates_rejected.load(Ordering::Relaxed),
            videos_deleted: self.videos_deleted.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub videos_ingested: u64,
    pub ingest_failed: u64,
    pub duplicates_rejected: u64,
    pub videos_deleted: u64,
    pub rollbacks: u64,
}
