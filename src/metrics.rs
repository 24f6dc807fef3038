use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for the mapping layer, shared by the manager and the HTTP surface.
#[derive(Clone)]
pub struct Metrics {
    pub lookups: Arc<AtomicU64>,
    pub cache_hits: Arc<AtomicU64>,
    pub cache_misses: Arc<AtomicU64>,
    pub cache_errors: Arc<AtomicU64>,
    pub store_reads: Arc<AtomicU64>,
    pub mappings_created: Arc<AtomicU64>,
    pub mappings_updated: Arc<AtomicU64>,
    pub bulk_items_failed: Arc<AtomicU64>,
    pub cleanup_runs: Arc<AtomicU64>,
    pub cleanup_failures: Arc<AtomicU64>,
    pub mappings_deleted: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            lookups: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
            cache_errors: Arc::new(AtomicU64::new(0)),
            store_reads: Arc::new(AtomicU64::new(0)),
            mappings_created: Arc::new(AtomicU64::new(0)),
            mappings_updated: Arc::new(AtomicU64::new(0)),
            bulk_items_failed: Arc::new(AtomicU64::new(0)),
            cleanup_runs: Arc::new(AtomicU64::new(0)),
            cleanup_failures: Arc::new(AtomicU64::new(0)),
            mappings_deleted: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_lookups(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_errors(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_store_reads(&self) {
        self.store_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_created(&self) {
        self.mappings_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_updated(&self) {
        self.mappings_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bulk_failures(&self, count: u64) {
        self.bulk_items_failed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_cleanup_runs(&self) {
        self.cleanup_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_cleanup_failures(&self, count: u64) {
        self.cleanup_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_deleted(&self, count: u64) {
        self.mappings_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            store_reads: self.store_reads.load(Ordering::Relaxed),
            mappings_created: self.mappings_created.load(Ordering::Relaxed),
            mappings_updated: self.mappings_updated.load(Ordering::Relaxed),
            bulk_items_failed: self.bulk_items_failed.load(Ordering::Relaxed),
            cleanup_runs: self.cleanup_runs.load(Ordering::Relaxed),
            cleanup_failures: self.cleanup_failures.load(Ordering::Relaxed),
            mappings_deleted: self.mappings_deleted.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub lookups: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    pub store_reads: u64,
    pub mappings_created: u64,
    pub mappings_updated: u64,
    pub bulk_items_failed: u64,
    pub cleanup_runs: u64,
    pub cleanup_failures: u64,
    pub mappings_deleted: u64,
    pub uptime_seconds: u64,
}
