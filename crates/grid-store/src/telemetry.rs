//! Observability context handed to a [`GridStore`](crate::GridStore).
//!
//! Each store owns its counters and a parent span. Engine spans and the
//! spans of the workers they spawn hang off that parent, so a fan-out's
//! logs stay attributable to the store that issued them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::Span;

/// Counters for one store.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    range_queries: AtomicU64,
    records_scanned: AtomicU64,
    points_emitted: AtomicU64,
    decode_failures: AtomicU64,
    records_upserted: AtomicU64,
    records_deleted: AtomicU64,
    worker_failures: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One range query returning `records` rows.
    pub fn record_range_query(&self, records: usize) {
        self.range_queries.fetch_add(1, Ordering::Relaxed);
        self.records_scanned
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_points(&self, count: usize) {
        self.points_emitted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upserted(&self, count: usize) {
        self.records_upserted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_deleted(&self, count: usize) {
        self.records_deleted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_worker_failure(&self) {
        self.worker_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            range_queries: self.range_queries.load(Ordering::Relaxed),
            records_scanned: self.records_scanned.load(Ordering::Relaxed),
            points_emitted: self.points_emitted.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            records_upserted: self.records_upserted.load(Ordering::Relaxed),
            records_deleted: self.records_deleted.load(Ordering::Relaxed),
            worker_failures: self.worker_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetricsSnapshot {
    pub range_queries: u64,
    pub records_scanned: u64,
    pub points_emitted: u64,
    pub decode_failures: u64,
    pub records_upserted: u64,
    pub records_deleted: u64,
    pub worker_failures: u64,
}

/// Parent span and counters for one store.
#[derive(Debug, Clone)]
pub struct Telemetry {
    span: Span,
    metrics: Arc<StoreMetrics>,
}

impl Telemetry {
    /// Telemetry rooted at `span` with fresh counters.
    pub fn new(span: Span) -> Self {
        Self {
            span,
            metrics: Arc::new(StoreMetrics::new()),
        }
    }

    /// Telemetry sharing existing counters.
    pub fn with_metrics(span: Span, metrics: Arc<StoreMetrics>) -> Self {
        Self { span, metrics }
    }

    /// Telemetry with no parent span, for tests and embedded use.
    pub fn disabled() -> Self {
        Self::new(Span::none())
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Counter handle for spawned workers.
    pub(crate) fn shared_metrics(&self) -> Arc<StoreMetrics> {
        self.metrics.clone()
    }
}
