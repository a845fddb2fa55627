use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing request outcomes.
#[derive(Default)]
pub struct ServiceMetrics {
    documents_analyzed: AtomicU64,
    classifications: AtomicU64,
    checkouts_created: AtomicU64,
    failures: AtomicU64,
}

impl ServiceMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully analyzed document.
    pub fn record_analysis(&self) {
        self.documents_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful clause classification.
    pub fn record_classification(&self) {
        self.classifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a created checkout session.
    pub fn record_checkout(&self) {
        self.checkouts_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that ended in an error response.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_analyzed: self.documents_analyzed.load(Ordering::Relaxed),
            classifications: self.classifications.load(Ordering::Relaxed),
            checkouts_created: self.checkouts_created.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of request counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents analyzed since startup.
    pub documents_analyzed: u64,
    /// Clause classifications completed since startup.
    pub classifications: u64,
    /// Checkout sessions created since startup.
    pub checkouts_created: u64,
    /// Requests answered with an error since startup.
    pub failures: u64,
}
