//! Logger metrics for observability
//!
//! Counters recording what the logging pipeline could not report to callers:
//! per-sink delivery failures, background flush failures and backpressure.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// # Example
///
/// ```
/// use sparrow_log::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
///
/// metrics.record_logged();
/// metrics.record_sink_failure();
///
/// assert_eq!(metrics.total_logged(), 1);
/// assert_eq!(metrics.sink_failures(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Records delivered to every admitting sink
    total_logged: AtomicU64,

    /// Records at least one sink failed to accept
    dropped_count: AtomicU64,

    /// Individual sink write failures (several per record possible)
    sink_failures: AtomicU64,

    /// Flushes started by a background worker that failed
    background_flush_failures: AtomicU64,

    /// Writes that had to wait for buffer space
    block_events: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            total_logged: AtomicU64::new(0),
            dropped_count: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            background_flush_failures: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn total_logged(&self) -> u64 {
        self.total_logged.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn background_flush_failures(&self) -> u64 {
        self.background_flush_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    /// Record a successfully delivered entry
    #[inline]
    pub fn record_logged(&self) -> u64 {
        self.total_logged.fetch_add(1, Ordering::Relaxed)
    }

    /// Record an entry some sink did not accept
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_background_flush_failure(&self) -> u64 {
        self.background_flush_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Get drop rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if no records have been processed.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.total_logged() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.total_logged.store(0, Ordering::Relaxed);
        self.dropped_count.store(0, Ordering::Relaxed);
        self.sink_failures.store(0, Ordering::Relaxed);
        self.background_flush_failures.store(0, Ordering::Relaxed);
        self.block_events.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            total_logged: AtomicU64::new(self.total_logged()),
            dropped_count: AtomicU64::new(self.dropped_count()),
            sink_failures: AtomicU64::new(self.sink_failures()),
            background_flush_failures: AtomicU64::new(self.background_flush_failures()),
            block_events: AtomicU64::new(self.block_events()),
        }
    }
}
