//! Counters for device-side work issued by a context.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// GPU activity collector, one per [`DeviceContext`](crate::gpu::DeviceContext)
#[derive(Debug)]
pub struct Metrics {
    // Resource counters
    buffers_created: AtomicU64,
    bytes_allocated: AtomicU64,

    // Transfer counters
    device_copies: AtomicU64,
    host_copies: AtomicU64,

    // Kernel counters
    kernels_compiled: AtomicU64,
    dispatches: AtomicU64,
    submissions: AtomicU64,

    // Time spent in `block()` (protected by RwLock for interior mutability)
    block_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        // 3 significant figures, auto-resizing so a long drain never fails to record
        let mut histogram = Histogram::new(3).expect("3 significant figures is a valid precision");
        histogram.auto(true);

        Self {
            buffers_created: AtomicU64::new(0),
            bytes_allocated: AtomicU64::new(0),
            device_copies: AtomicU64::new(0),
            host_copies: AtomicU64::new(0),
            kernels_compiled: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            submissions: AtomicU64::new(0),
            block_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        }
    }

    /// Record creation of a device buffer
    pub fn record_buffer_created(&self, bytes: u64) {
        self.buffers_created.fetch_add(1, Ordering::Relaxed);
        self.bytes_allocated.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a buffer-to-buffer copy encoded on the device
    pub fn record_device_copy(&self) {
        self.device_copies.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a copy performed through host mappings
    pub fn record_host_copy(&self) {
        self.host_copies.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successfully built compute pipeline
    pub fn record_kernel_compiled(&self) {
        self.kernels_compiled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one compute dispatch
    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one queue submission
    pub fn record_submission(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long a queue drain took
    pub fn record_block(&self, waited: Duration) {
        if let Some(mut hist) = self.block_histogram.try_write() {
            let _ = hist.record(waited.as_nanos().min(u64::MAX as u128) as u64);
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.block_histogram.read();

        MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: self.start_time.elapsed(),
            buffers_created: self.buffers_created.load(Ordering::Relaxed),
            bytes_allocated: self.bytes_allocated.load(Ordering::Relaxed),
            device_copies: self.device_copies.load(Ordering::Relaxed),
            host_copies: self.host_copies.load(Ordering::Relaxed),
            kernels_compiled: self.kernels_compiled.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            submissions: self.submissions.load(Ordering::Relaxed),
            blocks: histogram.len(),
            avg_block_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p99_block_ns: histogram.value_at_quantile(0.99),
            max_block_ns: histogram.max(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.buffers_created.store(0, Ordering::Relaxed);
        self.bytes_allocated.store(0, Ordering::Relaxed);
        self.device_copies.store(0, Ordering::Relaxed);
        self.host_copies.store(0, Ordering::Relaxed);
        self.kernels_compiled.store(0, Ordering::Relaxed);
        self.dispatches.store(0, Ordering::Relaxed);
        self.submissions.store(0, Ordering::Relaxed);

        if let Some(mut hist) = self.block_histogram.try_write() {
            hist.reset();
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// When the snapshot was taken
    pub timestamp: Instant,
    /// Time since the collector was created
    pub uptime: Duration,
    /// Device buffers allocated, across all transitions
    pub buffers_created: u64,
    /// Bytes allocated by those buffers
    pub bytes_allocated: u64,
    /// `copy_buffer_to_buffer` submissions
    pub device_copies: u64,
    /// Copies through host mappings
    pub host_copies: u64,
    /// Pipelines built
    pub kernels_compiled: u64,
    /// Compute dispatches
    pub dispatches: u64,
    /// Queue submissions of any kind
    pub submissions: u64,
    /// Completed `block()` calls
    pub blocks: u64,
    /// Mean `block()` wait in nanoseconds
    pub avg_block_ns: u64,
    /// 99th percentile `block()` wait in nanoseconds
    pub p99_block_ns: u64,
    /// Longest `block()` wait in nanoseconds
    pub max_block_ns: u64,
}

impl MetricsSnapshot {
    /// Dispatches per second since the context was created
    pub fn dispatches_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.dispatches as f64 / seconds
    }

    /// Copies of either kind
    pub fn total_copies(&self) -> u64 {
        self.device_copies + self.host_copies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new();

        metrics.record_buffer_created(4096);
        metrics.record_buffer_created(1024);
        metrics.record_device_copy();
        metrics.record_host_copy();
        metrics.record_dispatch();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.buffers_created, 2);
        assert_eq!(snapshot.bytes_allocated, 5120);
        assert_eq!(snapshot.total_copies(), 2);
        assert_eq!(snapshot.dispatches, 1);
        assert_eq!(snapshot.blocks, 0);
        assert_eq!(snapshot.avg_block_ns, 0);
    }

    #[test]
    fn test_block_histogram() {
        let metrics = Metrics::new();

        metrics.record_block(Duration::from_micros(10));
        metrics.record_block(Duration::from_micros(30));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.blocks, 2);
        assert!(snapshot.avg_block_ns > 0);
        assert!(snapshot.max_block_ns >= 29_000);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = Metrics::new();

        metrics.record_kernel_compiled();
        metrics.record_submission();
        metrics.record_block(Duration::from_millis(1));
        assert_eq!(metrics.snapshot().kernels_compiled, 1);

        metrics.reset();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.kernels_compiled, 0);
        assert_eq!(snapshot.submissions, 0);
        assert_eq!(snapshot.blocks, 0);
    }
}
