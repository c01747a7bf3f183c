//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations so the frame loop never blocks on
//! the reporter. `report()` swaps the periodic counters to zero; totals are
//! monotonic.
//!
//! NOTE: All atomics use Relaxed ordering. These are statistical counters
//! only and must not drive coaching decisions.

use crate::domain::types::DepthCategory;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Frame processing latency bucket boundaries (microseconds)
/// Buckets: ≤5, ≤10, ≤20, ≤40, ≤80, ≤160, ≤320, ≤640, ≤1280, ≤2560, >2560
const BUCKET_BOUNDS: [u64; 10] = [5, 10, 20, 40, 80, 160, 320, 640, 1280, 2560];
const NUM_BUCKETS: usize = 11;

/// Upper bounds used for percentile estimation (last bucket uses 2x the previous bound)
const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
    [5, 10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120];

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;
    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Frames fed to the coach (monotonic)
    frames_total: AtomicU64,
    /// Frames since last report (reset on report)
    frames_since_report: AtomicU64,
    /// Training frames skipped for a missing hip (monotonic)
    frames_skipped: AtomicU64,
    /// Input lines that failed to parse (monotonic)
    frames_malformed: AtomicU64,
    /// Sum of frame latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max frame latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Frame latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    reps_shallow: AtomicU64,
    reps_medium: AtomicU64,
    reps_deep: AtomicU64,
    beats_total: AtomicU64,
    behind_tempo_total: AtomicU64,
    /// Events handed to egress (monotonic)
    events_emitted: AtomicU64,
    /// Events lost because the egress writer had gone away (monotonic)
    events_dropped: AtomicU64,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_total: AtomicU64::new(0),
            frames_since_report: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            frames_malformed: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            reps_shallow: AtomicU64::new(0),
            reps_medium: AtomicU64::new(0),
            reps_deep: AtomicU64::new(0),
            beats_total: AtomicU64::new(0),
            behind_tempo_total: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a processed frame with its latency (lock-free)
    #[inline]
    pub fn record_frame_processed(&self, latency_us: u64) {
        self.frames_total.fetch_add(1, Ordering::Relaxed);
        self.frames_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_frame_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_malformed(&self) {
        self.frames_malformed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rep(&self, category: DepthCategory) {
        let counter = match category {
            DepthCategory::Shallow => &self.reps_shallow,
            DepthCategory::Medium => &self.reps_medium,
            DepthCategory::Deep => &self.reps_deep,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_beat(&self, behind_tempo: bool) {
        self.beats_total.fetch_add(1, Ordering::Relaxed);
        if behind_tempo {
            self.behind_tempo_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_event_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_total(&self) -> u64 {
        self.frames_total.load(Ordering::Relaxed)
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped.load(Ordering::Relaxed)
    }

    pub fn frames_malformed(&self) -> u64 {
        self.frames_malformed.load(Ordering::Relaxed)
    }

    pub fn beats_total(&self) -> u64 {
        self.beats_total.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    /// Snapshot the counters and reset the periodic ones
    pub fn report(&self) -> MetricsSummary {
        let frames_count = self.frames_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let frames_per_sec = if elapsed.as_secs_f64() > 0.0 {
            frames_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let avg_latency = if frames_count > 0 { latency_sum / frames_count } else { 0 };

        MetricsSummary {
            frames_total: self.frames_total.load(Ordering::Relaxed),
            frames_per_sec,
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            avg_frame_latency_us: avg_latency,
            max_frame_latency_us: max_latency,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            lat_buckets,
            reps_shallow: self.reps_shallow.load(Ordering::Relaxed),
            reps_medium: self.reps_medium.load(Ordering::Relaxed),
            reps_deep: self.reps_deep.load(Ordering::Relaxed),
            beats_total: self.beats_total.load(Ordering::Relaxed),
            behind_tempo_total: self.behind_tempo_total.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub frames_total: u64,
    pub frames_per_sec: f64,
    pub frames_skipped: u64,
    pub frames_malformed: u64,
    pub avg_frame_latency_us: u64,
    pub max_frame_latency_us: u64,
    /// Bounds: ≤5, ≤10, ≤20, ≤40, ≤80, ≤160, ≤320, ≤640, ≤1280, ≤2560, >2560 µs
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p99_us: u64,
    pub reps_shallow: u64,
    pub reps_medium: u64,
    pub reps_deep: u64,
    pub beats_total: u64,
    pub behind_tempo_total: u64,
    pub events_emitted: u64,
    pub events_dropped: u64,
}

impl MetricsSummary {
    pub fn reps_total(&self) -> u64 {
        self.reps_shallow + self.reps_medium + self.reps_deep
    }

    pub fn log(&self) {
        info!(
            frames_total = %self.frames_total,
            frames_per_sec = format!("{:.1}", self.frames_per_sec),
            frames_skipped = %self.frames_skipped,
            frames_malformed = %self.frames_malformed,
            avg_latency_us = %self.avg_frame_latency_us,
            max_latency_us = %self.max_frame_latency_us,
            p50_us = %self.lat_p50_us,
            p99_us = %self.lat_p99_us,
            reps = %self.reps_total(),
            beats = %self.beats_total,
            behind_tempo = %self.behind_tempo_total,
            events_dropped = %self.events_dropped,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.frames_total(), 0);
        assert_eq!(metrics.beats_total(), 0);
    }

    #[test]
    fn test_report() {
        let metrics = Metrics::new();
        metrics.record_frame_processed(10);
        metrics.record_frame_processed(20);
        metrics.record_frame_processed(30);
        metrics.record_rep(DepthCategory::Deep);
        metrics.record_rep(DepthCategory::Shallow);
        metrics.record_beat(false);
        metrics.record_beat(true);

        let summary = metrics.report();
        assert_eq!(summary.frames_total, 3);
        assert_eq!(summary.avg_frame_latency_us, 20);
        assert_eq!(summary.max_frame_latency_us, 30);
        assert_eq!(summary.reps_total(), 2);
        assert_eq!(summary.reps_deep, 1);
        assert_eq!(summary.beats_total, 2);
        assert_eq!(summary.behind_tempo_total, 1);

        // Periodic counters reset, totals kept
        assert_eq!(metrics.frames_since_report.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.latency_max_us.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.report().frames_total, 3);
    }

    #[test]
    fn test_report_empty() {
        let summary = Metrics::new().report();
        assert_eq!(summary.frames_total, 0);
        assert_eq!(summary.avg_frame_latency_us, 0);
        assert_eq!(summary.lat_p99_us, 0);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(Metrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = metrics.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        m.record_frame_processed(i as u64);
                        m.record_event_emitted();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.frames_total(), 8_000);
        assert_eq!(metrics.report().events_emitted, 8_000);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(5), 0);
        assert_eq!(bucket_index(6), 1);
        assert_eq!(bucket_index(2560), 9);
        assert_eq!(bucket_index(2561), 10);
    }

    #[test]
    fn test_percentile_computation() {
        let metrics = Metrics::new();
        for _ in 0..100 {
            metrics.record_frame_processed(15);
        }
        let summary = metrics.report();
        assert_eq!(summary.lat_buckets[2], 100);
        assert_eq!(summary.lat_p50_us, 20);
        assert_eq!(summary.lat_p99_us, 20);
    }

    #[test]
    fn test_drop_and_skip_counters() {
        let metrics = Metrics::new();
        metrics.record_frame_skipped();
        metrics.record_frame_malformed();
        metrics.record_frame_malformed();
        metrics.record_event_dropped();
        assert_eq!(metrics.frames_skipped(), 1);
        assert_eq!(metrics.frames_malformed(), 2);
        assert_eq!(metrics.events_dropped(), 1);
    }
}
