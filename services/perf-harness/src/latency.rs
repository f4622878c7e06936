//! Latency tracking built on `hdrhistogram`, mirroring the percentile
//! reporting the project's own WAL/replay benchmarks use.

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// A single latency measurement in progress; records its elapsed time
/// into a [`LatencyTracker`] on drop via [`LatencySample::finish`] (no
/// `Drop` impl — forgetting to call `finish` just discards the sample
/// rather than recording a bogus zero).
pub struct LatencySample {
    started_at: Instant,
}

impl LatencySample {
    /// Start timing now.
    #[must_use]
    pub fn start() -> Self {
        Self { started_at: Instant::now() }
    }

    /// Stop timing and return the elapsed duration.
    #[must_use]
    pub fn finish(self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Thread-safe microsecond-resolution latency histogram with 3
/// significant decimal digits, matching the precision the project's
/// perf tooling already reports at.
pub struct LatencyTracker {
    histogram: Mutex<Histogram<u64>>,
}

impl LatencyTracker {
    /// A tracker with no samples recorded yet.
    pub fn new() -> Result<Self, hdrhistogram::CreationError> {
        Ok(Self { histogram: Mutex::new(Histogram::new(3)?) })
    }

    /// Record one latency sample, in microseconds.
    pub fn record(&self, duration: Duration) {
        let micros = duration.as_micros().min(u128::from(u64::MAX)) as u64;
        let _ = self.histogram.lock().record(micros);
    }

    /// Time `f`, record its latency, and return its result.
    pub fn measure<T>(&self, f: impl FnOnce() -> T) -> T {
        let sample = LatencySample::start();
        let result = f();
        self.record(sample.finish());
        result
    }

    /// A point-in-time snapshot of percentiles, in microseconds.
    #[must_use]
    pub fn summary(&self) -> LatencySummary {
        let histogram = self.histogram.lock();
        if histogram.is_empty() {
            return LatencySummary::default();
        }
        LatencySummary {
            count: histogram.len(),
            p50_us: histogram.value_at_percentile(50.0),
            p95_us: histogram.value_at_percentile(95.0),
            p99_us: histogram.value_at_percentile(99.0),
            p999_us: histogram.value_at_percentile(99.9),
            max_us: histogram.max(),
        }
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new().expect("histogram sigfigs within hdrhistogram's valid range")
    }
}

/// Percentile snapshot, all values in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencySummary {
    /// Number of samples the snapshot was computed over.
    pub count: u64,
    /// 50th percentile.
    pub p50_us: u64,
    /// 95th percentile.
    pub p95_us: u64,
    /// 99th percentile.
    pub p99_us: u64,
    /// 99.9th percentile.
    pub p999_us: u64,
    /// Maximum observed.
    pub max_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_reports_zeroed_summary() {
        let tracker = LatencyTracker::default();
        assert_eq!(tracker.summary(), LatencySummary::default());
    }

    #[test]
    fn percentiles_reflect_recorded_samples() {
        let tracker = LatencyTracker::default();
        for ms in [1, 2, 3, 4, 100] {
            tracker.record(Duration::from_millis(ms));
        }
        let summary = tracker.summary();
        assert_eq!(summary.count, 5);
        assert!(summary.max_us >= 100_000);
        assert!(summary.p50_us <= summary.p99_us);
    }

    #[test]
    fn measure_times_the_closure_and_returns_its_value() {
        let tracker = LatencyTracker::default();
        let result = tracker.measure(|| 1 + 1);
        assert_eq!(result, 2);
        assert_eq!(tracker.summary().count, 1);
    }
}
