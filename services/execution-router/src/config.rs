//! Submission pipeline tunables (§4.5).

use serde::{Deserialize, Serialize};

/// Admission-stage token bucket (§4.5 step 1): `rate` tokens refill per
/// second, up to a burst capacity of `rate * burst_factor`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Steady-state tokens/second.
    pub rate: f64,
    /// Burst capacity as a multiple of `rate`.
    pub burst_factor: f64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self { rate: 50.0, burst_factor: 2.0 }
    }
}

/// Optional batching stage (§4.5 step 3): orders are grouped once
/// `batch_size` accumulate or `batch_interval_ms` elapses, whichever first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Max orders per batch.
    pub batch_size: usize,
    /// Max time to wait for a batch to fill.
    pub batch_interval_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { batch_size: 16, batch_interval_ms: 50 }
    }
}

/// Per-adapter circuit breaker thresholds (§4.5 step 5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Consecutive failures within `window_ms` before opening.
    pub max_failures: u64,
    /// How long the breaker stays open before probing (ms).
    pub reset_timeout_ms: u64,
    /// Probe operations admitted per half-open window.
    pub half_open_max_ops: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self { max_failures: 5, reset_timeout_ms: 10_000, half_open_max_ops: 1 }
    }
}

/// Submit+retry stage (§4.5 step 6): exponential backoff with jitter,
/// `base_delay_ms * 2^attempt * (1 +/- jitter)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts after the first.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub base_delay_ms: u64,
    /// Symmetric jitter fraction applied to each computed delay.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 100, jitter: 0.2 }
    }
}

/// Full submission pipeline configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    /// Admission rate limiter.
    pub admission: AdmissionConfig,
    /// Batching stage.
    pub batch: BatchConfig,
    /// Circuit breaker, one instance per adapter sharing these thresholds.
    pub circuit: CircuitConfig,
    /// Submit+retry stage.
    pub retry: RetryConfig,
}
