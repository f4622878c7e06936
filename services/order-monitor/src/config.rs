//! Monitor thresholds (§4.7).

use serde::{Deserialize, Serialize};

/// Tunables for when each alert kind fires.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Grace period added to an order's `expected_time` before `Delayed`
    /// fires.
    pub delay_threshold_ms: u64,
    /// How long an order may sit in `PartiallyFilled` with no update
    /// before `PartialFillStalled` fires.
    pub stall_threshold_ms: u64,
    /// Fractional deviation of average fill price from the limit price
    /// that triggers `PriceDeviation`, e.g. `0.01` = 1%.
    pub deviation_pct: f64,
    /// How often the caller should re-sync status from the adapter and
    /// call [`crate::tracker::OrderMonitor::poll`].
    pub poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            delay_threshold_ms: 5_000,
            stall_threshold_ms: 30_000,
            deviation_pct: 0.01,
            poll_interval_ms: 1_000,
        }
    }
}
