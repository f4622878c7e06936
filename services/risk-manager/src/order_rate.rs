//! Per-strategy order-rate window, backing check (6) orders-per-minute
//! (§4.3: "an append-only order-history window used by (6)").

use std::sync::Arc;

use common::Ts;
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

const WINDOW_NANOS: u64 = 60_000_000_000;

/// Tracks recent order timestamps per strategy so the rate check can count
/// how many orders a strategy has submitted in the trailing minute.
#[derive(Default)]
pub struct OrderRateWindow {
    timestamps: DashMap<Uuid, Arc<Mutex<Vec<u64>>>>,
}

impl OrderRateWindow {
    /// An empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders submitted by `strategy_id` in the 60s trailing `now`.
    #[must_use]
    pub fn count_in_last_minute(&self, strategy_id: Uuid, now: Ts) -> usize {
        let Some(bucket) = self.timestamps.get(&strategy_id) else {
            return 0;
        };
        let cutoff = now.as_nanos().saturating_sub(WINDOW_NANOS);
        bucket.lock().iter().filter(|&&ts| ts > cutoff).count()
    }

    /// Record that `strategy_id` submitted an order at `now`, pruning
    /// entries older than the window so the bucket doesn't grow unbounded.
    pub fn record(&self, strategy_id: Uuid, now: Ts) {
        let bucket = self
            .timestamps
            .entry(strategy_id)
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone();
        let cutoff = now.as_nanos().saturating_sub(WINDOW_NANOS);
        let mut guard = bucket.lock();
        guard.retain(|&ts| ts > cutoff);
        guard.push(now.as_nanos());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_orders_within_window() {
        let window = OrderRateWindow::new();
        let strategy = Uuid::nil();
        window.record(strategy, Ts::from_millis(0));
        window.record(strategy, Ts::from_millis(89_000));
        assert_eq!(
            window.count_in_last_minute(strategy, Ts::from_millis(90_001)),
            1
        );
    }
}
