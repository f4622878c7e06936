//! Per-adapter broker metrics (§3 "Broker Metrics"), updated by the router
//! after every submission and read by the routing policies.

use common::{Symbol, Ts};
use dashmap::DashMap;
use parking_lot::Mutex;

use common::constants::METRICS_EMA_ALPHA;

/// Rolling metrics the router keeps for one registered adapter.
#[derive(Debug)]
pub struct BrokerMetrics {
    ema_latency_ms: Mutex<f64>,
    ema_cost_bps: Mutex<f64>,
    successful: std::sync::atomic::AtomicU64,
    total: std::sync::atomic::AtomicU64,
    last_order_time: Mutex<Option<Ts>>,
    available_volume: DashMap<Symbol, i64>,
}

impl Default for BrokerMetrics {
    fn default() -> Self {
        Self {
            ema_latency_ms: Mutex::new(0.0),
            ema_cost_bps: Mutex::new(0.0),
            successful: std::sync::atomic::AtomicU64::new(0),
            total: std::sync::atomic::AtomicU64::new(0),
            last_order_time: Mutex::new(None),
            available_volume: DashMap::new(),
        }
    }
}

impl BrokerMetrics {
    /// Fresh metrics for a newly registered adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a submission: observed latency, cost in basis
    /// points, and whether it ultimately succeeded. Updates both EMAs with
    /// `alpha = METRICS_EMA_ALPHA` (§4.2 "router updates metrics via EMA
    /// with alpha=0.2").
    pub fn record_submission(&self, latency_ms: f64, cost_bps: f64, success: bool) {
        let mut latency = self.ema_latency_ms.lock();
        *latency = ema(*latency, latency_ms);
        drop(latency);

        let mut cost = self.ema_cost_bps.lock();
        *cost = ema(*cost, cost_bps);
        drop(cost);

        self.total.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if success {
            self.successful.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        *self.last_order_time.lock() = Some(Ts::now());
    }

    /// Snapshot the available-volume figure last reported for `symbol`.
    pub fn set_available_volume(&self, symbol: Symbol, volume: i64) {
        self.available_volume.insert(symbol, volume);
    }

    /// Available volume last reported for `symbol`, or 0 if never reported.
    #[must_use]
    pub fn available_volume(&self, symbol: Symbol) -> i64 {
        self.available_volume.get(&symbol).map_or(0, |v| *v)
    }

    /// Current EMA latency, milliseconds.
    #[must_use]
    pub fn latency_ms(&self) -> f64 {
        *self.ema_latency_ms.lock()
    }

    /// Current EMA cost, basis points.
    #[must_use]
    pub fn cost_bps(&self) -> f64 {
        *self.ema_cost_bps.lock()
    }

    /// `successful / total`, or `1.0` (optimistic default) if nothing has
    /// been submitted yet so a fresh adapter isn't penalized.
    #[must_use]
    pub fn fill_rate(&self) -> f64 {
        let total = self.total.load(std::sync::atomic::Ordering::Relaxed);
        if total == 0 {
            return 1.0;
        }
        let successful = self.successful.load(std::sync::atomic::Ordering::Relaxed);
        successful as f64 / total as f64
    }

    /// Last time this adapter was given an order, if ever.
    #[must_use]
    pub fn last_order_time(&self) -> Option<Ts> {
        *self.last_order_time.lock()
    }
}

fn ema(prior: f64, sample: f64) -> f64 {
    if prior == 0.0 {
        return sample;
    }
    METRICS_EMA_ALPHA.mul_add(sample, (1.0 - METRICS_EMA_ALPHA) * prior)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rate_is_optimistic_before_any_submission() {
        let m = BrokerMetrics::new();
        assert_eq!(m.fill_rate(), 1.0);
    }

    #[test]
    fn fill_rate_tracks_success_ratio() {
        let m = BrokerMetrics::new();
        m.record_submission(10.0, 1.0, true);
        m.record_submission(10.0, 1.0, false);
        assert_eq!(m.fill_rate(), 0.5);
    }

    #[test]
    fn ema_converges_toward_repeated_samples() {
        let m = BrokerMetrics::new();
        for _ in 0..50 {
            m.record_submission(5.0, 2.0, true);
        }
        assert!((m.latency_ms() - 5.0).abs() < 0.1);
        assert!((m.cost_bps() - 2.0).abs() < 0.1);
    }

    #[test]
    fn available_volume_defaults_to_zero() {
        let m = BrokerMetrics::new();
        assert_eq!(m.available_volume(Symbol(1)), 0);
        m.set_available_volume(Symbol(1), 500);
        assert_eq!(m.available_volume(Symbol(1)), 500);
    }
}
