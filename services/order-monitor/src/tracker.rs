//! Per-order SLA tracking and alert de-duplication (§4.7).

use dashmap::DashMap;
use uuid::Uuid;

use common::{Px, Ts};
use oms::order::{Order, OrderStatus};

use crate::alert::{Alert, AlertKind};
use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};

/// What the monitor remembers about one tracked order, independent of the
/// order's own record (the monitor polls adapters/OMS and re-syncs against
/// this on its own cadence).
struct TrackedOrder {
    monitoring_start: Ts,
    expected_time_ms: u64,
    last_known_status: OrderStatus,
}

/// Tracks open orders against their expected completion time and raises
/// alerts when they breach one of the four thresholds in §4.7.
pub struct OrderMonitor {
    tracked: DashMap<Uuid, TrackedOrder>,
    alerts: DashMap<Uuid, Alert>,
    active_by_kind: DashMap<(Uuid, AlertKind), Uuid>,
    config: MonitorConfig,
}

impl OrderMonitor {
    /// A monitor with no orders tracked yet.
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            tracked: DashMap::new(),
            alerts: DashMap::new(),
            active_by_kind: DashMap::new(),
            config,
        }
    }

    /// Begin tracking `order_id`, expected to complete within
    /// `expected_time_ms` of now.
    pub fn track(&self, order_id: Uuid, expected_time_ms: u64, initial_status: OrderStatus) {
        self.tracked.insert(
            order_id,
            TrackedOrder {
                monitoring_start: Ts::now(),
                expected_time_ms,
                last_known_status: initial_status,
            },
        );
    }

    /// Stop tracking an order (it reached a terminal state the caller has
    /// already handled, or was dropped from the book).
    pub fn untrack(&self, order_id: Uuid) {
        self.tracked.remove(&order_id);
    }

    /// Re-sync against `order`'s current state and raise any new,
    /// non-duplicate alerts. Called at [`MonitorConfig::poll_interval_ms`]
    /// cadence by the caller.
    pub fn poll(&self, order: &Order) -> Vec<Alert> {
        let Some(mut tracked) = self.tracked.get_mut(&order.id) else {
            return vec![];
        };
        let now = Ts::now();
        let mut raised = Vec::new();

        let elapsed_ms = now.as_millis().saturating_sub(tracked.monitoring_start.as_millis());
        if elapsed_ms > tracked.expected_time_ms.saturating_add(self.config.delay_threshold_ms) {
            if let Some(alert) = self.raise(
                order.id,
                AlertKind::Delayed,
                format!(
                    "order {} has been open {elapsed_ms}ms, expected {}ms",
                    order.id, tracked.expected_time_ms
                ),
                now,
            ) {
                raised.push(alert);
            }
        }

        if order.status == OrderStatus::PartiallyFilled {
            let since_update_ms = now.as_millis().saturating_sub(order.updated_at.as_millis());
            if since_update_ms > self.config.stall_threshold_ms {
                if let Some(alert) = self.raise(
                    order.id,
                    AlertKind::PartialFillStalled,
                    format!("order {} stalled at partial fill for {since_update_ms}ms", order.id),
                    now,
                ) {
                    raised.push(alert);
                }
            }
        }

        if let Some(limit) = order.price {
            if order.average_filled_price != Px::ZERO && limit.as_i64() != 0 {
                let deviation = (order.average_filled_price.as_f64() - limit.as_f64()).abs() / limit.as_f64();
                if deviation > self.config.deviation_pct {
                    if let Some(alert) = self.raise(
                        order.id,
                        AlertKind::PriceDeviation,
                        format!(
                            "order {} avg fill {:.4} deviates {:.2}% from limit {:.4}",
                            order.id,
                            order.average_filled_price.as_f64(),
                            deviation * 100.0,
                            limit.as_f64()
                        ),
                        now,
                    ) {
                        raised.push(alert);
                    }
                }
            }
        }

        if order.status == OrderStatus::Rejected && tracked.last_known_status != OrderStatus::Rejected {
            if let Some(alert) = self.raise(
                order.id,
                AlertKind::Rejected,
                format!("order {} was rejected", order.id),
                now,
            ) {
                raised.push(alert);
            }
        }

        tracked.last_known_status = order.status;
        raised
    }

    /// Raise an alert of `kind` for `order_id` unless one is already active
    /// (unacknowledged) for that same `(order_id, kind)` pair.
    fn raise(&self, order_id: Uuid, kind: AlertKind, message: String, now: Ts) -> Option<Alert> {
        if self.active_by_kind.contains_key(&(order_id, kind)) {
            return None;
        }
        let alert = Alert { id: Uuid::new_v4(), order_id, kind, message, raised_at: now, acknowledged: false };
        self.active_by_kind.insert((order_id, kind), alert.id);
        self.alerts.insert(alert.id, alert.clone());
        Some(alert)
    }

    /// Acknowledge an alert, allowing its `(order, kind)` pair to fire
    /// again in a future poll.
    pub fn acknowledge(&self, alert_id: Uuid) -> MonitorResult<()> {
        let mut entry = self.alerts.get_mut(&alert_id).ok_or(MonitorError::AlertNotFound { alert_id })?;
        entry.acknowledged = true;
        self.active_by_kind.remove(&(entry.order_id, entry.kind));
        Ok(())
    }

    /// All alerts ever raised for `order_id`, acknowledged or not.
    #[must_use]
    pub fn alerts_for(&self, order_id: Uuid) -> Vec<Alert> {
        self.alerts.iter().filter(|e| e.order_id == order_id).map(|e| e.value().clone()).collect()
    }

    /// Every unacknowledged alert across all tracked orders.
    #[must_use]
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.iter().filter(|e| !e.acknowledged).map(|e| e.value().clone()).collect()
    }
}
