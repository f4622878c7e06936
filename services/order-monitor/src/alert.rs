//! Alert kinds and records (§4.7).

use common::Ts;
use uuid::Uuid;

/// What kind of anomaly an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    /// `now - monitoring_start > expected_time + delay_threshold`.
    Delayed,
    /// Order is `PartiallyFilled` and hasn't updated within the stall
    /// threshold.
    PartialFillStalled,
    /// `|avg_filled_price - limit_price| / limit_price > deviation_pct`.
    PriceDeviation,
    /// Order transitioned to `Rejected`.
    Rejected,
}

/// One raised alert. Stays `acknowledged = false` until explicitly
/// acknowledged, which lets the same kind fire again later for the same
/// order (§11: "explicit acknowledge operation so a resolved alert can
/// fire again").
#[derive(Debug, Clone)]
pub struct Alert {
    /// Unique id.
    pub id: Uuid,
    /// Order this alert concerns.
    pub order_id: Uuid,
    /// What kind of anomaly.
    pub kind: AlertKind,
    /// Human-readable detail.
    pub message: String,
    /// When it was raised.
    pub raised_at: Ts,
    /// Whether it has been acknowledged.
    pub acknowledged: bool,
}
