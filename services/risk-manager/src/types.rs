//! Risk profile and candidate-order input types (§3 "Risk Profile", §4.3).

use std::fmt;

use common::{Px, Qty, Side, Symbol};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a risk profile. Newtype over `Uuid` so profile lookups use a
/// single typed key rather than a bare `Uuid` or string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiskProfileId(pub Uuid);

impl fmt::Display for RiskProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The 9 check kinds, in the fixed evaluation order from §4.3. Declared in
/// that order so `LimitKind::ALL_IN_ORDER` reads as the spec's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitKind {
    /// (1) order value ≤ limit.
    OrderValue,
    /// (2) resulting position size ≤ limit.
    PositionSize,
    /// (3) potential drawdown ≤ limit.
    Drawdown,
    /// (4) leverage ≤ limit.
    Leverage,
    /// (5) concentration ≤ limit.
    Concentration,
    /// (6) orders-per-minute ≤ limit.
    OrderRate,
    /// (7) exposure ≤ limit.
    Exposure,
    /// (8) value-at-risk ≤ limit.
    Var,
    /// (9) stress-scenario loss ≤ limit.
    Stress,
}

impl LimitKind {
    /// The 9 checks in the exact order §4.3 mandates they be evaluated.
    pub const ALL_IN_ORDER: [Self; 9] = [
        Self::OrderValue,
        Self::PositionSize,
        Self::Drawdown,
        Self::Leverage,
        Self::Concentration,
        Self::OrderRate,
        Self::Exposure,
        Self::Var,
        Self::Stress,
    ];
}

/// One limit within a risk profile: a threshold plus an enable flag so a
/// profile can carry a disabled check without deleting its configured value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    /// Threshold value. Units depend on `LimitKind` (ticks for OrderValue/
    /// PositionSize/Exposure/Var/Stress, basis points ×100 for Drawdown/
    /// Leverage/Concentration, count for OrderRate).
    pub value: i64,
    /// Whether this check is active. A disabled check always passes.
    pub enabled: bool,
}

impl Limit {
    /// An enabled limit at the given threshold.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self {
            value,
            enabled: true,
        }
    }
}

/// A named set of the 9 limits, looked up by [`RiskProfileId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskProfile {
    limits: FxHashMap<LimitKind, Limit>,
}

impl RiskProfile {
    /// Set (or replace) the limit for `kind`.
    pub fn set(&mut self, kind: LimitKind, limit: Limit) {
        self.limits.insert(kind, limit);
    }

    /// The configured limit for `kind`, if any. A profile with no entry for
    /// a kind is treated as "no limit configured" (check passes).
    #[must_use]
    pub fn get(&self, kind: LimitKind) -> Option<Limit> {
        self.limits.get(&kind).copied()
    }
}

/// A candidate order, as presented to [`crate::checks::validate`]. Mirrors
/// the subset of the order data model (§3) the risk checks actually read.
#[derive(Debug, Clone, Copy)]
pub struct OrderCandidate {
    /// Owning portfolio.
    pub portfolio_id: Uuid,
    /// Owning strategy, used to scope the order-rate window.
    pub strategy_id: Uuid,
    /// Instrument.
    pub symbol: Symbol,
    /// Buy or sell.
    pub side: Side,
    /// Requested quantity.
    pub qty: Qty,
    /// Limit/reference price used for order-value and position-value math.
    pub price: Px,
}

/// Portfolio-level figures the checks need that aren't derivable from a
/// single position: total equity (cash + marked positions), its running
/// peak (for drawdown), and gross exposure across all symbols.
#[derive(Debug, Clone, Copy)]
pub struct PortfolioSnapshot {
    /// Current mark-to-market equity.
    pub equity: i64,
    /// Highest equity observed so far (for drawdown).
    pub peak_equity: i64,
    /// Sum of absolute position notional across all symbols.
    pub gross_exposure: i64,
    /// Annualized return volatility estimate, as a fraction (e.g. 0.2 =
    /// 20%), used for the VaR check.
    pub volatility: f64,
}
