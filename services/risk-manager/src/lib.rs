//! Risk Manager: pre-trade validation (§4.3) against a per-portfolio
//! [`RiskProfile`], plus the position book and order-rate window the
//! checks read from.

pub mod checks;
pub mod config;
pub mod error;
pub mod order_rate;
pub mod positions;
pub mod types;

use common::{Px, Symbol};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{info, warn};
use uuid::Uuid;

pub use checks::{validate, CheckContext};
pub use config::RiskConfig;
pub use error::{RiskError, RiskResult};
pub use order_rate::OrderRateWindow;
pub use positions::PositionBook;
pub use types::{Limit, LimitKind, OrderCandidate, PortfolioSnapshot, RiskProfile, RiskProfileId};

/// Ties together the risk profile store, position book, and order-rate
/// window into the single entry point the submission pipeline (§4.5 step 2)
/// calls before a candidate order is allowed to proceed to lifecycle
/// validation.
pub struct RiskManager {
    config: RiskConfig,
    profiles: RwLock<FxHashMap<RiskProfileId, RiskProfile>>,
    positions: PositionBook,
    order_rate: OrderRateWindow,
}

impl RiskManager {
    /// A risk manager with an empty profile store and position book.
    #[must_use]
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            profiles: RwLock::new(FxHashMap::default()),
            positions: PositionBook::new(),
            order_rate: OrderRateWindow::new(),
        }
    }

    /// Register or replace a portfolio's risk profile.
    pub fn set_profile(&self, id: RiskProfileId, profile: RiskProfile) {
        self.profiles.write().insert(id, profile);
    }

    /// Run the 9 fixed-order checks (§4.3) against `order` using
    /// `profile_id`'s configured limits and the current position book.
    ///
    /// On success, records the order against the rate window so the next
    /// call's orders-per-minute check sees it.
    pub fn validate_order(
        &self,
        order: &OrderCandidate,
        profile_id: RiskProfileId,
        portfolio: PortfolioSnapshot,
    ) -> RiskResult<()> {
        let profiles = self.profiles.read();
        let profile = profiles
            .get(&profile_id)
            .ok_or(RiskError::UnknownProfile(profile_id))?;

        let current = self.positions.get(order.portfolio_id, order.symbol);
        let resulting_position =
            checks::resulting_position(order.side, current.quantity.as_i64(), order.qty);

        let now = checks::now();
        let orders_last_minute = self
            .order_rate
            .count_in_last_minute(order.strategy_id, now);

        let ctx = CheckContext {
            resulting_position,
            orders_last_minute,
            portfolio,
        };

        if let Err(err) = checks::validate(order, &ctx, profile) {
            warn!(
                symbol = %order.symbol,
                strategy = %order.strategy_id,
                %err,
                "order rejected by risk manager"
            );
            return Err(err);
        }
        self.order_rate.record(order.strategy_id, now);
        Ok(())
    }

    /// Apply a fill to the position book (called by the lifecycle manager
    /// once the order reaches a fill event).
    pub fn apply_fill(
        &self,
        portfolio_id: Uuid,
        symbol: Symbol,
        side: common::Side,
        qty: common::Qty,
        price: Px,
    ) {
        self.positions.apply_fill(portfolio_id, symbol, side, qty, price);
        info!(portfolio = %portfolio_id, %symbol, %qty, %price, "position updated");
    }

    /// Re-mark a position against a fresh last price (called on market data
    /// updates so the next validation's drawdown/exposure figures are
    /// current).
    pub fn mark_price(&self, portfolio_id: Uuid, symbol: Symbol, last_price: Px) {
        self.positions.mark(portfolio_id, symbol, last_price);
    }

    /// Current position for `(portfolio_id, symbol)`.
    #[must_use]
    pub fn position(&self, portfolio_id: Uuid, symbol: Symbol) -> common::Position {
        self.positions.get(portfolio_id, symbol)
    }

    /// Gross exposure across a portfolio's positions.
    #[must_use]
    pub fn gross_exposure(&self, portfolio_id: Uuid) -> i64 {
        self.positions.gross_exposure(portfolio_id)
    }

    /// The manager's config, for callers that need `order_rate_window_secs`.
    #[must_use]
    pub const fn config(&self) -> &RiskConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Qty, Side};

    fn profile_with_order_value_limit(limit: i64) -> RiskProfile {
        let mut profile = RiskProfile::default();
        profile.set(LimitKind::OrderValue, Limit::new(limit));
        profile
    }

    fn snapshot() -> PortfolioSnapshot {
        PortfolioSnapshot {
            equity: 10_000_000,
            peak_equity: 10_000_000,
            gross_exposure: 0,
            volatility: 0.2,
        }
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let manager = RiskManager::new(RiskConfig::default());
        let order = OrderCandidate {
            portfolio_id: Uuid::nil(),
            strategy_id: Uuid::nil(),
            symbol: Symbol(1),
            side: Side::Bid,
            qty: Qty::from_units(1),
            price: Px::new(100.0),
        };
        let id = RiskProfileId(Uuid::nil());
        let err = manager.validate_order(&order, id, snapshot()).unwrap_err();
        assert!(matches!(err, RiskError::UnknownProfile(_)));
    }

    #[test]
    fn order_within_limits_is_approved_and_recorded() {
        let manager = RiskManager::new(RiskConfig::default());
        let id = RiskProfileId(Uuid::nil());
        manager.set_profile(id, profile_with_order_value_limit(10_000_000));

        let order = OrderCandidate {
            portfolio_id: Uuid::nil(),
            strategy_id: Uuid::nil(),
            symbol: Symbol(1),
            side: Side::Bid,
            qty: Qty::from_units(100),
            price: Px::new(100.0),
        };
        assert!(manager.validate_order(&order, id, snapshot()).is_ok());

        let now = checks::now();
        assert_eq!(
            manager.order_rate.count_in_last_minute(order.strategy_id, now),
            1
        );
    }

    #[test]
    fn order_over_limit_is_rejected_and_not_recorded() {
        let manager = RiskManager::new(RiskConfig::default());
        let id = RiskProfileId(Uuid::nil());
        manager.set_profile(id, profile_with_order_value_limit(1));

        let order = OrderCandidate {
            portfolio_id: Uuid::nil(),
            strategy_id: Uuid::nil(),
            symbol: Symbol(1),
            side: Side::Bid,
            qty: Qty::from_units(100),
            price: Px::new(100.0),
        };
        assert!(manager.validate_order(&order, id, snapshot()).is_err());

        let now = checks::now();
        assert_eq!(
            manager.order_rate.count_in_last_minute(order.strategy_id, now),
            0
        );
    }
}
