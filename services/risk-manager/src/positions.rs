//! Per-(portfolio, symbol) position book, updated on every fill and marked
//! on every price update (§4.3 "the manager also maintains positions").

use common::{Position, Px, Qty, Side, Symbol};
use dashmap::DashMap;
use uuid::Uuid;

/// Thread-safe book of [`Position`]s keyed by `(portfolio_id, symbol)`.
#[derive(Default)]
pub struct PositionBook {
    positions: DashMap<(Uuid, Symbol), Position>,
}

impl PositionBook {
    /// An empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a fill: adjusts quantity and re-bases the average entry price
    /// when adding to a position; realizes PnL on the closing portion when
    /// reducing or flipping it.
    pub fn apply_fill(&self, portfolio_id: Uuid, symbol: Symbol, side: Side, qty: Qty, price: Px) {
        let mut entry = self
            .positions
            .entry((portfolio_id, symbol))
            .or_insert_with(|| Position::flat(portfolio_id, symbol));

        let signed_fill = match side {
            Side::Bid => qty.as_i64(),
            Side::Ask => -qty.as_i64(),
        };
        let old_qty = entry.quantity.as_i64();
        let new_qty = old_qty + signed_fill;

        let same_direction = old_qty == 0 || (old_qty > 0) == (signed_fill > 0);
        if same_direction {
            if new_qty != 0 {
                let total_cost = old_qty * entry.average_price.as_i64() + signed_fill * price.as_i64();
                entry.average_price = Px::from_i64(total_cost / new_qty);
            }
        } else {
            let closed = signed_fill.abs().min(old_qty.abs());
            let pnl_per_unit = price.as_i64() - entry.average_price.as_i64();
            let realized = if old_qty > 0 {
                closed * pnl_per_unit
            } else {
                closed * -pnl_per_unit
            };
            entry.realized_pnl += realized / common::SCALE_4;
            if new_qty != 0 && (old_qty > 0) != (new_qty > 0) {
                // position flipped through zero: the remainder opens at the fill price
                entry.average_price = price;
            }
        }
        entry.quantity = Qty::from_i64(new_qty);
    }

    /// Re-mark a position's unrealized PnL against a fresh last price.
    pub fn mark(&self, portfolio_id: Uuid, symbol: Symbol, last_price: Px) {
        if let Some(mut entry) = self.positions.get_mut(&(portfolio_id, symbol)) {
            entry.mark(last_price);
        }
    }

    /// Current position, or a flat one if none has been recorded yet.
    #[must_use]
    pub fn get(&self, portfolio_id: Uuid, symbol: Symbol) -> Position {
        self.positions
            .get(&(portfolio_id, symbol))
            .map_or_else(|| Position::flat(portfolio_id, symbol), |e| *e)
    }

    /// All positions currently held for a portfolio (zero-quantity entries
    /// included, since they still carry realized PnL history).
    #[must_use]
    pub fn for_portfolio(&self, portfolio_id: Uuid) -> Vec<Position> {
        self.positions
            .iter()
            .filter(|e| e.key().0 == portfolio_id)
            .map(|e| *e.value())
            .collect()
    }

    /// Gross exposure (Σ|quantity × last_price|) across a portfolio's
    /// positions, used by the exposure/leverage/concentration checks.
    #[must_use]
    pub fn gross_exposure(&self, portfolio_id: Uuid) -> i64 {
        self.for_portfolio(portfolio_id)
            .iter()
            .map(|p| p.last_price.mul_qty(p.quantity).abs())
            .sum()
    }
}
