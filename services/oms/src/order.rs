//! Order data model (§3 "Order").

use common::{Px, Qty, Symbol, Ts};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::OrderState;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    /// Buy.
    Buy,
    /// Sell.
    Sell,
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Market order.
    Market,
    /// Limit order; requires `price`.
    Limit,
    /// Stop-loss order; requires `trigger_price`.
    StopLoss,
    /// Stop-loss order that becomes a market order once triggered.
    StopLossMarket,
}

/// Product (margin/settlement) type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    /// Closed out same trading session.
    Intraday,
    /// Carried forward, fully delivered.
    Delivery,
    /// Carried forward without delivery (e.g. futures roll).
    Overnight,
}

/// Order validity / time-in-force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    /// Valid for the current trading day.
    Day,
    /// Immediate-or-cancel.
    Ioc,
    /// Good till cancelled.
    Gtc,
    /// Good till a specified date.
    Gtd,
}

/// A status derived purely from the owning [`OrderState`] (§3: "status is a
/// pure function of lifecycle state").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Lifecycle is in `Created` or `Validated`.
    Pending,
    /// Lifecycle is `Submitted`.
    Submitted,
    /// Lifecycle is `Acknowledged`.
    Acknowledged,
    /// Lifecycle is `PartiallyFilled`.
    PartiallyFilled,
    /// Lifecycle is `Completed`.
    Filled,
    /// Lifecycle is `Cancelling`.
    Cancelling,
    /// Lifecycle is `Cancelled`.
    Cancelled,
    /// Lifecycle is `Rejected`.
    Rejected,
    /// Lifecycle is `Failed`.
    Failed,
    /// Lifecycle is `Expired`.
    Expired,
}

impl From<OrderState> for OrderStatus {
    fn from(state: OrderState) -> Self {
        match state {
            OrderState::Created | OrderState::Validated => Self::Pending,
            OrderState::Submitted => Self::Submitted,
            OrderState::Acknowledged => Self::Acknowledged,
            OrderState::PartiallyFilled => Self::PartiallyFilled,
            OrderState::Completed => Self::Filled,
            OrderState::Cancelling => Self::Cancelling,
            OrderState::Cancelled => Self::Cancelled,
            OrderState::Rejected => Self::Rejected,
            OrderState::Failed => Self::Failed,
            OrderState::Expired => Self::Expired,
        }
    }
}

/// An order as owned by the lifecycle manager (§3 "Order").
///
/// Invariants: `filled_quantity <= quantity` and non-decreasing;
/// `average_filled_price >= Px::ZERO`; `status == f(lifecycle state)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Client-assigned unique id.
    pub id: Uuid,
    /// Owning portfolio.
    pub portfolio_id: Uuid,
    /// Owning strategy.
    pub strategy_id: Uuid,
    /// Instrument.
    pub symbol: Symbol,
    /// Exchange.
    pub exchange: String,
    /// Buy or sell.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Margin/settlement product type.
    pub product_type: ProductType,
    /// Time-in-force.
    pub validity: Validity,
    /// Requested quantity; must be > 0.
    pub quantity: Qty,
    /// Limit/stop-limit price. Required for `Limit`/`StopLoss*`.
    pub price: Option<Px>,
    /// Trigger price for stop variants. Required for `StopLoss*`.
    pub trigger_price: Option<Px>,
    /// Cumulative filled quantity. Monotonic, never exceeds `quantity`.
    pub filled_quantity: Qty,
    /// Volume-weighted average filled price.
    pub average_filled_price: Px,
    /// Broker-assigned id, set once the order reaches `Submitted`.
    pub broker_order_id: Option<String>,
    /// Parent order id, for algo/bracket/OCO children.
    pub parent_order_id: Option<Uuid>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Derived status; kept in sync by [`crate::lifecycle::OrderLifecycle`].
    pub status: OrderStatus,
    /// Creation time.
    pub created_at: Ts,
    /// Last update time.
    pub updated_at: Ts,
    /// Optional expiry, consumed by the expiry sweeper.
    pub expires_at: Option<Ts>,
}

impl Order {
    /// Remaining (unfilled) quantity.
    #[must_use]
    pub fn remaining_quantity(&self) -> Qty {
        self.quantity.sub(self.filled_quantity)
    }

    /// Apply a fill's contribution to `filled_quantity` and the running
    /// volume-weighted `average_filled_price`.
    pub fn apply_fill(&mut self, fill_qty: Qty, fill_price: Px) {
        let prior_filled = self.filled_quantity.as_i64();
        let new_filled = prior_filled + fill_qty.as_i64();
        if new_filled > 0 {
            let total_cost =
                prior_filled * self.average_filled_price.as_i64() + fill_qty.as_i64() * fill_price.as_i64();
            self.average_filled_price = Px::from_i64(total_cost / new_filled);
        }
        self.filled_quantity = Qty::from_i64(new_filled);
    }
}

/// Parameters needed to create a new order; the lifecycle manager assigns
/// `id`, `status`, and timestamps.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Client-assigned unique id.
    pub id: Uuid,
    /// Owning portfolio.
    pub portfolio_id: Uuid,
    /// Owning strategy.
    pub strategy_id: Uuid,
    /// Instrument.
    pub symbol: Symbol,
    /// Exchange.
    pub exchange: String,
    /// Buy or sell.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Margin/settlement product type.
    pub product_type: ProductType,
    /// Time-in-force.
    pub validity: Validity,
    /// Requested quantity.
    pub quantity: Qty,
    /// Limit/stop-limit price.
    pub price: Option<Px>,
    /// Trigger price for stop variants.
    pub trigger_price: Option<Px>,
    /// Parent order id, if this is a dependent child.
    pub parent_order_id: Option<Uuid>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Optional expiry.
    pub expires_at: Option<Ts>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_a_pure_function_of_state() {
        assert_eq!(OrderStatus::from(OrderState::Created), OrderStatus::Pending);
        assert_eq!(OrderStatus::from(OrderState::Completed), OrderStatus::Filled);
    }

    #[test]
    fn apply_fill_updates_vwap() {
        let mut order = Order {
            id: Uuid::nil(),
            portfolio_id: Uuid::nil(),
            strategy_id: Uuid::nil(),
            symbol: Symbol(1),
            exchange: "NSE".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            product_type: ProductType::Intraday,
            validity: Validity::Day,
            quantity: Qty::from_units(100),
            price: Some(Px::new(2500.0)),
            trigger_price: None,
            filled_quantity: Qty::ZERO,
            average_filled_price: Px::ZERO,
            broker_order_id: None,
            parent_order_id: None,
            tags: vec![],
            status: OrderStatus::Pending,
            created_at: Ts::from_millis(0),
            updated_at: Ts::from_millis(0),
            expires_at: None,
        };
        order.apply_fill(Qty::from_units(40), Px::new(2500.0));
        order.apply_fill(Qty::from_units(60), Px::new(2501.0));
        assert_eq!(order.filled_quantity, Qty::from_units(100));
        assert_eq!(order.remaining_quantity(), Qty::ZERO);
        // vwap = (40*2500 + 60*2501) / 100 = 2500.6
        assert_eq!(order.average_filled_price, Px::new(2500.6));
    }
}
