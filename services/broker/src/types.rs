//! Wire-agnostic request/response shapes exchanged with a broker adapter.

use common::{Px, Qty, Side, Symbol, Ts};
use serde::{Deserialize, Serialize};

/// Id assigned by the broker when an order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrokerOrderId(pub String);

impl std::fmt::Display for BrokerOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order type, mirroring the data model's order type (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Market order.
    Market,
    /// Limit order.
    Limit,
    /// Stop-loss, triggers a market order once the trigger price trades.
    StopLoss,
    /// Stop-loss, triggers a limit order once the trigger price trades.
    StopLossMarket,
}

/// Order validity (time in force).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    /// Good for the trading day.
    Day,
    /// Immediate-or-cancel.
    Ioc,
    /// Good till cancelled.
    Gtc,
    /// Good till a specific date/time.
    Gtd,
}

/// Request to place a new order at a broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    /// Caller-assigned idempotency key.
    pub client_order_id: String,
    /// Instrument.
    pub symbol: Symbol,
    /// Buy or sell.
    pub side: Side,
    /// Order type.
    pub order_type: OrderType,
    /// Time in force.
    pub validity: Validity,
    /// Order quantity, must be > 0.
    pub quantity: Qty,
    /// Limit price, required for `Limit`/`StopLossMarket`.
    pub price: Option<Px>,
    /// Trigger price, required for stop variants.
    pub trigger_price: Option<Px>,
}

/// Request to modify a resting order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModifyOrderRequest {
    /// New limit price, if changing.
    pub price: Option<Px>,
    /// New quantity, if changing.
    pub quantity: Option<Qty>,
    /// New trigger price, if changing.
    pub trigger_price: Option<Px>,
}

/// Canonical order status an adapter must translate its own broker-native
/// status strings into (§4.1: "Adapters MUST convert broker-native status
/// strings to the canonical set").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalStatus {
    /// Broker has accepted the order.
    Acknowledged,
    /// Broker reports a partial fill.
    PartiallyFilled,
    /// Broker reports a full fill.
    Filled,
    /// Broker confirms cancellation.
    Cancelled,
    /// Broker rejected the order.
    Rejected,
}

/// Status update emitted on an adapter's status stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Broker-assigned order id this update concerns.
    pub broker_order_id: BrokerOrderId,
    /// New canonical status.
    pub status: CanonicalStatus,
    /// Event time as reported (or locally stamped) by the adapter.
    pub timestamp: Ts,
}

/// A single execution report emitted on an adapter's fill stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerFill {
    /// Broker-assigned order id this fill belongs to.
    pub broker_order_id: BrokerOrderId,
    /// Broker-assigned execution id, unique per fill.
    pub execution_id: String,
    /// Fill quantity.
    pub quantity: Qty,
    /// Fill price.
    pub price: Px,
    /// Fill timestamp.
    pub timestamp: Ts,
}
