//! Error types for order lifecycle management (§4.4).

use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::OrderState;

/// Errors raised by the lifecycle manager and order registry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OmsError {
    /// No order exists with this id.
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    /// The requested transition is not allowed from the order's current state.
    #[error("order {order_id}: transition {from:?} -> {to:?} is not allowed")]
    InvalidTransition {
        /// Affected order.
        order_id: Uuid,
        /// State the order was in.
        from: OrderState,
        /// State the transition attempted to reach.
        to: OrderState,
    },

    /// The order's static fields fail validation (§3 invariants).
    #[error("order {order_id} failed validation: {reason}")]
    Validation {
        /// Affected order.
        order_id: Uuid,
        /// Human-readable reason.
        reason: String,
    },

    /// A fill would have pushed `filled_quantity` past `quantity`.
    #[error("order {order_id}: fill of {fill_qty} exceeds remaining quantity")]
    OverFill {
        /// Affected order.
        order_id: Uuid,
        /// Fill quantity that was rejected.
        fill_qty: i64,
    },
}

/// Convenience alias.
pub type OmsResult<T> = Result<T, OmsError>;
