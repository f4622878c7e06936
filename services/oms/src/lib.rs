//! Order Management System.
//!
//! Owns every order from [`lifecycle::OrderState::Created`] onward: the
//! lifecycle state machine, the append-only event log, the parent/child
//! dependency graph, and the expiry sweeper.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use common::{Px, Qty, Symbol, Ts};
use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

pub mod dependency;
pub mod error;
pub mod lifecycle;
pub mod order;

use dependency::{DependencyAction, DependencyGraph, DependencyKind};
use error::{OmsError, OmsResult};
use lifecycle::{ExpirySweeper, OrderLifecycle, OrderState};
use order::{NewOrder, Order, OrderStatus, OrderType};

/// Configuration for the registry's expiry sweeper.
#[derive(Debug, Clone)]
pub struct OmsConfig {
    /// How often the sweeper scans for expired orders, in seconds.
    pub expiry_sweep_interval_secs: u64,
}

impl Default for OmsConfig {
    fn default() -> Self {
        Self {
            expiry_sweep_interval_secs: 5,
        }
    }
}

/// Owns every order after `Created` (§3 "Ownership").
///
/// `states` holds the exact [`OrderState`] per order; `Order::status` is a
/// coarser public view derived from it (`OrderStatus::Pending` covers both
/// `Created` and `Validated`), so the exact state must be tracked
/// separately to validate subsequent transitions correctly.
pub struct OrderRegistry {
    config: OmsConfig,
    orders: DashMap<Uuid, Order>,
    states: DashMap<Uuid, OrderState>,
    lifecycle: OrderLifecycle,
    dependencies: DependencyGraph,
}

impl OrderRegistry {
    /// A registry with no orders yet.
    #[must_use]
    pub fn new(config: OmsConfig) -> Self {
        Self {
            config,
            orders: DashMap::new(),
            states: DashMap::new(),
            lifecycle: OrderLifecycle::new(),
            dependencies: DependencyGraph::new(),
        }
    }

    /// Active sweeper cadence.
    #[must_use]
    pub const fn config(&self) -> &OmsConfig {
        &self.config
    }

    /// Create a new order in state `Created`, validating its static fields
    /// (§3 invariants) before it's admitted.
    pub fn create_order(&self, new: NewOrder) -> OmsResult<Order> {
        Self::validate_static(&new)?;

        let now = Ts::now();
        let order = Order {
            id: new.id,
            portfolio_id: new.portfolio_id,
            strategy_id: new.strategy_id,
            symbol: new.symbol,
            exchange: new.exchange,
            side: new.side,
            order_type: new.order_type,
            product_type: new.product_type,
            validity: new.validity,
            quantity: new.quantity,
            price: new.price,
            trigger_price: new.trigger_price,
            filled_quantity: Qty::ZERO,
            average_filled_price: Px::ZERO,
            broker_order_id: None,
            parent_order_id: new.parent_order_id,
            tags: new.tags,
            status: OrderStatus::from(OrderState::Created),
            created_at: now,
            updated_at: now,
            expires_at: new.expires_at,
        };
        self.orders.insert(order.id, order.clone());
        self.states.insert(order.id, OrderState::Created);
        info!(order_id = %order.id, symbol = ?order.symbol, "order created");
        Ok(order)
    }

    fn validate_static(new: &NewOrder) -> OmsResult<()> {
        if new.quantity.as_i64() <= 0 {
            return Err(OmsError::Validation {
                order_id: new.id,
                reason: "quantity must be positive".to_string(),
            });
        }
        match new.order_type {
            OrderType::Limit if new.price.is_none() => {
                return Err(OmsError::Validation {
                    order_id: new.id,
                    reason: "limit order requires a price".to_string(),
                });
            }
            OrderType::StopLoss | OrderType::StopLossMarket if new.trigger_price.is_none() => {
                return Err(OmsError::Validation {
                    order_id: new.id,
                    reason: "stop order requires a trigger price".to_string(),
                });
            }
            _ => {}
        }
        Ok(())
    }

    /// Register a dependency link from `child_id` to `parent_id`.
    pub fn link_dependency(&self, parent_id: Uuid, child_id: Uuid, kind: DependencyKind) {
        self.dependencies.link(parent_id, child_id, kind);
    }

    /// Register a callback invoked after any order enters `state`.
    pub fn on_enter<F>(&self, state: OrderState, callback: F)
    where
        F: Fn(&lifecycle::LifecycleEvent) + Send + Sync + 'static,
    {
        self.lifecycle.on_enter(state, callback);
    }

    fn current_state(&self, order_id: Uuid) -> OmsResult<OrderState> {
        self.states.get(&order_id).map(|e| *e).ok_or(OmsError::OrderNotFound(order_id))
    }

    /// Apply `to` to `order_id`, updating the order's derived status and
    /// timestamps and, if `to` is terminal, resolving dependent orders.
    /// Returns any [`DependencyAction::Submit`] actions the caller (the
    /// submission pipeline) must carry out; `Cancel` actions are applied
    /// directly since cancellation is purely an owned state transition.
    fn transition(&self, order_id: Uuid, to: OrderState, data: impl Into<String>) -> OmsResult<Vec<DependencyAction>> {
        let from = self.current_state(order_id)?;

        self.lifecycle.transition(order_id, from, to, data)?;
        self.states.insert(order_id, to);

        {
            let mut order = self.orders.get_mut(&order_id).ok_or(OmsError::OrderNotFound(order_id))?;
            order.status = OrderStatus::from(to);
            order.updated_at = Ts::now();
        }

        if !to.is_terminal() {
            return Ok(vec![]);
        }

        let submitted = |child_id: Uuid| {
            self.states
                .get(&child_id)
                .is_some_and(|s| !matches!(*s, OrderState::Created | OrderState::Validated))
        };
        let actions = self.dependencies.resolve(order_id, to, submitted);

        let mut to_submit = vec![];
        for action in actions {
            match action {
                DependencyAction::Cancel(child_id) => self.cancel_via_dependency(child_id),
                submit @ DependencyAction::Submit(_) => to_submit.push(submit),
            }
        }
        Ok(to_submit)
    }

    /// Cancel a dependent child order, taking whichever path the transition
    /// table allows from its current state: a not-yet-submitted order is
    /// rejected outright (it was never live with an adapter); a submitted
    /// order passes through `Cancelling` first; an already-acknowledged or
    /// partially-filled order can go straight to `Cancelled`.
    fn cancel_via_dependency(&self, child_id: Uuid) {
        let Ok(state) = self.current_state(child_id) else { return };
        if state.is_terminal() {
            return;
        }
        let result = match state {
            OrderState::Created | OrderState::Validated => {
                self.transition(child_id, OrderState::Rejected, "sibling resolved dependency before submission")
            }
            OrderState::Submitted => self
                .transition(child_id, OrderState::Cancelling, "sibling resolved dependency")
                .and_then(|_| self.transition(child_id, OrderState::Cancelled, "sibling resolved dependency")),
            _ => self.transition(child_id, OrderState::Cancelled, "sibling resolved dependency"),
        };
        if let Err(err) = result {
            warn!(order_id = %child_id, %err, "failed to cancel dependent order");
        }
    }

    /// `Created -> Validated`.
    pub fn validate(&self, order_id: Uuid) -> OmsResult<()> {
        self.transition(order_id, OrderState::Validated, "validated").map(|_| ())
    }

    /// `Validated -> Submitted`.
    pub fn submit(&self, order_id: Uuid) -> OmsResult<()> {
        self.transition(order_id, OrderState::Submitted, "submitted to adapter").map(|_| ())
    }

    /// `Submitted -> Acknowledged`, recording the broker-assigned id.
    pub fn acknowledge(&self, order_id: Uuid, broker_order_id: impl Into<String>) -> OmsResult<()> {
        let broker_order_id = broker_order_id.into();
        self.transition(order_id, OrderState::Acknowledged, "acknowledged by adapter")?;
        if let Some(mut order) = self.orders.get_mut(&order_id) {
            order.broker_order_id = Some(broker_order_id);
        }
        Ok(())
    }

    /// Apply a fill, moving to `PartiallyFilled` or `Completed` depending on
    /// whether the order is now fully filled.
    pub fn fill(&self, order_id: Uuid, fill_qty: Qty, fill_price: Px) -> OmsResult<Vec<DependencyAction>> {
        let fully_filled = {
            let mut order = self.orders.get_mut(&order_id).ok_or(OmsError::OrderNotFound(order_id))?;
            if fill_qty.as_i64() > order.remaining_quantity().as_i64() {
                return Err(OmsError::OverFill {
                    order_id,
                    fill_qty: fill_qty.as_i64(),
                });
            }
            order.apply_fill(fill_qty, fill_price);
            order.filled_quantity == order.quantity
        };
        let target = if fully_filled {
            OrderState::Completed
        } else {
            OrderState::PartiallyFilled
        };
        self.transition(order_id, target, format!("filled {} @ {fill_price}", fill_qty))
    }

    /// `Acknowledged|PartiallyFilled -> Cancelling`.
    pub fn request_cancel(&self, order_id: Uuid) -> OmsResult<()> {
        self.transition(order_id, OrderState::Cancelling, "cancel requested").map(|_| ())
    }

    /// `Cancelling -> Cancelled`.
    pub fn confirm_cancel(&self, order_id: Uuid) -> OmsResult<Vec<DependencyAction>> {
        self.transition(order_id, OrderState::Cancelled, "cancel confirmed")
    }

    /// Reject, from any non-terminal state.
    pub fn reject(&self, order_id: Uuid, reason: impl Into<String>) -> OmsResult<Vec<DependencyAction>> {
        self.transition(order_id, OrderState::Rejected, reason.into())
    }

    /// Fail, from any non-terminal state.
    pub fn fail(&self, order_id: Uuid, reason: impl Into<String>) -> OmsResult<Vec<DependencyAction>> {
        self.transition(order_id, OrderState::Failed, reason.into())
    }

    /// Expire a single order.
    pub fn expire(&self, order_id: Uuid) -> OmsResult<Vec<DependencyAction>> {
        self.transition(order_id, OrderState::Expired, "expired")
    }

    /// Sweep all tracked orders, expiring any non-terminal order whose
    /// `expires_at` has passed. Returns the ids that were expired.
    pub fn sweep_expired(&self, now: Ts) -> Vec<Uuid> {
        let snapshot: Vec<_> = self
            .states
            .iter()
            .map(|e| (*e.key(), *e.value(), self.orders.get(e.key()).and_then(|o| o.expires_at)))
            .collect();
        let due = ExpirySweeper::due(now, &snapshot);
        for id in &due {
            if let Err(err) = self.expire(*id) {
                warn!(order_id = %id, %err, "expiry sweep failed to transition order");
            }
        }
        due
    }

    /// Current snapshot of an order.
    #[must_use]
    pub fn get(&self, order_id: Uuid) -> Option<Order> {
        self.orders.get(&order_id).map(|e| e.clone())
    }

    /// All orders not yet in a terminal state.
    #[must_use]
    pub fn active_orders(&self) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|e| !self.states.get(e.key()).is_some_and(|s| s.is_terminal()))
            .map(|e| e.clone())
            .collect()
    }

    /// All orders for a symbol.
    #[must_use]
    pub fn orders_by_symbol(&self, symbol: Symbol) -> Vec<Order> {
        self.orders.iter().filter(|e| e.symbol == symbol).map(|e| e.clone()).collect()
    }

    /// All children of a parent order.
    #[must_use]
    pub fn child_orders(&self, parent_id: Uuid) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|e| e.parent_order_id == Some(parent_id))
            .map(|e| e.clone())
            .collect()
    }

    /// The lifecycle event history for an order.
    #[must_use]
    pub fn history(&self, order_id: Uuid) -> Vec<lifecycle::LifecycleEvent> {
        self.lifecycle.history(order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use order::{OrderSide, ProductType, Validity};

    fn new_order(parent: Option<Uuid>) -> NewOrder {
        NewOrder {
            id: Uuid::new_v4(),
            portfolio_id: Uuid::nil(),
            strategy_id: Uuid::nil(),
            symbol: Symbol(1),
            exchange: "NSE".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            product_type: ProductType::Intraday,
            validity: Validity::Day,
            quantity: Qty::from_units(100),
            price: Some(Px::new(100.0)),
            trigger_price: None,
            parent_order_id: parent,
            tags: vec![],
            expires_at: None,
        }
    }

    #[test]
    fn create_validate_submit_acknowledge_fill_completes() {
        let registry = OrderRegistry::new(OmsConfig::default());
        let order = registry.create_order(new_order(None)).unwrap();
        registry.validate(order.id).unwrap();
        registry.submit(order.id).unwrap();
        registry.acknowledge(order.id, "BROKER-1").unwrap();
        registry.fill(order.id, Qty::from_units(60), Px::new(100.0)).unwrap();
        let mid = registry.get(order.id).unwrap();
        assert_eq!(mid.status, OrderStatus::PartiallyFilled);
        registry.fill(order.id, Qty::from_units(40), Px::new(101.0)).unwrap();
        let done = registry.get(order.id).unwrap();
        assert_eq!(done.status, OrderStatus::Filled);
        assert_eq!(done.filled_quantity, Qty::from_units(100));
    }

    #[test]
    fn overfill_is_rejected() {
        let registry = OrderRegistry::new(OmsConfig::default());
        let order = registry.create_order(new_order(None)).unwrap();
        registry.validate(order.id).unwrap();
        registry.submit(order.id).unwrap();
        registry.acknowledge(order.id, "BROKER-1").unwrap();
        let err = registry.fill(order.id, Qty::from_units(200), Px::new(100.0)).unwrap_err();
        assert!(matches!(err, OmsError::OverFill { .. }));
    }

    #[test]
    fn invalid_order_is_rejected_at_creation() {
        let mut bad = new_order(None);
        bad.quantity = Qty::ZERO;
        let registry = OrderRegistry::new(OmsConfig::default());
        assert!(registry.create_order(bad).is_err());
    }

    #[test]
    fn oco_cancels_sibling_when_one_leg_fills() {
        let registry = OrderRegistry::new(OmsConfig::default());
        let parent = registry.create_order(new_order(None)).unwrap();
        let sibling = registry.create_order(new_order(None)).unwrap();
        registry.link_dependency(parent.id, sibling.id, DependencyKind::Oco);

        for id in [parent.id, sibling.id] {
            registry.validate(id).unwrap();
            registry.submit(id).unwrap();
            registry.acknowledge(id, "BROKER").unwrap();
        }
        registry.fill(parent.id, Qty::from_units(100), Px::new(100.0)).unwrap();

        let sibling_after = registry.get(sibling.id).unwrap();
        assert_eq!(sibling_after.status, OrderStatus::Cancelled);
    }

    #[test]
    fn sweep_expired_moves_due_orders_to_expired() {
        let registry = OrderRegistry::new(OmsConfig::default());
        let mut spec = new_order(None);
        spec.expires_at = Some(Ts::from_millis(1));
        let order = registry.create_order(spec).unwrap();
        registry.validate(order.id).unwrap();
        registry.submit(order.id).unwrap();
        registry.acknowledge(order.id, "BROKER").unwrap();

        let expired = registry.sweep_expired(Ts::from_millis(1_000));
        assert_eq!(expired, vec![order.id]);
        assert_eq!(registry.get(order.id).unwrap().status, OrderStatus::Expired);
    }
}
