//! Order lifecycle state machine (§4.4): authoritative transition table,
//! append-only event log, per-target-state callbacks, and expiry sweeping.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use common::Ts;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{OmsError, OmsResult};

/// Lifecycle states (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    /// Order object exists but hasn't passed validation yet.
    Created,
    /// Passed static + risk validation.
    Validated,
    /// Handed to the submission pipeline / adapter.
    Submitted,
    /// Adapter confirmed receipt.
    Acknowledged,
    /// At least one fill received, not yet fully filled.
    PartiallyFilled,
    /// Fully filled.
    Completed,
    /// Cancel request in flight.
    Cancelling,
    /// Cancel confirmed.
    Cancelled,
    /// Rejected by validation, risk, or the adapter.
    Rejected,
    /// Failed for a reason other than an explicit rejection.
    Failed,
    /// Expired past its validity without completing.
    Expired,
}

impl OrderState {
    /// True if no further transition is permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Rejected | Self::Failed | Self::Expired
        )
    }

    fn allowed_targets(self) -> &'static [Self] {
        match self {
            Self::Created => &[Self::Validated, Self::Rejected, Self::Failed],
            Self::Validated => &[Self::Submitted, Self::Rejected, Self::Failed],
            Self::Submitted => &[Self::Acknowledged, Self::Rejected, Self::Failed, Self::Cancelling],
            Self::Acknowledged => &[
                Self::PartiallyFilled,
                Self::Completed,
                Self::Cancelling,
                Self::Cancelled,
                Self::Rejected,
                Self::Failed,
                Self::Expired,
            ],
            Self::PartiallyFilled => &[
                Self::Completed,
                Self::Cancelling,
                Self::Cancelled,
                Self::Failed,
                Self::Expired,
            ],
            Self::Cancelling => &[Self::Cancelled, Self::Failed],
            Self::Completed | Self::Cancelled | Self::Rejected | Self::Failed | Self::Expired => &[],
        }
    }

    fn allows(self, target: Self) -> bool {
        self.allowed_targets().contains(&target)
    }
}

/// One entry in an order's append-only lifecycle event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Monotonically increasing id within the order's log.
    pub id: u64,
    /// Order this event belongs to.
    pub order_id: Uuid,
    /// State before the transition.
    pub from: OrderState,
    /// State after the transition.
    pub to: OrderState,
    /// When the transition was recorded.
    pub at: Ts,
    /// Free-form context (e.g. rejection reason, fill details).
    pub data: String,
}

type Callback = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Owns the transition table, the per-order event logs, and callbacks
/// registered per target state.
#[derive(Default)]
pub struct OrderLifecycle {
    logs: RwLock<FxHashMap<Uuid, Vec<LifecycleEvent>>>,
    callbacks: RwLock<HashMap<OrderState, Vec<Callback>>>,
}

impl OrderLifecycle {
    /// An empty lifecycle manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked after any order transitions into `state`.
    /// A panicking callback is caught and logged; it never poisons the
    /// transition that triggered it.
    pub fn on_enter<F>(&self, state: OrderState, callback: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.callbacks.write().entry(state).or_default().push(Arc::new(callback));
    }

    /// Attempt `from -> to` for `order_id`, appending an event and invoking
    /// any callbacks registered for `to` on success.
    pub fn transition(&self, order_id: Uuid, from: OrderState, to: OrderState, data: impl Into<String>) -> OmsResult<LifecycleEvent> {
        if !from.allows(to) {
            return Err(OmsError::InvalidTransition { order_id, from, to });
        }

        let event = {
            let mut logs = self.logs.write();
            let log = logs.entry(order_id).or_default();
            let event = LifecycleEvent {
                id: log.len() as u64,
                order_id,
                from,
                to,
                at: Ts::now(),
                data: data.into(),
            };
            log.push(event.clone());
            event
        };

        if let Some(callbacks) = self.callbacks.read().get(&to) {
            for cb in callbacks {
                let cb = cb.clone();
                let event_ref = &event;
                if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| cb(event_ref))) {
                    error!(order_id = %order_id, ?panic, "lifecycle callback panicked");
                }
            }
        }

        Ok(event)
    }

    /// Full event history for an order, oldest first.
    #[must_use]
    pub fn history(&self, order_id: Uuid) -> Vec<LifecycleEvent> {
        self.logs.read().get(&order_id).cloned().unwrap_or_default()
    }

    /// Valid next states from `state`, for callers building UIs/validation.
    #[must_use]
    pub fn valid_transitions(state: OrderState) -> &'static [OrderState] {
        state.allowed_targets()
    }
}

/// Sweeps a set of orders, moving any non-terminal order whose `expires_at`
/// has passed to `Expired` (§4.4 "An expiry sweeper... moves any
/// non-terminal order past its expiry time to Expired").
pub struct ExpirySweeper;

impl ExpirySweeper {
    /// Orders (by id) that are due to expire as of `now`, given each order's
    /// current state and optional expiry time.
    #[must_use]
    pub fn due(now: Ts, orders: &[(Uuid, OrderState, Option<Ts>)]) -> Vec<Uuid> {
        orders
            .iter()
            .filter_map(|(id, state, expires_at)| {
                if state.is_terminal() {
                    return None;
                }
                let expiry = (*expires_at)?;
                if expiry.as_nanos() <= now.as_nanos() {
                    warn!(order_id = %id, "order past expiry, sweeping");
                    Some(*id)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn allowed_transition_succeeds_and_logs() {
        let lifecycle = OrderLifecycle::new();
        let id = Uuid::new_v4();
        let event = lifecycle
            .transition(id, OrderState::Created, OrderState::Validated, "ok")
            .unwrap();
        assert_eq!(event.from, OrderState::Created);
        assert_eq!(event.to, OrderState::Validated);
        assert_eq!(lifecycle.history(id).len(), 1);
    }

    #[test]
    fn disallowed_transition_is_rejected() {
        let lifecycle = OrderLifecycle::new();
        let id = Uuid::new_v4();
        let err = lifecycle
            .transition(id, OrderState::Created, OrderState::Completed, "")
            .unwrap_err();
        assert!(matches!(err, OmsError::InvalidTransition { .. }));
        assert!(lifecycle.history(id).is_empty());
    }

    #[test]
    fn terminal_state_accepts_no_transition() {
        assert!(OrderLifecycle::valid_transitions(OrderState::Completed).is_empty());
        assert!(OrderState::Completed.is_terminal());
    }

    #[test]
    fn callback_panic_does_not_fail_the_transition() {
        let lifecycle = OrderLifecycle::new();
        lifecycle.on_enter(OrderState::Rejected, |_event| panic!("boom"));
        let id = Uuid::new_v4();
        let result = lifecycle.transition(id, OrderState::Created, OrderState::Rejected, "bad order");
        assert!(result.is_ok());
    }

    #[test]
    fn callback_runs_on_matching_target_state() {
        let lifecycle = OrderLifecycle::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = hits.clone();
        lifecycle.on_enter(OrderState::Validated, move |_| {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        });
        let id = Uuid::new_v4();
        lifecycle
            .transition(id, OrderState::Created, OrderState::Validated, "")
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expiry_sweeper_skips_terminal_and_unexpired_orders() {
        let now = Ts::from_millis(10_000);
        let expired = Uuid::new_v4();
        let not_yet = Uuid::new_v4();
        let terminal = Uuid::new_v4();
        let no_expiry = Uuid::new_v4();
        let due = ExpirySweeper::due(
            now,
            &[
                (expired, OrderState::Acknowledged, Some(Ts::from_millis(9_000))),
                (not_yet, OrderState::Acknowledged, Some(Ts::from_millis(11_000))),
                (terminal, OrderState::Completed, Some(Ts::from_millis(1))),
                (no_expiry, OrderState::Acknowledged, None),
            ],
        );
        assert_eq!(due, vec![expired]);
    }
}
