//! Parent/child aggregation for algorithm-driven orders (§4.6 "Parent
//! aggregation"). An algo parent is never itself sent to a broker; the
//! algorithm driver synthetically acknowledges it once its children start,
//! then forwards each child fill into the parent via [`oms::OrderRegistry::fill`].
//! That single call already produces exactly the aggregation the spec
//! describes: `PartiallyFilled` on the first forwarded fill, `Completed`
//! once the forwarded total reaches the parent's quantity.

use uuid::Uuid;

use oms::OrderRegistry;

use crate::error::{ExecutionError, ExecutionResult};

/// Synthetically submit and acknowledge an algo parent immediately after
/// its first child has been created, since the parent itself never reaches
/// a broker. `ack_tag` is recorded as its broker order id for traceability
/// (e.g. `"ALGO:TWAP"`).
///
/// `child_count` is how many children the algorithm's schedule actually
/// produced. If it's zero — e.g. POV rounding `observed_volume * target%`
/// down to zero on a thin interval — the parent is failed instead of
/// acknowledged, since there is nothing for it to ever fill (§9 Open
/// Question #2: no child submitted -> `Failed`/`NoChildResponses`).
pub fn start_algo_parent(
    oms: &OrderRegistry,
    parent_id: Uuid,
    ack_tag: impl Into<String>,
    child_count: usize,
) -> ExecutionResult<()> {
    oms.validate(parent_id)?;
    if child_count == 0 {
        oms.fail(parent_id, "algorithm produced no child orders")?;
        return Err(ExecutionError::NoChildResponses);
    }
    oms.submit(parent_id)?;
    oms.acknowledge(parent_id, ack_tag)?;
    Ok(())
}

/// Aggregate the outcome of submitting an algo parent's child orders to
/// their adapters. If every submission failed, the parent already
/// acknowledged by [`start_algo_parent`] has nothing left that can ever
/// fill it, so it's failed here rather than left stuck `Acknowledged`
/// forever (§9 Open Question #2, same empty-responses rule as the
/// zero-children case above).
pub fn aggregate_child_responses<T>(
    oms: &OrderRegistry,
    parent_id: Uuid,
    child_results: &[ExecutionResult<T>],
) -> ExecutionResult<()> {
    if child_results.is_empty() || child_results.iter().all(Result::is_err) {
        oms.fail(parent_id, "no child order was successfully submitted")?;
        return Err(ExecutionError::NoChildResponses);
    }
    Ok(())
}

/// Forward one child's fill onto the parent. Called once per child fill as
/// they stream in; the parent's own lifecycle derives `PartiallyFilled` vs.
/// `Completed` from its own running total, which equals Σ child filled once
/// every child fill has been forwarded here.
pub fn on_child_fill(
    oms: &OrderRegistry,
    parent_id: Uuid,
    child_fill_qty: common::Qty,
    child_fill_price: common::Px,
) -> ExecutionResult<Vec<oms::dependency::DependencyAction>> {
    Ok(oms.fill(parent_id, child_fill_qty, child_fill_price)?)
}

/// All of the parent's children have reached a terminal state in response
/// to a cancellation request; confirm the parent's own cancellation.
pub fn on_cancellation_complete(oms: &OrderRegistry, parent_id: Uuid) -> ExecutionResult<Vec<oms::dependency::DependencyAction>> {
    Ok(oms.confirm_cancel(parent_id)?)
}

/// A requested cancellation could not be confirmed before the algorithm's
/// `max_duration` elapsed; fail the parent rather than leave it stuck in
/// `Cancelling` forever.
pub fn on_cancellation_timeout(
    oms: &OrderRegistry,
    parent_id: Uuid,
    reason: impl Into<String>,
) -> ExecutionResult<Vec<oms::dependency::DependencyAction>> {
    Ok(oms.fail(parent_id, reason.into())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Px, Qty, Symbol};
    use oms::order::{NewOrder, OrderSide, OrderType, ProductType, Validity};
    use oms::OmsConfig;
    use uuid::Uuid;

    fn new_parent(oms: &OrderRegistry, qty: i64) -> Uuid {
        let id = Uuid::new_v4();
        oms.create_order(NewOrder {
            id,
            portfolio_id: Uuid::new_v4(),
            strategy_id: Uuid::new_v4(),
            symbol: Symbol(1),
            exchange: "NSE".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            product_type: ProductType::Intraday,
            validity: Validity::Day,
            quantity: Qty::from_units(qty),
            price: None,
            trigger_price: None,
            parent_order_id: None,
            tags: vec![],
            expires_at: None,
        })
        .unwrap();
        id
    }

    #[test]
    fn child_fills_aggregate_into_partial_then_complete() {
        let oms = OrderRegistry::new(OmsConfig::default());
        let parent = new_parent(&oms, 10);
        start_algo_parent(&oms, parent, "ALGO:TWAP", 2).unwrap();

        on_child_fill(&oms, parent, Qty::from_units(4), Px::new(100.0)).unwrap();
        assert_eq!(oms.get(parent).unwrap().status, oms::order::OrderStatus::PartiallyFilled);

        on_child_fill(&oms, parent, Qty::from_units(6), Px::new(101.0)).unwrap();
        assert_eq!(oms.get(parent).unwrap().status, oms::order::OrderStatus::Filled);
    }

    #[test]
    fn cancellation_timeout_fails_the_parent() {
        let oms = OrderRegistry::new(OmsConfig::default());
        let parent = new_parent(&oms, 10);
        start_algo_parent(&oms, parent, "ALGO:POV", 2).unwrap();
        oms.request_cancel(parent).unwrap();
        on_cancellation_timeout(&oms, parent, "max_duration elapsed before children cancelled").unwrap();
        assert_eq!(oms.get(parent).unwrap().status, oms::order::OrderStatus::Failed);
    }

    #[test]
    fn zero_children_fails_the_parent_without_acknowledging_it() {
        let oms = OrderRegistry::new(OmsConfig::default());
        let parent = new_parent(&oms, 10);
        let err = start_algo_parent(&oms, parent, "ALGO:POV", 0).unwrap_err();
        assert!(matches!(err, ExecutionError::NoChildResponses));
        assert_eq!(oms.get(parent).unwrap().status, oms::order::OrderStatus::Failed);
    }

    #[test]
    fn all_failed_child_submissions_fail_an_already_acknowledged_parent() {
        let oms = OrderRegistry::new(OmsConfig::default());
        let parent = new_parent(&oms, 10);
        start_algo_parent(&oms, parent, "ALGO:TWAP", 2).unwrap();

        let child_results: Vec<ExecutionResult<Uuid>> =
            vec![Err(ExecutionError::QueueFull), Err(ExecutionError::QueueFull)];
        let err = aggregate_child_responses(&oms, parent, &child_results).unwrap_err();
        assert!(matches!(err, ExecutionError::NoChildResponses));
        assert_eq!(oms.get(parent).unwrap().status, oms::order::OrderStatus::Failed);
    }

    #[test]
    fn at_least_one_successful_child_leaves_the_parent_acknowledged() {
        let oms = OrderRegistry::new(OmsConfig::default());
        let parent = new_parent(&oms, 10);
        start_algo_parent(&oms, parent, "ALGO:TWAP", 2).unwrap();

        let child_results: Vec<ExecutionResult<Uuid>> = vec![Err(ExecutionError::QueueFull), Ok(Uuid::new_v4())];
        aggregate_child_responses(&oms, parent, &child_results).unwrap();
        assert_eq!(oms.get(parent).unwrap().status, oms::order::OrderStatus::Acknowledged);
    }
}
