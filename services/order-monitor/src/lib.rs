//! Order monitoring and SLA alerting (§4.7): polls open orders against
//! their expected completion time and raises de-duplicated alerts on
//! delay, partial-fill stall, price deviation, or rejection.

pub mod alert;
pub mod config;
pub mod error;
pub mod tracker;

pub use alert::{Alert, AlertKind};
pub use config::MonitorConfig;
pub use error::{MonitorError, MonitorResult};
pub use tracker::OrderMonitor;

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Px, Qty, Symbol, Ts};
    use oms::order::{Order, OrderSide, OrderStatus, OrderType, ProductType, Validity};
    use uuid::Uuid;

    fn base_order(status: OrderStatus) -> Order {
        let now = Ts::now();
        Order {
            id: Uuid::new_v4(),
            portfolio_id: Uuid::new_v4(),
            strategy_id: Uuid::new_v4(),
            symbol: Symbol(1),
            exchange: "NSE".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            product_type: ProductType::Intraday,
            validity: Validity::Day,
            quantity: Qty::from_units(10),
            price: Some(Px::new(100.0)),
            trigger_price: None,
            filled_quantity: Qty::from_units(5),
            average_filled_price: Px::new(105.0),
            broker_order_id: Some("B1".into()),
            parent_order_id: None,
            tags: vec![],
            status,
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    #[test]
    fn delayed_alert_fires_once_and_suppresses_duplicates() {
        let monitor = OrderMonitor::new(MonitorConfig { delay_threshold_ms: 0, ..MonitorConfig::default() });
        let order = base_order(OrderStatus::Acknowledged);
        monitor.track(order.id, 0, OrderStatus::Acknowledged);
        std::thread::sleep(std::time::Duration::from_millis(5));

        let first = monitor.poll(&order);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, AlertKind::Delayed);

        let second = monitor.poll(&order);
        assert!(second.is_empty(), "duplicate unacknowledged alert must be suppressed");
    }

    #[test]
    fn acknowledging_lets_the_same_kind_fire_again() {
        let monitor = OrderMonitor::new(MonitorConfig { delay_threshold_ms: 0, ..MonitorConfig::default() });
        let order = base_order(OrderStatus::Acknowledged);
        monitor.track(order.id, 0, OrderStatus::Acknowledged);
        std::thread::sleep(std::time::Duration::from_millis(5));

        let raised = monitor.poll(&order);
        assert_eq!(raised.len(), 1);
        monitor.acknowledge(raised[0].id).unwrap();

        let again = monitor.poll(&order);
        assert_eq!(again.len(), 1, "acknowledged alert should be able to fire again");
    }

    #[test]
    fn price_deviation_detected_for_limit_orders() {
        let monitor = OrderMonitor::new(MonitorConfig {
            delay_threshold_ms: u64::MAX,
            deviation_pct: 0.01,
            ..MonitorConfig::default()
        });
        let order = base_order(OrderStatus::PartiallyFilled);
        monitor.track(order.id, u64::MAX, OrderStatus::PartiallyFilled);

        let raised = monitor.poll(&order);
        assert!(raised.iter().any(|a| a.kind == AlertKind::PriceDeviation));
    }

    #[test]
    fn rejected_alert_fires_once_on_transition() {
        let monitor = OrderMonitor::new(MonitorConfig { delay_threshold_ms: u64::MAX, ..MonitorConfig::default() });
        let mut order = base_order(OrderStatus::Acknowledged);
        order.price = None;
        monitor.track(order.id, u64::MAX, OrderStatus::Acknowledged);
        assert!(monitor.poll(&order).is_empty());

        order.status = OrderStatus::Rejected;
        let raised = monitor.poll(&order);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].kind, AlertKind::Rejected);

        assert!(monitor.poll(&order).is_empty(), "already-tracked status keeps rejection from re-firing");
    }

    #[test]
    fn acknowledge_missing_alert_errors() {
        let monitor = OrderMonitor::new(MonitorConfig::default());
        assert!(monitor.acknowledge(Uuid::new_v4()).is_err());
    }
}
