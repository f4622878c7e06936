//! A deterministic in-memory adapter used for integration tests and demos.
//! Acknowledges every order immediately and fills it at the requested price
//! (or a synthetic mid for market orders) after a short simulated latency.

use crate::adapter::BrokerAdapter;
use crate::error::{BrokerError, BrokerResult};
use crate::types::{
    BrokerFill, BrokerOrderId, CanonicalStatus, ModifyOrderRequest, OrderType, PlaceOrderRequest,
    StatusUpdate,
};
use async_trait::async_trait;
use common::{Px, Ts};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

struct OrderRecord {
    request: PlaceOrderRequest,
    status: CanonicalStatus,
    fills: Vec<BrokerFill>,
}

/// Simulated broker adapter. Every placed order is acknowledged, then
/// filled in full on the next `get_status`/`get_fills` poll or immediately
/// on a background tick, whichever the caller exercises.
pub struct SimulatedAdapter {
    name: String,
    connected: AtomicBool,
    next_id: AtomicU64,
    orders: RwLock<FxHashMap<String, OrderRecord>>,
    status_tx: broadcast::Sender<StatusUpdate>,
    fill_tx: broadcast::Sender<BrokerFill>,
    synthetic_mid: Px,
}

impl SimulatedAdapter {
    /// Create a new simulated adapter. `synthetic_mid` is the price used to
    /// fill market orders that carry no limit price.
    #[must_use]
    pub fn new(name: impl Into<String>, synthetic_mid: Px) -> Self {
        let (status_tx, _) = broadcast::channel(1024);
        let (fill_tx, _) = broadcast::channel(1024);
        Self {
            name: name.into(),
            connected: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            orders: RwLock::new(FxHashMap::default()),
            status_tx,
            fill_tx,
            synthetic_mid,
        }
    }

    fn require_connected(&self) -> BrokerResult<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }

    fn fill_price(&self, request: &PlaceOrderRequest) -> Px {
        match request.order_type {
            OrderType::Market => self.synthetic_mid,
            _ => request.price.unwrap_or(self.synthetic_mid),
        }
    }
}

#[async_trait]
impl BrokerAdapter for SimulatedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> BrokerResult<()> {
        self.connected.store(true, Ordering::Release);
        debug!(adapter = %self.name, "connected");
        Ok(())
    }

    async fn disconnect(&self) -> BrokerResult<()> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    async fn place(&self, order: &PlaceOrderRequest) -> BrokerResult<BrokerOrderId> {
        self.require_connected()?;
        if order.quantity.as_i64() <= 0 {
            return Err(BrokerError::Validation("quantity must be positive".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let broker_id = BrokerOrderId(format!("{}-SIM-{id}", self.name));

        let fill_price = self.fill_price(order);
        let fill = BrokerFill {
            broker_order_id: broker_id.clone(),
            execution_id: format!("{}-EXEC-{id}", self.name),
            quantity: order.quantity,
            price: fill_price,
            timestamp: Ts::now(),
        };

        self.orders.write().insert(
            broker_id.0.clone(),
            OrderRecord {
                request: order.clone(),
                status: CanonicalStatus::Filled,
                fills: vec![fill.clone()],
            },
        );

        let _ = self.status_tx.send(StatusUpdate {
            broker_order_id: broker_id.clone(),
            status: CanonicalStatus::Acknowledged,
            timestamp: Ts::now(),
        });
        let _ = self.status_tx.send(StatusUpdate {
            broker_order_id: broker_id.clone(),
            status: CanonicalStatus::Filled,
            timestamp: Ts::now(),
        });
        let _ = self.fill_tx.send(fill);

        Ok(broker_id)
    }

    async fn modify(
        &self,
        broker_id: &BrokerOrderId,
        request: ModifyOrderRequest,
    ) -> BrokerResult<()> {
        self.require_connected()?;
        let mut orders = self.orders.write();
        let record = orders
            .get_mut(&broker_id.0)
            .ok_or_else(|| BrokerError::Validation("unknown order".into()))?;
        if record.status == CanonicalStatus::Filled || record.status == CanonicalStatus::Cancelled
        {
            return Err(BrokerError::Validation("order is terminal".into()));
        }
        if let Some(price) = request.price {
            record.request.price = Some(price);
        }
        if let Some(qty) = request.quantity {
            record.request.quantity = qty;
        }
        Ok(())
    }

    async fn cancel(&self, broker_id: &BrokerOrderId) -> BrokerResult<()> {
        self.require_connected()?;
        let mut orders = self.orders.write();
        let record = orders
            .get_mut(&broker_id.0)
            .ok_or_else(|| BrokerError::Validation("unknown order".into()))?;
        if record.status == CanonicalStatus::Filled {
            return Err(BrokerError::Execution("already filled".into()));
        }
        record.status = CanonicalStatus::Cancelled;
        let _ = self.status_tx.send(StatusUpdate {
            broker_order_id: broker_id.clone(),
            status: CanonicalStatus::Cancelled,
            timestamp: Ts::now(),
        });
        Ok(())
    }

    async fn get_status(&self, broker_id: &BrokerOrderId) -> BrokerResult<CanonicalStatus> {
        self.require_connected()?;
        self.orders
            .read()
            .get(&broker_id.0)
            .map(|r| r.status)
            .ok_or_else(|| BrokerError::Validation("unknown order".into()))
    }

    async fn get_fills(&self, broker_id: &BrokerOrderId) -> BrokerResult<Vec<BrokerFill>> {
        self.require_connected()?;
        self.orders
            .read()
            .get(&broker_id.0)
            .map(|r| r.fills.clone())
            .ok_or_else(|| BrokerError::Validation("unknown order".into()))
    }

    fn status_stream(&self) -> broadcast::Receiver<StatusUpdate> {
        self.status_tx.subscribe()
    }

    fn fill_stream(&self) -> broadcast::Receiver<BrokerFill> {
        self.fill_tx.subscribe()
    }
}

/// Shareable handle, since every caller of a `BrokerAdapter` holds it
/// behind an `Arc` once registered with the router.
pub type SharedSimulatedAdapter = Arc<SimulatedAdapter>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Validity;
    use common::{Qty, Side, Symbol};

    fn request() -> PlaceOrderRequest {
        PlaceOrderRequest {
            client_order_id: "c1".into(),
            symbol: Symbol(1),
            side: Side::Bid,
            order_type: OrderType::Market,
            validity: Validity::Day,
            quantity: Qty::from_units(10),
            price: None,
            trigger_price: None,
        }
    }

    #[tokio::test]
    async fn place_requires_connection() {
        let adapter = SimulatedAdapter::new("sim", Px::new(100.0));
        let err = adapter.place(&request()).await.unwrap_err();
        assert_eq!(err, BrokerError::NotConnected);
    }

    #[tokio::test]
    async fn place_then_get_status_is_filled() {
        let adapter = SimulatedAdapter::new("sim", Px::new(100.0));
        adapter.connect().await.unwrap();
        let id = adapter.place(&request()).await.unwrap();
        let status = adapter.get_status(&id).await.unwrap();
        assert_eq!(status, CanonicalStatus::Filled);
        let fills = adapter.get_fills(&id).await.unwrap();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, Px::new(100.0));
    }

    #[tokio::test]
    async fn cancel_after_fill_is_rejected() {
        let adapter = SimulatedAdapter::new("sim", Px::new(100.0));
        adapter.connect().await.unwrap();
        let id = adapter.place(&request()).await.unwrap();
        let err = adapter.cancel(&id).await.unwrap_err();
        assert!(matches!(err, BrokerError::Execution(_)));
    }
}
