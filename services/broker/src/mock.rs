//! A programmable adapter used to exercise the submission pipeline's retry,
//! circuit-breaker, and dead-letter paths (§4.5, §8 S3/S4-style scenarios)
//! without a real broker connection.

use crate::adapter::BrokerAdapter;
use crate::error::{BrokerError, BrokerResult};
use crate::types::{
    BrokerFill, BrokerOrderId, CanonicalStatus, ModifyOrderRequest, PlaceOrderRequest,
    StatusUpdate,
};
use async_trait::async_trait;
use common::Ts;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;

/// A scripted response for one `place` call.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Succeed and acknowledge with a synthetic broker id.
    Ack,
    /// Fail with the given error.
    Fail(BrokerError),
}

/// Fault-injecting adapter: callers push a queue of [`Scripted`] responses
/// ahead of time; each `place` call consumes the next one (repeating the
/// last entry once the queue is drained, so a single `Fail(Transient)`
/// entry models a broker that is down indefinitely).
pub struct MockAdapter {
    name: String,
    connected: AtomicBool,
    next_id: AtomicU64,
    script: Mutex<VecDeque<Scripted>>,
    status_tx: broadcast::Sender<StatusUpdate>,
    fill_tx: broadcast::Sender<BrokerFill>,
}

impl MockAdapter {
    /// Create a mock adapter with an initial response script.
    #[must_use]
    pub fn new(name: impl Into<String>, script: Vec<Scripted>) -> Self {
        let (status_tx, _) = broadcast::channel(256);
        let (fill_tx, _) = broadcast::channel(256);
        Self {
            name: name.into(),
            connected: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            script: Mutex::new(script.into()),
            status_tx,
            fill_tx,
        }
    }

    /// Append more scripted responses.
    pub fn push(&self, response: Scripted) {
        self.script.lock().push_back(response);
    }

    fn next_response(&self) -> Scripted {
        let mut script = self.script.lock();
        match script.pop_front() {
            Some(r) => r,
            None => Scripted::Ack,
        }
    }
}

#[async_trait]
impl BrokerAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> BrokerResult<()> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) -> BrokerResult<()> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    async fn place(&self, _order: &PlaceOrderRequest) -> BrokerResult<BrokerOrderId> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(BrokerError::NotConnected);
        }
        match self.next_response() {
            Scripted::Ack => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let broker_id = BrokerOrderId(format!("{}-MOCK-{id}", self.name));
                let _ = self.status_tx.send(StatusUpdate {
                    broker_order_id: broker_id.clone(),
                    status: CanonicalStatus::Acknowledged,
                    timestamp: Ts::now(),
                });
                Ok(broker_id)
            }
            Scripted::Fail(err) => Err(err),
        }
    }

    async fn modify(
        &self,
        _broker_id: &BrokerOrderId,
        _request: ModifyOrderRequest,
    ) -> BrokerResult<()> {
        match self.next_response() {
            Scripted::Ack => Ok(()),
            Scripted::Fail(err) => Err(err),
        }
    }

    async fn cancel(&self, _broker_id: &BrokerOrderId) -> BrokerResult<()> {
        match self.next_response() {
            Scripted::Ack => Ok(()),
            Scripted::Fail(err) => Err(err),
        }
    }

    async fn get_status(&self, _broker_id: &BrokerOrderId) -> BrokerResult<CanonicalStatus> {
        Ok(CanonicalStatus::Acknowledged)
    }

    async fn get_fills(&self, _broker_id: &BrokerOrderId) -> BrokerResult<Vec<BrokerFill>> {
        Ok(Vec::new())
    }

    fn status_stream(&self) -> broadcast::Receiver<StatusUpdate> {
        self.status_tx.subscribe()
    }

    fn fill_stream(&self) -> broadcast::Receiver<BrokerFill> {
        self.fill_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderType, Validity};
    use common::{Qty, Side, Symbol};

    fn request() -> PlaceOrderRequest {
        PlaceOrderRequest {
            client_order_id: "c1".into(),
            symbol: Symbol(1),
            side: Side::Bid,
            order_type: OrderType::Market,
            validity: Validity::Day,
            quantity: Qty::from_units(1),
            price: None,
            trigger_price: None,
        }
    }

    #[tokio::test]
    async fn script_drains_in_order() {
        let adapter = MockAdapter::new(
            "m",
            vec![
                Scripted::Fail(BrokerError::Transient("timeout".into())),
                Scripted::Ack,
            ],
        );
        assert!(adapter.place(&request()).await.is_err());
        assert!(adapter.place(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn drained_script_repeats_ack() {
        let adapter = MockAdapter::new("m", vec![]);
        assert!(adapter.place(&request()).await.is_ok());
        assert!(adapter.place(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn disconnected_adapter_is_not_connected() {
        let adapter = MockAdapter::new("m", vec![]);
        adapter.disconnect().await.unwrap();
        let err = adapter.place(&request()).await.unwrap_err();
        assert_eq!(err, BrokerError::NotConnected);
    }
}
