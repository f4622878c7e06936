//! Broker adapter contract (§4.1).

use crate::error::BrokerResult;
use crate::types::{BrokerFill, BrokerOrderId, ModifyOrderRequest, PlaceOrderRequest, StatusUpdate};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// One adapter talks to one broker/exchange connection. Concrete wire
/// protocols are pluggable behind this trait (out of scope per §1); this
/// crate ships [`crate::SimulatedAdapter`] and [`crate::MockAdapter`] as
/// reference implementations used by the rest of the workspace's tests.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Adapter name, used as the key in the router's adapter registry.
    fn name(&self) -> &str;

    /// Establish the broker connection.
    async fn connect(&self) -> BrokerResult<()>;

    /// Tear down the broker connection.
    async fn disconnect(&self) -> BrokerResult<()>;

    /// Place a new order, returning the broker-assigned id.
    async fn place(&self, order: &PlaceOrderRequest) -> BrokerResult<BrokerOrderId>;

    /// Modify a resting order.
    async fn modify(
        &self,
        broker_id: &BrokerOrderId,
        request: ModifyOrderRequest,
    ) -> BrokerResult<()>;

    /// Cancel a resting order.
    async fn cancel(&self, broker_id: &BrokerOrderId) -> BrokerResult<()>;

    /// Query the current canonical status of an order.
    async fn get_status(
        &self,
        broker_id: &BrokerOrderId,
    ) -> BrokerResult<crate::types::CanonicalStatus>;

    /// Query all fills recorded so far for an order.
    async fn get_fills(&self, broker_id: &BrokerOrderId) -> BrokerResult<Vec<BrokerFill>>;

    /// Subscribe to the adapter's status-update stream.
    fn status_stream(&self) -> broadcast::Receiver<StatusUpdate>;

    /// Subscribe to the adapter's fill stream.
    fn fill_stream(&self) -> broadcast::Receiver<BrokerFill>;
}
