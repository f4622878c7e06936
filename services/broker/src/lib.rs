//! Broker adapter contract: one adapter owns one connection to one broker,
//! placing/modifying/cancelling/querying orders and emitting async status
//! and fill streams (§4.1).

pub mod adapter;
pub mod error;
pub mod mock;
pub mod simulated;
pub mod types;

pub use adapter::BrokerAdapter;
pub use error::{BrokerError, BrokerResult};
pub use mock::{MockAdapter, Scripted};
pub use simulated::SimulatedAdapter;
pub use types::{
    BrokerFill, BrokerOrderId, CanonicalStatus, ModifyOrderRequest, OrderType, PlaceOrderRequest,
    StatusUpdate, Validity,
};
