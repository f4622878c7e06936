//! Real-time distribution (§4.11): the processor chain, cache/store
//! fan-out, event bus publication, and WebSocket broadcast that every
//! inbound market data update passes through.

pub mod error;
pub mod message;
pub mod pipeline;
pub mod processor;
pub mod registry;
pub mod ws;

pub use error::{DistributionError, DistributionResult};
pub use message::{ClientFrame, ServerFrame};
pub use pipeline::{DistributedUpdate, Distributor};
pub use processor::{AggregateStage, EnrichStage, NormalizeStage, ProcessingStage, ProcessorChain};
pub use registry::ConnectionRegistry;
pub use ws::{handle_upgrade, WsState};
