//! The root `Runtime` object (§9 "Design Notes": global state replaced by
//! a root object passed to constructors). Every component the daemon
//! wires together is held here behind an `Arc`, constructed once in
//! `main` and handed to whichever handler or background task needs it.

use std::sync::Arc;

use distribution::{ConnectionRegistry, Distributor};
use execution_router::SubmissionPipeline;
use market_connector::SourceManager;
use market_data_store::HistoricalStore;
use oms::OrderRegistry;
use order_monitor::OrderMonitor;
use risk_manager::RiskManager;

/// Everything the HTTP/WebSocket surface and the background tasks share.
/// Cheap to clone: every field is already behind an `Arc`.
#[derive(Clone)]
pub struct Runtime {
    /// Pre-trade validation and the position book.
    pub risk: Arc<RiskManager>,
    /// Order lifecycle state machine and event log.
    pub oms: Arc<OrderRegistry>,
    /// The seven-stage submission pipeline.
    pub pipeline: Arc<SubmissionPipeline>,
    /// SLA polling and alerting.
    pub monitor: Arc<OrderMonitor>,
    /// Market data source failover.
    pub sources: Arc<SourceManager>,
    /// Durable tick/bar/indicator archive.
    pub store: Arc<HistoricalStore>,
    /// Processor chain + cache/store/bus/websocket fan-out. Holds the
    /// short-TTL quote cache (`distributor.cache()`).
    pub distributor: Arc<Distributor>,
    /// Live WebSocket connections and their symbol subscriptions.
    pub connections: Arc<ConnectionRegistry>,
    /// How many symbols the demo market data feed covers, for the
    /// `/symbols` listing endpoint.
    pub symbol_count: u32,
}
