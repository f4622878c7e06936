//! WebSocket wire frames (§4.11): clients send `{subscribe, unsubscribe,
//! quote, ping}`; the server replies `{welcome, success/error, update,
//! pong}`.

use serde::{Deserialize, Serialize};

use common::market::MarketData;

/// A frame sent by a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Subscribe to live updates for `symbol`.
    Subscribe {
        /// Instrument id.
        symbol: u32,
    },
    /// Stop receiving updates for `symbol`.
    Unsubscribe {
        /// Instrument id.
        symbol: u32,
    },
    /// One-shot request for the current cached quote.
    Quote {
        /// Instrument id.
        symbol: u32,
    },
    /// Client-initiated liveness check.
    Ping,
}

/// A frame sent by the server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once, immediately after the connection is accepted.
    Welcome {
        /// Connection id assigned by the registry.
        connection_id: u64,
    },
    /// Acknowledges a request that succeeded.
    Success {
        /// What the request asked for, echoed back.
        request: &'static str,
    },
    /// Acknowledges a request that failed.
    Error {
        /// What the request asked for, echoed back.
        request: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// A live update for a subscribed symbol.
    Update {
        /// The distributed market data.
        data: MarketData,
    },
    /// Reply to a client ping.
    Pong,
}
