//! Distribution pipeline and WebSocket errors (§4.11).

use thiserror::Error;

/// Error raised while fanning an update out to the cache, store, or bus.
#[derive(Debug, Error)]
pub enum DistributionError {
    /// The historical store rejected the write.
    #[error("store write failed: {0}")]
    Store(#[from] market_data_store::StoreError),

    /// No subscriber is registered for the keyed topic; not fatal, but
    /// surfaced so callers can decide whether to log it.
    #[error("no bus subscribers for topic {topic}")]
    NoSubscribers {
        /// The topic (symbol-keyed) with no subscribers.
        topic: String,
    },
}

/// Result alias for distribution pipeline operations.
pub type DistributionResult<T> = Result<T, DistributionError>;
