//! Source connector and source-manager error types (§4.8).

use thiserror::Error;

/// Error returned by a single [`crate::MarketDataSource`] call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The connector has not established (or has lost) its upstream
    /// connection.
    #[error("source not connected")]
    NotConnected,

    /// A transient failure (network blip, timeout, rate limit) that a
    /// caller may reasonably retry against the same or next connector.
    #[error("transient error: {0}")]
    Transient(String),

    /// The request was invalid for this connector (unknown symbol,
    /// unsupported interval).
    #[error("invalid request: {0}")]
    Invalid(String),
}

/// Result alias for a single connector call.
pub type SourceResult<T> = Result<T, SourceError>;

/// Error returned by the [`crate::SourceManager`] after trying every
/// configured connector.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// No connectors were registered.
    #[error("no connectors configured")]
    NoConnectorsConfigured,

    /// Every registered connector failed; carries the last error observed,
    /// from the last connector tried.
    #[error("all {attempted} connector(s) failed, last error from '{last_name}': {source}")]
    AllFailed {
        /// Number of connectors tried.
        attempted: usize,
        /// Name of the last connector tried.
        last_name: String,
        /// The error it returned.
        #[source]
        source: SourceError,
    },
}

/// Result alias for a source manager operation.
pub type ManagerResult<T> = Result<T, ManagerError>;
