//! Broker adapter error types (spec §4.1: every call fails with one of a
//! fixed set of typed errors).

use thiserror::Error;

/// Error returned by a [`crate::BrokerAdapter`] call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The adapter has not established (or has lost) its connection.
    #[error("adapter not connected")]
    NotConnected,

    /// Authentication with the broker failed or the session expired.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The broker rejected the request as invalid (bad parameters) or
    /// rejected the order outright (risk/margin/price-band rejection).
    #[error("validation error: {0}")]
    Validation(String),

    /// A transient failure (network blip, timeout) that is safe to retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// The broker accepted the request but execution itself failed
    /// (e.g. partial reject mid-modify).
    #[error("execution error: {0}")]
    Execution(String),
}

impl BrokerError {
    /// Whether the submission pipeline's retry stage (§4.5 step 6) may
    /// retry a call that failed with this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result alias for broker adapter operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
