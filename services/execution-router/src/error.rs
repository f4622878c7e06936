//! Submission pipeline and routing error types (§4.2, §4.5).

use uuid::Uuid;

use broker::BrokerError;
use oms::error::OmsError;
use risk_manager::error::RiskError;

/// Errors raised by the smart router, submission pipeline, or an execution
/// algorithm.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The admission rate limiter had no tokens and fail-fast was requested
    /// rather than blocking (§4.5 step 1).
    #[error("admission queue full")]
    QueueFull,

    /// A blocking admission wait (§4.5 step 1) was cancelled before a token
    /// became available.
    #[error("admission wait cancelled")]
    AdmissionCancelled,

    /// No adapter is registered for the candidate's symbol, or none
    /// quoted it for the selection policy to choose among.
    #[error("no adapter available for {symbol}")]
    NoAdapterAvailable {
        /// Instrument that had no routable adapter.
        symbol: common::Symbol,
    },

    /// `adapter_name` is not a registered adapter.
    #[error("adapter not registered: {adapter_name}")]
    AdapterNotFound {
        /// The unregistered adapter name.
        adapter_name: String,
    },

    /// The adapter's circuit breaker is open; the call was not attempted.
    #[error("circuit open for adapter {adapter_name}")]
    CircuitOpen {
        /// The breaker-tripped adapter.
        adapter_name: String,
    },

    /// The adapter call failed on every retry attempt.
    #[error("adapter {adapter_name} exhausted {attempts} retries: {source}")]
    RetriesExhausted {
        /// Adapter that failed.
        adapter_name: String,
        /// Attempts made, including the first.
        attempts: u32,
        /// The last error observed.
        #[source]
        source: BrokerError,
    },

    /// The adapter rejected the order outright (non-retryable); never
    /// resubmitted through backoff.
    #[error("adapter {adapter_name} rejected submission: {source}")]
    SubmissionRejected {
        /// Adapter that rejected the order.
        adapter_name: String,
        /// The rejection reported by the adapter.
        #[source]
        source: BrokerError,
    },

    /// Lifecycle rejected the requested transition.
    #[error(transparent)]
    Oms(#[from] OmsError),

    /// Pre-trade risk validation rejected the candidate (§4.5 step 2).
    #[error(transparent)]
    RiskRejected(#[from] RiskError),

    /// An execution algorithm could not produce a valid schedule (e.g. a
    /// non-positive slice count or duration).
    #[error("algorithm execution failed: {reason}")]
    AlgorithmExecutionFailed {
        /// What went wrong.
        reason: String,
    },

    /// A parent order's children all returned no responses to aggregate.
    #[error("no child order responses to aggregate")]
    NoChildResponses,

    /// No dead-letter entry exists for the given order id.
    #[error("no dead-letter entry for order {order_id}")]
    DeadLetterNotFound {
        /// The order id that was looked up.
        order_id: Uuid,
    },
}

/// Result alias for router/pipeline/algorithm operations.
pub type ExecutionResult<T> = Result<T, ExecutionError>;
