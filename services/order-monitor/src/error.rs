//! Order monitor error type (§4.7).

use uuid::Uuid;

/// Errors raised by the order monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// No alert with this id exists.
    #[error("no alert with id {alert_id}")]
    AlertNotFound {
        /// The id that was looked up.
        alert_id: Uuid,
    },
}

/// Result alias for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
