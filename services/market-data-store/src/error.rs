//! Cache and historical-store error types (§4.9, §4.10).

use thiserror::Error;

/// Error returned by the historical store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying SQLite connection failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result alias for historical store operations.
pub type StoreResult<T> = Result<T, StoreError>;
