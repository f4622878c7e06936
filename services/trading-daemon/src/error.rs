//! Daemon-level errors and the process exit code each maps to (§6 "Error
//! exit codes"): `0` ok, `1` init failure, `2` config, `3` storage, `4`
//! irrecoverable runtime.

use thiserror::Error;

/// Top-level error a running daemon can terminate on.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// A component failed to construct (adapter registration, router
    /// setup, connector wiring).
    #[error("initialization failed: {0}")]
    Init(String),

    /// The config file was missing, unreadable, or failed to parse.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The historical store or cache backing failed to open.
    #[error("storage error: {0}")]
    Storage(#[from] market_data_store::StoreError),

    /// The HTTP/WebSocket server or a background task failed in a way
    /// that leaves the process unable to continue.
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Configuration load/parse errors, kept distinct from [`DaemonError`] so
/// `?` on `toml::de::Error` and `std::io::Error` converts cleanly.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file's contents didn't parse as valid TOML for
    /// [`crate::config::DaemonConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl DaemonError {
    /// The process exit code this error should terminate with.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Init(_) => 1,
            Self::Config(_) => 2,
            Self::Storage(_) => 3,
            Self::Runtime(_) => 4,
        }
    }
}

/// Result alias for daemon startup and top-level run operations.
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Bad {
        #[allow(dead_code)]
        port: u16,
    }

    #[test]
    fn exit_codes_match_the_documented_scheme() {
        assert_eq!(DaemonError::Init("x".into()).exit_code(), 1);
        let parse_err = toml::from_str::<Bad>("port = \"not a number\"").unwrap_err();
        assert_eq!(DaemonError::Config(ConfigError::Parse(parse_err)).exit_code(), 2);
        assert_eq!(DaemonError::Runtime("x".into()).exit_code(), 4);
    }
}
