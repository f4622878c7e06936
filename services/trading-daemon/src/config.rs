//! Daemon configuration (§10.3): one typed field per tunable, no
//! config-sourcing framework. Loaded from an optional TOML file and
//! overridable from the CLI (`src/main.rs`).

use serde::{Deserialize, Serialize};

use execution_router::PipelineConfig;
use market_data_store::CacheConfig;
use order_monitor::MonitorConfig;
use risk_manager::RiskConfig;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    /// if set.
    pub log_level: String,
    /// HTTP/WebSocket bind address, e.g. `"0.0.0.0:8080"`.
    pub bind_addr: String,
    /// Path to the SQLite historical store file. `":memory:"` runs the
    /// store in-memory (used by tests and local demos).
    pub store_path: String,
    /// How many distinct symbols the demo market data feed generates.
    pub demo_symbol_count: u32,
    /// How often the demo feed pushes a synthetic tick per symbol.
    pub demo_tick_interval_ms: u64,
    /// Market data cache sizing and sweep cadence.
    pub cache: CacheConfig,
    /// Submission pipeline tunables.
    pub pipeline: PipelineConfig,
    /// Risk manager service tunables.
    pub risk: RiskConfig,
    /// Order monitor thresholds.
    pub monitor: MonitorConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            store_path: ":memory:".to_string(),
            demo_symbol_count: 25,
            demo_tick_interval_ms: 500,
            cache: CacheConfig::default(),
            pipeline: PipelineConfig::default(),
            risk: RiskConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load from a TOML file at `path`, falling back to [`Default`] for
    /// any field the file omits.
    pub fn load(path: &str) -> Result<Self, crate::error::ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| crate::error::ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config = toml::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_round_trippable_as_toml() {
        let config = DaemonConfig::default();
        let text = toml::to_string(&config).expect("default config serializes");
        let parsed: DaemonConfig = toml::from_str(&text).expect("serialized default config parses back");
        assert_eq!(parsed.bind_addr, config.bind_addr);
    }

    #[test]
    fn missing_file_surfaces_as_config_error() {
        let err = DaemonConfig::load("/nonexistent/path/daemon.toml").unwrap_err();
        assert!(matches!(err, crate::error::ConfigError::Io { .. }));
    }
}
