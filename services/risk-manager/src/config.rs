//! Risk manager configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the risk manager that aren't part of a [`crate::RiskProfile`]
/// itself (those are per-portfolio business limits; this is service config).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Width of the trailing window used by the orders-per-minute check.
    /// §4.3 fixes this at 60s; kept configurable for testing.
    pub order_rate_window_secs: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            order_rate_window_secs: 60,
        }
    }
}
