//! Cache sizing and sweep cadence (§4.9).

use serde::{Deserialize, Serialize};

/// Tunables for [`crate::cache::MarketDataCache`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries older than this are treated as a miss.
    pub ttl_ms: u64,
    /// Evict the oldest-by-insertion entry once the cache holds this many.
    pub max_size: usize,
    /// Values whose encoded size is at or above this many bytes are
    /// compressed before being stored.
    pub compress_threshold_bytes: usize,
    /// How often the background sweeper removes expired entries.
    pub cleanup_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_ms: 5_000, max_size: 100_000, compress_threshold_bytes: 1_024, cleanup_interval_ms: 1_000 }
    }
}
