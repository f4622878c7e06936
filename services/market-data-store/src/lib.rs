//! Market data cache (§4.9) and historical store (§4.10): the short-TTL
//! hot path and the durable SQLite-backed archive every inbound
//! `MarketData`/`OhlcvBar`/`IndicatorValue` eventually lands in.

pub mod cache;
pub mod compressor;
pub mod config;
pub mod error;
pub mod store;

pub use cache::MarketDataCache;
pub use compressor::{Compressor, RunLengthCompressor};
pub use config::CacheConfig;
pub use error::{StoreError, StoreResult};
pub use store::{parse_interval, HistoricalStore};
