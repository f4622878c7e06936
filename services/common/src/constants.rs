//! Constants shared across the workspace. Single source of truth for the
//! magic numbers that would otherwise get re-typed per crate.

/// Fixed-point scale factor (4 decimal places); mirrors [`crate::types::SCALE_4`].
pub const FIXED_POINT_SCALE: i64 = 10_000;

/// 1% expressed as basis points.
pub const PERCENT_TO_BP: i64 = 100;

// Time
pub const MILLIS_PER_SEC: u64 = 1_000;
pub const NANOS_PER_MILLI: u64 = 1_000_000;
pub const SECS_PER_MIN: u64 = 60;
pub const MINS_PER_HOUR: u64 = 60;

// Submission pipeline defaults (§4.5 tunables, overridden by each crate's Config)
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5_000;

// Channel / buffer sizing defaults used by the event bus and worker pools
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

// EMA smoothing factor for router and position metrics (§4.2)
pub const METRICS_EMA_ALPHA: f64 = 0.2;
