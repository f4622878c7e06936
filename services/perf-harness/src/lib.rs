//! Object pools, a ring buffer, latency tracking, and synthetic load
//! generation used to benchmark the submission pipeline and market
//! data distribution path (C12).

pub mod arena;
pub mod latency;
pub mod load;
pub mod pools;
pub mod ring_buffer;

pub use arena::{Arena, ArenaStats};
pub use latency::{LatencySample, LatencySummary, LatencyTracker};
pub use load::LoadGenerator;
pub use pools::{ObjectPool, PoolRef};
pub use ring_buffer::RingBuffer;
