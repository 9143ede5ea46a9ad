//! Cache Module
//!
//! Provides the generic entry store with TTL expiration and pluggable
//! eviction policies.

mod entry;
mod eviction;
mod stats;
mod status;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, Entry};
pub use eviction::{EvictableState, EvictionPolicy, Lifetime, NeverExpires, TtlPolicy, TtlState};
pub use stats::{CacheStats, StatsRecorder};
pub use store::{Cache, SWEEP_BATCH_SIZE};

pub(crate) use status::Status;
