//! TTL Cacher - a generic in-process cache
//!
//! Provides time-based expiry with optional renewal on access
//! ("revaluation"), pluggable eviction policies, and background cleaners
//! that run either per cache or through one shared scheduler.
//!
//! ```rust
//! use std::time::Duration;
//! use ttl_cacher::{Cache, CacheConfig};
//!
//! let cache: Cache<String, u32> = Cache::new(
//!     CacheConfig::new().with_time_to_live(Duration::from_secs(30)),
//! )
//! .unwrap();
//!
//! cache.set("answer".to_string(), 42).unwrap();
//! assert_eq!(cache.get("answer").unwrap(), Some(42));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod tasks;

pub use cache::{Cache, CacheStats, EvictableState, EvictionPolicy, Lifetime, TtlPolicy};
pub use config::{CacheConfig, CleanerMode};
pub use error::{CacheError, Result};
pub use keys::{Duplet, PolyKeyer};
pub use tasks::{CentralCleaner, CleanerHandle, Sweep, SweepReport};
