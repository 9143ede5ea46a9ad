//! Error types for the cacher
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache instances, cleaners and key formatting.
///
/// Lookups never fail because of a missing or expired key; those are
/// reported as `None`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache instance was closed and no longer accepts operations
    #[error("Cache is closed")]
    Closed,

    /// A background cleaner was requested outside of a Tokio runtime
    #[error("Background cleaner requires a Tokio runtime")]
    NoRuntime,

    /// The central cleaner was shut down and rejects new registrations
    #[error("Central cleaner has been shut down")]
    CleanerStopped,

    /// A fixed-arity key builder received the wrong number of parts
    #[error("Key builder [{primary}] expects {expected} extra parts, got {got}")]
    KeyArity {
        primary: String,
        expected: usize,
        got: usize,
    },
}

// == Result Type Alias ==
/// Convenience Result type for the cacher.
pub type Result<T> = std::result::Result<T, CacheError>;
