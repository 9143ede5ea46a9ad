//! Cache Entry Module
//!
//! Defines the stored entry: a value paired with the evictable state its
//! policy produced for it.

use crate::cache::EvictableState;

// == Cache Entry ==
/// A single stored value and its per-entry expiry state.
#[derive(Debug)]
pub struct Entry<V> {
    /// The stored value
    pub value: V,
    /// Staleness state owned by this entry alone
    pub evictable: Box<dyn EvictableState>,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Wraps a value with the given evictable state.
    pub fn new(value: V, evictable: Box<dyn EvictableState>) -> Self {
        Self { value, evictable }
    }

    // == Is Expired ==
    /// Delegates the staleness check to the entry's state.
    ///
    /// A `dry` check never renews the entry.
    pub fn is_expired(&self, dry: bool) -> bool {
        self.evictable.is_expired(dry)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
