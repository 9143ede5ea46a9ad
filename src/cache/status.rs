//! Lifecycle status of a cache instance.
//!
//! Transitions: `Idle -> Resetting -> Idle` around a reset, and
//! `Idle | Resetting -> Deleted` on close. `Deleted` is terminal. The status
//! lives under the same lock as the entry map.

/// Lifecycle state checked by sweeps and public operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    /// A reset swapped the map out and is releasing old entries
    Resetting,
    /// Closed; every further operation fails
    Deleted,
}

impl Status {
    /// Whether an in-flight sweep may keep going.
    pub fn allows_sweep(self) -> bool {
        self == Status::Idle
    }

    pub fn is_deleted(self) -> bool {
        self == Status::Deleted
    }
}
