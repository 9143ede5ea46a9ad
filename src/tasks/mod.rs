//! Background Tasks Module
//!
//! Cleaners that sweep expired cache entries on a timer.
//!
//! # Tasks
//! - Local cleaner: one task per cache instance
//! - Central cleaner: one shared task for many instances, ticking at the GCD
//!   of their intervals

mod central;
mod cleanup;
mod schedule;

pub use central::{CentralCleaner, RegistrationId};
pub use cleanup::{spawn_local_cleaner, CleanerHandle};
pub use schedule::{gcd, interval_gcd, Sweep, SweepReport};
