//! Sweep scheduling utilities
//!
//! The capability every cleaner drives, plus the GCD arithmetic the central
//! cleaner uses to fold many intervals into one tick.

use std::time::Duration;

// == Sweep Target ==
/// Something a cleaner can sweep on a timer.
pub trait Sweep: Send + Sync {
    /// Removes every currently stale entry. Must not renew anything.
    fn sweep_expired(&self) -> SweepReport;
}

// == Sweep Report ==
/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries removed during the pass
    pub removed: usize,
    /// The pass stopped early because the target was reset or closed
    pub abandoned: bool,
}

// == GCD ==
/// Greatest common divisor of two durations, at nanosecond precision.
///
/// `gcd(a, 0) == a`, so a zero interval never shortens the tick.
pub fn gcd(a: Duration, b: Duration) -> Duration {
    let (mut a, mut b) = (a.as_nanos(), b.as_nanos());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    Duration::from_nanos(u64::try_from(a).unwrap_or(u64::MAX))
}

/// Folds intervals into their GCD. Returns zero for an empty set.
pub fn interval_gcd<I>(intervals: I) -> Duration
where
    I: IntoIterator<Item = Duration>,
{
    intervals.into_iter().fold(Duration::ZERO, gcd)
}
