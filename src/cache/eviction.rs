//! Eviction Policy Module
//!
//! A policy decides, per entry, whether it is stale. It hands every new entry
//! its own [`EvictableState`]; the store never touches that state directly and
//! only asks it whether the entry has expired.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::cache::entry::current_timestamp_ms;

// == Lifetime ==
/// Requested lifetime for a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Use the policy's configured TTL
    Default,
    /// Override the TTL for this entry only; a zero duration means `Default`
    Ttl(Duration),
    /// Never expires, whatever the policy's TTL
    Permanent,
}

// == Policy Traits ==
/// Staleness strategy shared read-only by every entry of one cache.
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
    /// Produces fresh state for a newly stored entry.
    fn new_state(&self, lifetime: Lifetime) -> Box<dyn EvictableState>;

    /// The policy's default TTL, if it has one.
    ///
    /// Used to derive a cleaner interval when none is configured.
    fn time_to_live(&self) -> Option<Duration> {
        None
    }
}

/// Per-entry state produced by an [`EvictionPolicy`].
pub trait EvictableState: Send + Sync + fmt::Debug {
    /// Reports whether the entry is expired.
    ///
    /// A `dry` check must never mutate the state. A live check (`dry == false`)
    /// may renew the entry.
    fn is_expired(&self, dry: bool) -> bool;
}

// == Permanent State ==
/// State for caches configured without an eviction policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverExpires;

impl EvictableState for NeverExpires {
    fn is_expired(&self, _dry: bool) -> bool {
        false
    }
}

// == TTL Policy ==
/// Default policy: fixed time-to-live, optionally renewed on access.
///
/// With `revaluate` enabled every live lookup pushes the entry's expiry to
/// `now + ttl`, so frequently read keys stay cached. A zero TTL means entries
/// stored with [`Lifetime::Default`] never expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    ttl: Duration,
    revaluate: bool,
}

impl TtlPolicy {
    pub fn new(ttl: Duration, revaluate: bool) -> Self {
        Self { ttl, revaluate }
    }

    pub fn revaluate(&self) -> bool {
        self.revaluate
    }

    /// Builds the concrete state for one entry.
    pub fn state(&self, lifetime: Lifetime) -> TtlState {
        let ttl = match lifetime {
            Lifetime::Ttl(ttl) if !ttl.is_zero() => ttl,
            _ => self.ttl,
        };
        let ttl_ms = duration_ms(ttl);
        let expiry = if lifetime == Lifetime::Permanent || ttl_ms == 0 {
            0
        } else {
            current_timestamp_ms().saturating_add(ttl_ms)
        };

        TtlState {
            expiry: AtomicI64::new(expiry),
            ttl_ms,
            revaluate: self.revaluate,
        }
    }
}

impl EvictionPolicy for TtlPolicy {
    fn new_state(&self, lifetime: Lifetime) -> Box<dyn EvictableState> {
        Box::new(self.state(lifetime))
    }

    fn time_to_live(&self) -> Option<Duration> {
        (!self.ttl.is_zero()).then_some(self.ttl)
    }
}

// == TTL State ==
/// Expiry state of one entry under a [`TtlPolicy`].
///
/// The expiry is atomic so a live check can renew it while the store only
/// holds its read lock.
#[derive(Debug)]
pub struct TtlState {
    /// Unix milliseconds; 0 = permanent
    expiry: AtomicI64,
    ttl_ms: i64,
    revaluate: bool,
}

impl TtlState {
    /// Current expiry in Unix milliseconds, `0` when permanent.
    pub fn expires_at_ms(&self) -> i64 {
        self.expiry.load(Ordering::Acquire)
    }
}

impl EvictableState for TtlState {
    fn is_expired(&self, dry: bool) -> bool {
        let expiry = self.expiry.load(Ordering::Acquire);
        if expiry == 0 {
            return false;
        }

        let now = current_timestamp_ms();
        if expiry <= now {
            return true;
        }
        if dry || !self.revaluate {
            return false;
        }

        // Only move expiry forward; a racing renewal may already have.
        self.expiry
            .fetch_max(now.saturating_add(self.ttl_ms), Ordering::AcqRel);
        false
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
