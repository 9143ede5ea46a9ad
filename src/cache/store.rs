//! Cache Store Module
//!
//! The cache instance: a `HashMap` of entries behind one read/write lock,
//! expiry decided by the configured eviction policy, and an optional
//! background cleaner driving the sweep.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

use crate::cache::{
    CacheStats, Entry, EvictableState, EvictionPolicy, Lifetime, NeverExpires, Status,
    StatsRecorder,
};
use crate::config::{CacheConfig, CleanerMode};
use crate::error::{CacheError, Result};
use crate::tasks::{
    spawn_local_cleaner, CentralCleaner, CleanerHandle, RegistrationId, Sweep, SweepReport,
};

/// Number of keys a sweep checks per write-lock acquisition.
pub const SWEEP_BATCH_SIZE: usize = 256;

struct State<K, V> {
    entries: HashMap<K, Entry<V>>,
    status: Status,
    /// Bumped by every reset; a sweep working from an older key snapshot stops
    generation: u64,
}

enum CleanerBinding {
    Local(CleanerHandle),
    Central {
        cleaner: CentralCleaner,
        id: RegistrationId,
    },
}

impl CleanerBinding {
    fn release(self) {
        match self {
            CleanerBinding::Local(handle) => handle.shutdown(),
            CleanerBinding::Central { cleaner, id } => {
                cleaner.deregister(id);
            }
        }
    }
}

struct Shared<K, V> {
    state: RwLock<State<K, V>>,
    policy: Option<Arc<dyn EvictionPolicy>>,
    clean_interval: Duration,
    cleaner: Mutex<Option<CleanerBinding>>,
    stats: StatsRecorder,
}

impl<K, V> Shared<K, V> {
    fn new_state(&self, lifetime: Lifetime) -> Box<dyn EvictableState> {
        match &self.policy {
            Some(policy) => policy.new_state(lifetime),
            None => Box::new(NeverExpires),
        }
    }

    fn release_cleaner(&self) {
        if let Some(binding) = self.cleaner.lock().take() {
            binding.release();
        }
    }
}

impl<K, V> Drop for Shared<K, V> {
    fn drop(&mut self) {
        if let Some(binding) = self.cleaner.get_mut().take() {
            binding.release();
        }
    }
}

impl<K, V> Sweep for Shared<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Removes every entry whose state reports expired under a dry check.
    ///
    /// Keys are snapshotted under the read lock, then checked in batches
    /// under the write lock. The lock is handed over fairly after each batch,
    /// so a waiting writer runs before the next batch instead of waiting for
    /// the whole pass. The pass is abandoned once the instance has been reset
    /// since the snapshot, or closed; whatever is left waits for the next
    /// sweep.
    fn sweep_expired(&self) -> SweepReport {
        let (keys, generation): (Vec<K>, u64) = {
            let state = self.state.read();
            if !state.status.allows_sweep() {
                self.stats.record_sweep(0, true);
                return SweepReport {
                    removed: 0,
                    abandoned: true,
                };
            }
            (state.entries.keys().cloned().collect(), state.generation)
        };

        let mut removed = 0;
        let mut abandoned = false;
        for batch in keys.chunks(SWEEP_BATCH_SIZE) {
            let mut state = self.state.write();
            if !state.status.allows_sweep() || state.generation != generation {
                abandoned = true;
                break;
            }
            for key in batch {
                let expired = state.entries.get(key).is_some_and(|e| e.is_expired(true));
                if expired {
                    state.entries.remove(key);
                    removed += 1;
                }
            }
            RwLockWriteGuard::unlock_fair(state);
        }

        self.stats.record_sweep(removed, abandoned);
        SweepReport { removed, abandoned }
    }
}

// == Cache ==
/// Generic in-process cache with time-based expiry.
///
/// Cloning a `Cache` creates another handle to the same entries. When the
/// last handle is dropped the background cleaner, if any, is stopped.
///
/// Lookups of missing or expired keys return `None`; operations only fail
/// once the cache has been [`close`](Self::close)d.
pub struct Cache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

// Debug stays usable after close so a closed cache can still be logged.
impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("Cache")
            .field("entries", &state.entries.len())
            .field("status", &state.status)
            .field("clean_interval", &self.shared.clean_interval)
            .field("policy", &self.shared.policy)
            .finish()
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache and attaches its cleaner.
    ///
    /// A cleaner is only attached when an eviction policy is configured.
    /// `CleanerMode::Local` spawns a dedicated task; `CleanerMode::Central`
    /// registers with the given scheduler.
    ///
    /// # Errors
    /// [`CacheError::NoRuntime`] if a cleaner must be spawned outside a Tokio
    /// runtime, [`CacheError::CleanerStopped`] if the central cleaner was
    /// shut down.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let policy = config.eviction_policy();
        let clean_interval = config.resolved_clean_interval(policy.as_deref());
        let sweeps = policy.is_some();

        let shared = Arc::new(Shared {
            state: RwLock::new(State {
                entries: HashMap::new(),
                status: Status::Idle,
                generation: 0,
            }),
            policy,
            clean_interval,
            cleaner: Mutex::new(None),
            stats: StatsRecorder::new(),
        });

        if sweeps {
            let binding = match &config.cleaner_mode {
                CleanerMode::None => None,
                CleanerMode::Local => Some(CleanerBinding::Local(spawn_local_cleaner(
                    &shared,
                    clean_interval,
                )?)),
                CleanerMode::Central(cleaner) => Some(CleanerBinding::Central {
                    id: cleaner.register(&shared, clean_interval)?,
                    cleaner: cleaner.clone(),
                }),
            };
            *shared.cleaner.lock() = binding;
        }

        debug!(?config, ?clean_interval, "Cache created");
        Ok(Self { shared })
    }

    fn read_open(&self) -> Result<RwLockReadGuard<'_, State<K, V>>> {
        let state = self.shared.state.read();
        if state.status.is_deleted() {
            return Err(CacheError::Closed);
        }
        Ok(state)
    }

    fn write_open(&self) -> Result<RwLockWriteGuard<'_, State<K, V>>> {
        let state = self.shared.state.write();
        if state.status.is_deleted() {
            return Err(CacheError::Closed);
        }
        Ok(state)
    }

    fn insert(&self, key: K, value: V, lifetime: Lifetime) -> Result<()> {
        let entry = Entry::new(value, self.shared.new_state(lifetime));
        let previous = self.write_open()?.entries.insert(key, entry);
        drop(previous);
        Ok(())
    }

    // == Set ==
    /// Stores a value with the cache's default TTL, replacing any existing
    /// entry for the key.
    pub fn set(&self, key: K, value: V) -> Result<()> {
        self.insert(key, value, Lifetime::Default)
    }

    /// Stores a value that expires after `ttl` instead of the default TTL.
    ///
    /// A zero `ttl` behaves like [`set`](Self::set).
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<()> {
        self.insert(key, value, Lifetime::Ttl(ttl))
    }

    /// Stores a value that never expires.
    pub fn set_permanent(&self, key: K, value: V) -> Result<()> {
        self.insert(key, value, Lifetime::Permanent)
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// Expired entries are removed and reported as `None`. With revaluation
    /// enabled, a hit renews the entry's expiry.
    pub fn get<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        {
            let state = self.read_open()?;
            match state.entries.get(key) {
                None => {
                    self.shared.stats.record_miss();
                    return Ok(None);
                }
                Some(entry) if !entry.is_expired(false) => {
                    self.shared.stats.record_hit();
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired on access. Re-check under the write lock so an entry
        // stored in between is left alone.
        let removed = {
            let mut state = self.write_open()?;
            let expired = state.entries.get(key).is_some_and(|e| e.is_expired(true));
            if expired {
                state.entries.remove(key)
            } else {
                None
            }
        };
        if removed.is_some() {
            trace!("Removed entry expired on access");
        }

        self.shared.stats.record_expired_on_access();
        Ok(None)
    }

    // == Get All ==
    /// Returns every stored value.
    ///
    /// This is a raw snapshot: entries that expired but were not swept yet
    /// are included, and nothing is renewed.
    pub fn get_all(&self) -> Result<Vec<V>> {
        let state = self.read_open()?;
        Ok(state.entries.values().map(|e| e.value.clone()).collect())
    }

    /// Returns the stored values matching `predicate`, with the same
    /// snapshot semantics as [`get_all`](Self::get_all).
    pub fn get_some<F>(&self, mut predicate: F) -> Result<Vec<V>>
    where
        F: FnMut(&V) -> bool,
    {
        let state = self.read_open()?;
        Ok(state
            .entries
            .values()
            .filter(|e| predicate(&e.value))
            .map(|e| e.value.clone())
            .collect())
    }

    // == Delete ==
    /// Removes a key. Returns whether it was present.
    pub fn delete<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.write_open()?.entries.remove(key);
        Ok(removed.is_some())
    }

    /// Removes every entry whose value matches `predicate`. Returns how many
    /// were removed.
    pub fn delete_some<F>(&self, mut predicate: F) -> Result<usize>
    where
        F: FnMut(&V) -> bool,
    {
        let mut state = self.write_open()?;
        let before = state.entries.len();
        state.entries.retain(|_, e| !predicate(&e.value));
        Ok(before - state.entries.len())
    }

    // == Reset ==
    /// Drops every entry at once.
    ///
    /// The map is swapped for an empty one under the write lock and the old
    /// entries are released afterwards. A sweep running meanwhile abandons
    /// its pass at the next batch.
    pub fn reset(&self) -> Result<()> {
        let old = {
            let mut state = self.write_open()?;
            state.status = Status::Resetting;
            state.generation = state.generation.wrapping_add(1);
            mem::take(&mut state.entries)
        };
        let dropped = old.len();
        drop(old);

        {
            let mut state = self.shared.state.write();
            if state.status == Status::Resetting {
                state.status = Status::Idle;
            }
        }

        self.shared.stats.record_reset();
        debug!(dropped, "Cache reset");
        Ok(())
    }

    // == Num Keys ==
    /// Returns the number of stored entries, expired-but-unswept included.
    pub fn num_keys(&self) -> Result<usize> {
        Ok(self.read_open()?.entries.len())
    }

    // == Cleanup Expired ==
    /// Runs one sweep now, independent of any background cleaner.
    pub fn cleanup_expired(&self) -> Result<SweepReport> {
        if self.is_closed() {
            return Err(CacheError::Closed);
        }
        Ok(self.shared.sweep_expired())
    }

    // == Close ==
    /// Closes the cache: drops all entries and stops or deregisters its
    /// cleaner. Every later operation fails with [`CacheError::Closed`].
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) {
        let old = {
            let mut state = self.shared.state.write();
            if state.status.is_deleted() {
                return;
            }
            state.status = Status::Deleted;
            mem::take(&mut state.entries)
        };
        drop(old);

        self.shared.release_cleaner();
        debug!("Cache closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.read().status.is_deleted()
    }

    /// The period background sweeps run at for this cache.
    ///
    /// Fixed at construction, so it stays readable after close.
    pub fn clean_interval(&self) -> Duration {
        self.shared.clean_interval
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> Result<CacheStats> {
        let total_entries = self.read_open()?.entries.len();
        Ok(self.shared.stats.snapshot(total_entries))
    }
}
