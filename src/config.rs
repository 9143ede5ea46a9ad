//! Configuration Module
//!
//! Construction options for a cache instance.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{EvictionPolicy, TtlPolicy};
use crate::tasks::CentralCleaner;

/// Clean interval used when neither an interval nor a TTL is configured.
pub const DEFAULT_CLEAN_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Shortest tick a cleaner will run at.
pub const MIN_CLEAN_INTERVAL: Duration = Duration::from_millis(1);

// == Cleaner Mode ==
/// How expired entries are removed in the background.
#[derive(Debug, Clone, Default)]
pub enum CleanerMode {
    /// No background sweeps; expiry is only detected on `get`
    #[default]
    None,
    /// Swept by a shared scheduler alongside other caches
    Central(CentralCleaner),
    /// Swept by a task owned by this cache alone
    Local,
}

#[derive(Clone, Default)]
enum PolicyChoice {
    /// A [`TtlPolicy`] built from `time_to_live` and `revaluate`
    #[default]
    Ttl,
    Custom(Arc<dyn EvictionPolicy>),
    Disabled,
}

/// Cache construction options.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use ttl_cacher::{CacheConfig, CleanerMode};
///
/// // Expire keys 10 minutes after insertion, renew on every read,
/// // and sweep once an hour from a dedicated task.
/// let config = CacheConfig::new()
///     .with_time_to_live(Duration::from_secs(600))
///     .with_revaluation(true)
///     .with_clean_interval(Duration::from_secs(3600))
///     .with_cleaner_mode(CleanerMode::Local);
/// ```
#[derive(Clone, Default)]
pub struct CacheConfig {
    /// Default entry lifetime; zero means entries never expire
    pub time_to_live: Duration,
    /// Renew an entry's expiry on every successful `get`
    pub revaluate: bool,
    /// Sweep period; derived from the TTL when unset
    pub clean_interval: Option<Duration>,
    pub cleaner_mode: CleanerMode,
    policy: PolicyChoice,
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("time_to_live", &self.time_to_live)
            .field("revaluate", &self.revaluate)
            .field("clean_interval", &self.clean_interval)
            .field("cleaner_mode", &self.cleaner_mode)
            .field("policy", &self.eviction_policy())
            .finish()
    }
}

impl CacheConfig {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = ttl;
        self
    }

    pub fn with_revaluation(mut self, revaluate: bool) -> Self {
        self.revaluate = revaluate;
        self
    }

    /// Sets the sweep period. A zero interval is treated as unset.
    pub fn with_clean_interval(mut self, interval: Duration) -> Self {
        self.clean_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn with_cleaner_mode(mut self, mode: CleanerMode) -> Self {
        self.cleaner_mode = mode;
        self
    }

    /// Replaces the default TTL policy. `time_to_live` and `revaluate` are
    /// then ignored.
    pub fn with_eviction_policy(mut self, policy: Arc<dyn EvictionPolicy>) -> Self {
        self.policy = PolicyChoice::Custom(policy);
        self
    }

    /// Disables expiry entirely; no cleaner is started.
    pub fn without_eviction(mut self) -> Self {
        self.policy = PolicyChoice::Disabled;
        self
    }

    /// The policy this configuration resolves to, if any.
    pub fn eviction_policy(&self) -> Option<Arc<dyn EvictionPolicy>> {
        match &self.policy {
            PolicyChoice::Ttl => Some(Arc::new(TtlPolicy::new(self.time_to_live, self.revaluate))),
            PolicyChoice::Custom(policy) => Some(Arc::clone(policy)),
            PolicyChoice::Disabled => None,
        }
    }

    /// Resolves the sweep period: the explicit interval, else half the
    /// policy's TTL, else [`DEFAULT_CLEAN_INTERVAL`].
    pub fn resolved_clean_interval(&self, policy: Option<&dyn EvictionPolicy>) -> Duration {
        if let Some(interval) = self.clean_interval {
            return interval.max(MIN_CLEAN_INTERVAL);
        }
        policy
            .and_then(|p| p.time_to_live())
            .map(|ttl| (ttl / 2).max(MIN_CLEAN_INTERVAL))
            .unwrap_or(DEFAULT_CLEAN_INTERVAL)
    }
}
