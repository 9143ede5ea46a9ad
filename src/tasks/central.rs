//! Central Cleaner
//!
//! One shared background task sweeping every registered target. Its tick is
//! the GCD of all registrants' intervals, so each target is swept at least as
//! often as it asked for while only a single task runs.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MIN_CLEAN_INTERVAL;
use crate::error::{CacheError, Result};
use crate::tasks::schedule::interval_gcd;
use crate::tasks::Sweep;

// == Registration ==
/// Identifies one registration with a [`CentralCleaner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

struct Registrant {
    id: RegistrationId,
    target: Weak<dyn Sweep>,
    interval: Duration,
}

#[derive(Default)]
struct Registry {
    registrants: Vec<Registrant>,
    interval: Duration,
    next_id: u64,
    task: Option<JoinHandle<()>>,
    stopped: bool,
}

impl Registry {
    /// The shared tick is taken at millisecond resolution, so it never drops
    /// below [`MIN_CLEAN_INTERVAL`] while anything is registered.
    fn recompute_interval(&mut self) {
        self.interval = interval_gcd(self.registrants.iter().map(|r| whole_millis(r.interval)));
    }

    fn task_alive(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn snapshot(&self) -> (Vec<(RegistrationId, Weak<dyn Sweep>)>, Duration) {
        let targets = self
            .registrants
            .iter()
            .map(|r| (r.id, Weak::clone(&r.target)))
            .collect();
        (targets, self.interval)
    }
}

struct Inner {
    registry: RwLock<Registry>,
    shutdown_tx: watch::Sender<bool>,
    /// Wakes an idle loop when a registration arrives
    wake: Arc<Notify>,
}

// == Central Cleaner ==
/// Shared sweep scheduler for many cache instances.
///
/// Construct one and hand clones of it to every cache that should be swept
/// by it. The background task is spawned lazily on the first registration and
/// stops on [`shutdown`](Self::shutdown) or once every handle is dropped.
#[derive(Clone)]
pub struct CentralCleaner {
    inner: Arc<Inner>,
}

impl Default for CentralCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CentralCleaner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.read();
        f.debug_struct("CentralCleaner")
            .field("registrants", &registry.registrants.len())
            .field("interval", &registry.interval)
            .field("running", &registry.task_alive())
            .field("stopped", &registry.stopped)
            .finish()
    }
}

impl CentralCleaner {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(Registry::default()),
                shutdown_tx,
                wake: Arc::new(Notify::new()),
            }),
        }
    }

    // == Register ==
    /// Adds `target` to the sweep rotation and recomputes the shared tick.
    ///
    /// Only a weak reference is kept; a dropped target is pruned on the next
    /// tick. The first registration spawns the shared task; later ones never
    /// spawn another while it is alive. If the runtime that ran it has shut
    /// down, the task is spawned again on the current one. A new tick takes
    /// effect after the current sleep ends.
    ///
    /// # Errors
    /// [`CacheError::CleanerStopped`] after [`shutdown`](Self::shutdown), and
    /// [`CacheError::NoRuntime`] if the task must be spawned outside a Tokio
    /// runtime.
    pub fn register<T>(&self, target: &Arc<T>, interval: Duration) -> Result<RegistrationId>
    where
        T: Sweep + 'static,
    {
        let mut registry = self.inner.registry.write();
        if registry.stopped {
            return Err(CacheError::CleanerStopped);
        }

        if !registry.task_alive() {
            let runtime =
                tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
            if registry.task.is_some() {
                warn!("Central cleaner task ended with its runtime, respawning");
            }
            registry.task = Some(runtime.spawn(run(
                Arc::downgrade(&self.inner),
                Arc::clone(&self.inner.wake),
                self.inner.shutdown_tx.subscribe(),
            )));
        }

        let id = RegistrationId(registry.next_id);
        registry.next_id += 1;

        let target: Weak<T> = Arc::downgrade(target);
        registry.registrants.push(Registrant {
            id,
            target,
            interval,
        });
        registry.recompute_interval();
        debug!(
            ?id,
            ?interval,
            shared_interval = ?registry.interval,
            "Registered with central cleaner"
        );
        drop(registry);

        self.inner.wake.notify_one();
        Ok(id)
    }

    // == Deregister ==
    /// Removes a registration. Returns whether it was present.
    pub fn deregister(&self, id: RegistrationId) -> bool {
        let mut registry = self.inner.registry.write();
        let before = registry.registrants.len();
        registry.registrants.retain(|r| r.id != id);
        let removed = registry.registrants.len() != before;
        if removed {
            registry.recompute_interval();
            debug!(?id, shared_interval = ?registry.interval, "Deregistered from central cleaner");
        }
        removed
    }

    // == Shutdown ==
    /// Stops the shared task and rejects further registrations.
    ///
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        let mut registry = self.inner.registry.write();
        if registry.stopped {
            return;
        }
        registry.stopped = true;
        registry.registrants.clear();
        registry.interval = Duration::ZERO;
        drop(registry);

        let _ = self.inner.shutdown_tx.send(true);
        info!("Central cleaner shut down");
    }

    /// Current shared tick; zero when nothing is registered.
    pub fn interval(&self) -> Duration {
        self.inner.registry.read().interval
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.inner.registry.read().registrants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the shared task is alive and not shut down.
    pub fn is_running(&self) -> bool {
        let registry = self.inner.registry.read();
        registry.task_alive() && !registry.stopped
    }

    fn prune(&self, dead: &[RegistrationId]) {
        let mut registry = self.inner.registry.write();
        registry.registrants.retain(|r| !dead.contains(&r.id));
        registry.recompute_interval();
        debug!(pruned = dead.len(), "Central cleaner pruned dropped targets");
    }
}

fn whole_millis(interval: Duration) -> Duration {
    Duration::from_millis(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX))
        .max(MIN_CLEAN_INTERVAL)
}

/// The shared loop: sweep every registrant, then sleep for the shared tick.
async fn run(inner: Weak<Inner>, wake: Arc<Notify>, mut shutdown_rx: watch::Receiver<bool>) {
    info!("Starting central cleaner");

    loop {
        let Some(strong) = inner.upgrade() else {
            break;
        };
        let cleaner = CentralCleaner { inner: strong };

        let (targets, interval) = cleaner.inner.registry.read().snapshot();

        let mut dead = Vec::new();
        let mut removed = 0;
        for (id, target) in targets {
            match target.upgrade() {
                Some(target) => removed += target.sweep_expired().removed,
                None => dead.push(id),
            }
        }
        if !dead.is_empty() {
            cleaner.prune(&dead);
        }
        if removed > 0 {
            info!("Central cleaner: removed {} expired entries", removed);
        }
        drop(cleaner);

        let idle = interval.is_zero();
        tokio::select! {
            _ = tokio::time::sleep(interval), if !idle => {}
            _ = wake.notified(), if idle => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Central cleaner stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::SweepReport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTarget {
        sweeps: AtomicUsize,
    }

    impl Sweep for CountingTarget {
        fn sweep_expired(&self) -> SweepReport {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            SweepReport::default()
        }
    }

    impl CountingTarget {
        fn sweeps(&self) -> usize {
            self.sweeps.load(Ordering::SeqCst)
        }
    }

    fn target() -> Arc<CountingTarget> {
        Arc::new(CountingTarget::default())
    }

    #[tokio::test]
    async fn test_interval_is_gcd_of_registrants() {
        let cleaner = CentralCleaner::new();
        let (a, b) = (target(), target());

        cleaner.register(&a, Duration::from_secs(6)).unwrap();
        cleaner.register(&b, Duration::from_secs(4)).unwrap();

        assert_eq!(cleaner.interval(), Duration::from_secs(2));
        assert_eq!(cleaner.len(), 2);
        cleaner.shutdown();
    }

    #[tokio::test]
    async fn test_single_registrant_interval() {
        let cleaner = CentralCleaner::new();
        let a = target();

        cleaner.register(&a, Duration::from_secs(5)).unwrap();

        assert_eq!(cleaner.interval(), Duration::from_secs(5));
        cleaner.shutdown();
    }

    #[test]
    fn test_no_registrants_is_idle() {
        let cleaner = CentralCleaner::new();

        assert_eq!(cleaner.interval(), Duration::ZERO);
        assert!(cleaner.is_empty());
        assert!(!cleaner.is_running());
    }

    #[tokio::test]
    async fn test_deregister_recomputes_interval() {
        let cleaner = CentralCleaner::new();
        let (a, b) = (target(), target());

        let id_a = cleaner.register(&a, Duration::from_secs(6)).unwrap();
        let id_b = cleaner.register(&b, Duration::from_secs(4)).unwrap();

        assert!(cleaner.deregister(id_b));
        assert_eq!(cleaner.interval(), Duration::from_secs(6));
        assert!(!cleaner.deregister(id_b));

        assert!(cleaner.deregister(id_a));
        assert_eq!(cleaner.interval(), Duration::ZERO);
        cleaner.shutdown();
    }

    #[tokio::test]
    async fn test_single_loop_sweeps_every_registrant() {
        let cleaner = CentralCleaner::new();
        let (a, b) = (target(), target());

        cleaner.register(&a, Duration::from_millis(40)).unwrap();
        cleaner.register(&b, Duration::from_millis(60)).unwrap();
        assert!(cleaner.is_running());

        tokio::time::sleep(Duration::from_millis(150)).await;

        // Shared tick is 20ms, so both are swept far more often than asked
        assert!(a.sweeps() >= 3, "a swept {} times", a.sweeps());
        assert!(b.sweeps() >= 3, "b swept {} times", b.sweeps());
        cleaner.shutdown();
    }

    #[tokio::test]
    async fn test_dropped_target_is_pruned() {
        let cleaner = CentralCleaner::new();
        let (a, b) = (target(), target());

        cleaner.register(&a, Duration::from_millis(20)).unwrap();
        cleaner.register(&b, Duration::from_millis(30)).unwrap();
        drop(a);

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cleaner.len(), 1);
        assert_eq!(cleaner.interval(), Duration::from_millis(30));
        cleaner.shutdown();
    }

    #[tokio::test]
    async fn test_idle_loop_wakes_on_registration() {
        let cleaner = CentralCleaner::new();
        let (a, b) = (target(), target());

        let id = cleaner.register(&a, Duration::from_millis(20)).unwrap();
        cleaner.deregister(id);
        tokio::time::sleep(Duration::from_millis(50)).await;

        cleaner.register(&b, Duration::from_millis(20)).unwrap();
        tokio::time::sleep(Duration::from_millis(70)).await;

        assert!(b.sweeps() >= 2, "b swept {} times", b.sweeps());
        cleaner.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_sweeping_and_rejects_registration() {
        let cleaner = CentralCleaner::new();
        let a = target();

        cleaner.register(&a, Duration::from_millis(20)).unwrap();
        cleaner.shutdown();
        cleaner.shutdown();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let sweeps = a.sweeps();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(a.sweeps(), sweeps);

        assert!(!cleaner.is_running());
        let result = cleaner.register(&a, Duration::from_millis(20));
        assert_eq!(result, Err(CacheError::CleanerStopped));
    }

    #[tokio::test]
    async fn test_tick_is_floored_at_millisecond_resolution() {
        let cleaner = CentralCleaner::new();
        let (a, b, c) = (target(), target(), target());

        cleaner.register(&a, Duration::from_secs(5)).unwrap();
        cleaner
            .register(&b, Duration::from_micros(5_000_500))
            .unwrap();
        assert_eq!(cleaner.interval(), Duration::from_secs(5));

        cleaner.register(&c, Duration::from_micros(300)).unwrap();
        assert_eq!(cleaner.interval(), MIN_CLEAN_INTERVAL);
        cleaner.shutdown();
    }

    #[test]
    fn test_respawns_after_runtime_shutdown() {
        let cleaner = CentralCleaner::new();
        let (a, b) = (target(), target());

        let first = tokio::runtime::Runtime::new().unwrap();
        {
            let _guard = first.enter();
            cleaner.register(&a, Duration::from_millis(10)).unwrap();
        }
        drop(first);
        assert!(!cleaner.is_running());

        let second = tokio::runtime::Runtime::new().unwrap();
        second.block_on(async {
            cleaner.register(&b, Duration::from_millis(10)).unwrap();
            assert!(cleaner.is_running());
            tokio::time::sleep(Duration::from_millis(60)).await;
        });

        assert!(b.sweeps() >= 2, "b swept {} times", b.sweeps());
        cleaner.shutdown();
    }

    #[test]
    fn test_register_requires_runtime() {
        let cleaner = CentralCleaner::new();
        let a = target();

        let result = cleaner.register(&a, Duration::from_secs(1));
        assert_eq!(result, Err(CacheError::NoRuntime));
        assert!(cleaner.is_empty());
    }
}
