//! Local Cleaner Task
//!
//! A dedicated background task that sweeps one cache instance on a fixed tick.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::MIN_CLEAN_INTERVAL;
use crate::error::{CacheError, Result};
use crate::tasks::Sweep;

// == Cleaner Handle ==
/// Control handle for a spawned local cleaner.
///
/// Dropping the handle stops the cleaner as well.
#[derive(Debug)]
pub struct CleanerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CleanerHandle {
    /// Signals the cleaner to stop. Calling it again is a no-op.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Whether the cleaner task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the cleaner and waits for its task to exit.
    pub async fn stop(self) {
        self.shutdown();
        let _ = self.task.await;
    }
}

/// Spawns a background task that sweeps `target` every `interval`.
///
/// The task keeps only a weak reference to the target and exits on its own
/// once the target is dropped, or when the returned handle is shut down or
/// dropped. The first sweep happens one full interval after spawning.
///
/// # Errors
/// Returns [`CacheError::NoRuntime`] when called outside a Tokio runtime.
///
/// # Example
/// ```ignore
/// let handle = spawn_local_cleaner(&target, Duration::from_secs(30))?;
/// // Later, during shutdown:
/// handle.shutdown();
/// ```
pub fn spawn_local_cleaner<T>(target: &Arc<T>, interval: Duration) -> Result<CleanerHandle>
where
    T: Sweep + 'static,
{
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
    let interval = interval.max(MIN_CLEAN_INTERVAL);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = runtime.spawn(run(Arc::downgrade(target), interval, shutdown_rx));

    Ok(CleanerHandle { shutdown_tx, task })
}

async fn run<T>(target: Weak<T>, interval: Duration, mut shutdown_rx: watch::Receiver<bool>)
where
    T: Sweep + 'static,
{
    info!(?interval, "Starting local cleaner");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(strong) = target.upgrade() else {
                    debug!("Local cleaner target dropped");
                    break;
                };
                let report = strong.sweep_expired();
                drop(strong);

                if report.abandoned {
                    debug!(removed = report.removed, "Local cleaner: sweep abandoned");
                } else if report.removed > 0 {
                    info!("Local cleaner: removed {} expired entries", report.removed);
                } else {
                    debug!("Local cleaner: no expired entries found");
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Local cleaner stopped");
}
