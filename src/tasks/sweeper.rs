//! Expiration Sweeper Task
//!
//! Background task that advances the bucket ring on every tick and removes
//! every entry in the buckets that are due.

use std::hash::Hash;
use std::sync::Weak;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::cache::CacheStore;
use crate::config::SweepSchedule;
use crate::error::{CacheError, Result};

// == Sweeper Handle ==
/// Owner side of a running sweep task.
///
/// The task stops when [`SweeperHandle::shutdown`] is awaited, when the
/// handle is aborted, or on its own once the cache it serves is dropped.
#[derive(Debug)]
pub(crate) struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the task to stop and waits for it to finish.
    pub(crate) async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| CacheError::SweeperFailed(e.to_string()))
    }

    /// Signals the task and aborts it without waiting.
    pub(crate) fn abort(self) {
        let _ = self.shutdown.send(true);
        self.task.abort();
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns the expiration sweeper on `runtime`.
///
/// Every `schedule.period` the task walks `schedule.buckets_per_tick`
/// buckets starting at the ring cursor. If the newest deadline in a bucket
/// is still ahead, it releases the lock and sleeps until then, so no entry
/// is removed before its deadline. It then expires the whole bucket and
/// advances the cursor.
///
/// The task only holds a `Weak` reference to the store and exits as soon as
/// the store is gone.
pub(crate) fn spawn_sweep_task<K, V>(
    runtime: &Handle,
    store: Weak<Mutex<CacheStore<K, V>>>,
    schedule: SweepSchedule,
) -> SweeperHandle
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = runtime.spawn(run_sweeper(store, schedule, shutdown_rx));
    SweeperHandle { shutdown, task }
}

async fn run_sweeper<K, V>(
    store: Weak<Mutex<CacheStore<K, V>>>,
    schedule: SweepSchedule,
    mut shutdown: watch::Receiver<bool>,
) where
    K: Eq + Hash + Clone,
{
    let SweepSchedule {
        period,
        buckets_per_tick,
    } = schedule;
    let now = Instant::now();
    let mut ticker = interval_at(now.checked_add(period).unwrap_or(now), period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(?period, buckets_per_tick, "Starting expiration sweeper");

    'sweep: loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        for _ in 0..buckets_per_tick {
            let Some((bucket, wait)) = with_store(&store, |s| s.next_sweep()) else {
                break 'sweep;
            };

            // Lock is released while waiting for the bucket's newest deadline
            if let Some(wait) = wait {
                tokio::select! {
                    _ = shutdown.changed() => break 'sweep,
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            let Some(removed) = with_store(&store, |s| s.expire_bucket(bucket)) else {
                break 'sweep;
            };

            if removed > 0 {
                debug!(bucket, removed, "Expiration sweep removed entries");
            } else {
                trace!(bucket, "Expiration sweep found no entries");
            }
        }
    }

    info!("Expiration sweeper stopped");
}

/// Runs `f` under the store lock, or returns None if the store is gone.
fn with_store<K, V, T>(
    store: &Weak<Mutex<CacheStore<K, V>>>,
    f: impl FnOnce(&mut CacheStore<K, V>) -> T,
) -> Option<T> {
    let store = store.upgrade()?;
    let mut guard = store.lock();
    Some(f(&mut guard))
}
