//! Delayed revival of dead monsters and characters.
//!
//! Every pending respawn is its own task on the runtime, so timers never wait
//! on each other or on combat. Timers are grouped by map and can only be
//! cancelled by unloading that map.

use log::{debug, info};
use parking_lot::Mutex;
use shared::{now_millis, MapId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::sleep;

pub struct RespawnScheduler {
    runtime: Handle,
    pending: Mutex<HashMap<MapId, Vec<AbortHandle>>>,
}

impl RespawnScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `revive` once the wall clock reaches `respawn_at` (unix
    /// milliseconds). Past timestamps fire immediately.
    pub fn schedule<F>(&self, map_id: MapId, respawn_at: u64, revive: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = Duration::from_millis(respawn_at.saturating_sub(now_millis()));
        debug!(
            "Respawn on map {} scheduled in {}ms",
            map_id,
            delay.as_millis()
        );

        let task = self.runtime.spawn(async move {
            sleep(delay).await;
            revive();
        });

        let mut pending = self.pending.lock();
        let timers = pending.entry(map_id).or_default();
        timers.retain(|timer| !timer.is_finished());
        timers.push(task.abort_handle());
    }

    /// Aborts every timer of the map. Returns how many were still pending.
    pub fn cancel_map(&self, map_id: MapId) -> usize {
        let timers = self
            .pending
            .lock()
            .remove(&map_id)
            .unwrap_or_default();

        let mut cancelled = 0;
        for timer in timers {
            if !timer.is_finished() {
                timer.abort();
                cancelled += 1;
            }
        }
        info!("Cancelled {} respawn timers on map {}", cancelled, map_id);
        cancelled
    }

    pub fn pending(&self, map_id: MapId) -> usize {
        self.pending
            .lock()
            .get(&map_id)
            .map_or(0, |timers| {
                timers.iter().filter(|timer| !timer.is_finished()).count()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_timer_fires_after_delay() {
        let scheduler = RespawnScheduler::new(Handle::current());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        scheduler.schedule(1, now_millis() + 30, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(1), 0);
    }

    #[tokio::test]
    async fn test_past_timestamp_fires_immediately() {
        let scheduler = RespawnScheduler::new(Handle::current());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        scheduler.schedule(1, 0, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_map_only_affects_that_map() {
        let scheduler = RespawnScheduler::new(Handle::current());
        let fired = Arc::new(AtomicUsize::new(0));

        for map_id in [1, 1, 2] {
            let counter = Arc::clone(&fired);
            scheduler.schedule(map_id, now_millis() + 60, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(scheduler.pending(1), 2);

        assert_eq!(scheduler.cancel_map(1), 2);
        sleep(Duration::from_millis(200)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(1), 0);
    }

    #[tokio::test]
    async fn test_timers_run_independently() {
        let scheduler = RespawnScheduler::new(Handle::current());
        let order = Arc::new(Mutex::new(Vec::new()));

        for (tag, delay) in [(1_u32, 80_u64), (2, 10), (3, 40)] {
            let order = Arc::clone(&order);
            scheduler.schedule(1, now_millis() + delay, move || {
                order.lock().push(tag);
            });
        }

        sleep(Duration::from_millis(250)).await;
        assert_eq!(*order.lock(), vec![2, 3, 1]);
    }
}
