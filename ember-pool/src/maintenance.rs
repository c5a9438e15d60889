// Copyright 2026 Ember Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Background upkeep for [WarmPool]: the periodic refill and sweep
//! loops and the shutdown signal they listen on.

use std::cmp;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use ember_error::Result;
use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::pool::{WarmPool, REFILL_BATCH};
use crate::shard::Pooled;

/// Observer half of the shutdown signal. Maintenance loops stop after
/// their current cycle once the value turns `true` or the sender side
/// is dropped.
pub type ShutdownWatch = watch::Receiver<bool>;

impl<T: Send + 'static> WarmPool<T> {
    /// Start the refill and sweep loops as detached tasks on the
    /// current runtime.
    ///
    /// Takes effect once per pool: later calls log a warning and do
    /// nothing. Without a runtime to take the tasks this fails with
    /// `SubmitError` and leaves the pool un-started, so a later call
    /// may try again.
    pub fn spawn_maintenance(self: &Arc<Self>, shutdown: ShutdownWatch) -> Result<()> {
        if self.cron_started.swap(true, Ordering::SeqCst) {
            warn!("maintenance already running, ignoring respawn");
            return Ok(());
        }
        let pool = self.clone();
        let refill_shutdown = shutdown.clone();
        if let Err(e) = ember_tasks::submit(async move {
            pool.refill_loop(refill_shutdown).await;
        }) {
            self.cron_started.store(false, Ordering::SeqCst);
            return Err(e);
        }
        let pool = self.clone();
        if let Err(e) = ember_tasks::submit(async move {
            pool.sweep_loop(shutdown).await;
        }) {
            self.cron_started.store(false, Ordering::SeqCst);
            return Err(e);
        }
        debug!("maintenance loops started");
        Ok(())
    }

    async fn refill_loop(self: Arc<Self>, mut shutdown: ShutdownWatch) {
        if *shutdown.borrow() {
            return;
        }
        let period = self.options.refill_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::join!(self.refill_shard(0), self.refill_shard(1));
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("refill loop stopped");
                        return;
                    }
                }
            }
        }
    }

    async fn sweep_loop(self: Arc<Self>, mut shutdown: ShutdownWatch) {
        if *shutdown.borrow() {
            return;
        }
        let period = self.options.sweep_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::join!(self.sweep_shard(0), self.sweep_shard(1));
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("sweep loop stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Run one refill cycle on `shard`: when it sits below the capacity
    /// threshold and a dialer is registered, dial up to a batch of new
    /// connections concurrently and append the successes. Failed dials
    /// are skipped, a partial batch is fine. Returns the number added.
    pub async fn refill_shard(&self, shard: usize) -> usize {
        let dialer = match self.dialer.get() {
            Some(dialer) => dialer.clone(),
            None => return 0,
        };
        let target = &self.shards[shard];
        let _mx = target.lock_maintenance().await;
        let have = target.len();
        let capacity = self.options.shard_capacity;
        if have >= capacity {
            return 0;
        }
        let want = cmp::min(capacity - have, REFILL_BATCH);
        let fresh: Vec<Pooled<T>> = join_all((0..want).map(|_| dialer()))
            .await
            .into_iter()
            .filter_map(|dialed| match dialed {
                Ok(conn) => Some(Pooled::new(conn)),
                Err(e) => {
                    debug!("refill dial for shard {} failed: {}", shard, e);
                    None
                }
            })
            .collect();
        let added = fresh.len();
        if added > 0 {
            target.push_batch(fresh);
            if self.fill_log.ready() {
                info!("refilled shard {}: {} -> {}", shard, have, have + added);
            }
        }
        added
    }

    /// Run one sweep cycle on `shard`: retire every entry idle for
    /// longer than `max_idle` and drop it on the spot, which closes
    /// connection types that close on drop. A `max_idle` of `None`
    /// retires nothing. Returns the number retired.
    pub async fn sweep_shard(&self, shard: usize) -> usize {
        let target = &self.shards[shard];
        let _mx = target.lock_maintenance().await;
        let (evicted, kept) = target.evict_idle(self.options.max_idle);
        let retired = evicted.len();
        drop(evicted);
        if retired > 0 && self.sweep_log.ready() {
            info!("swept shard {}: {} retired, {} kept", shard, retired, kept);
        }
        retired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Dialer, PoolOptions};
    use ember_error::{Error, ErrorType::*};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::sleep;

    fn counting_dialer() -> (Dialer<usize>, Arc<AtomicUsize>) {
        let dials = Arc::new(AtomicUsize::new(0));
        let seen = dials.clone();
        let dialer: Dialer<usize> = Arc::new(move || {
            let seen = seen.clone();
            Box::pin(async move { Ok(seen.fetch_add(1, Ordering::SeqCst)) })
        });
        (dialer, dials)
    }

    fn seed(pool: &WarmPool<usize>, shard: usize, n: usize) {
        pool.put(shard, (0..n).map(Pooled::new).collect());
    }

    #[tokio::test]
    async fn test_refill_tops_up_below_capacity() {
        let pool = WarmPool::new(); // capacity 10
        seed(&pool, 0, 5);
        let (dialer, dials) = counting_dialer();
        pool.register_dialer(dialer);

        assert_eq!(pool.refill_shard(0).await, 3);
        assert_eq!(pool.len(0), 8);

        // the next cycles close the remaining gap, then go quiet
        assert_eq!(pool.refill_shard(0).await, 2);
        assert_eq!(pool.len(0), 10);
        assert_eq!(pool.refill_shard(0).await, 0);
        assert_eq!(dials.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_refill_noop_at_capacity() {
        let pool = WarmPool::new();
        seed(&pool, 1, 10);
        let (dialer, dials) = counting_dialer();
        pool.register_dialer(dialer);

        assert_eq!(pool.refill_shard(1).await, 0);
        assert_eq!(pool.len(1), 10);
        assert_eq!(dials.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refill_without_dialer_is_silent() {
        let pool: WarmPool<usize> = WarmPool::new();
        assert_eq!(pool.refill_shard(0).await, 0);
        assert_eq!(pool.len(0), 0);
    }

    #[tokio::test]
    async fn test_refill_keeps_partial_batch() {
        let pool: WarmPool<usize> = WarmPool::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        // every second dial fails; of attempts {0, 1, 2} only the even
        // ones land whatever order the batch resolves in
        pool.register_dialer(Arc::new(move || {
            let seen = seen.clone();
            Box::pin(async move {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                if n % 2 == 1 {
                    Error::e_explain(ConnectRefused, "every other dial fails")
                } else {
                    Ok(n)
                }
            })
        }));

        assert_eq!(pool.refill_shard(0).await, 2);
        assert_eq!(pool.len(0), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sweep_retires_only_stale_entries() {
        let pool = WarmPool::with_options(PoolOptions {
            max_idle: Some(Duration::from_millis(50)),
            ..PoolOptions::default()
        });
        seed(&pool, 0, 1);
        sleep(Duration::from_millis(80)).await;
        pool.put(0, (10..14).map(Pooled::new).collect());

        assert_eq!(pool.sweep_shard(0).await, 1);
        assert_eq!(pool.len(0), 4);

        // nothing else has aged out yet
        assert_eq!(pool.sweep_shard(0).await, 0);
    }

    #[tokio::test]
    async fn test_sweep_disabled_without_max_idle() {
        let pool = WarmPool::new(); // max_idle None
        seed(&pool, 0, 3);
        sleep(Duration::from_millis(30)).await;
        assert_eq!(pool.sweep_shard(0).await, 0);
        assert_eq!(pool.len(0), 3);
    }

    /// Connection stand-in that counts its drops, standing for close.
    struct Tracked(Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_sweep_closes_retired_connections() {
        let pool = WarmPool::with_options(PoolOptions {
            max_idle: Some(Duration::from_millis(30)),
            ..PoolOptions::default()
        });
        let closed = Arc::new(AtomicUsize::new(0));
        pool.release(Tracked(closed.clone()));
        pool.release(Tracked(closed.clone()));
        sleep(Duration::from_millis(60)).await;

        assert_eq!(pool.sweep_shard(0).await, 2);
        assert_eq!(closed.load(Ordering::SeqCst), 2);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_maintenance_warms_then_stops_on_shutdown() {
        let pool = Arc::new(WarmPool::with_options(PoolOptions {
            shard_capacity: 4,
            refill_interval: Duration::from_millis(20),
            sweep_interval: Duration::from_secs(3600),
            ..PoolOptions::default()
        }));
        let (dialer, _) = counting_dialer();
        pool.register_dialer(dialer);
        let (tx, rx) = watch::channel(false);
        pool.spawn_maintenance(rx).unwrap();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(pool.len(0), 4);
        assert_eq!(pool.len(1), 4);

        tx.send(true).unwrap();
        sleep(Duration::from_millis(60)).await;
        pool.take(0, usize::MAX);
        pool.take(1, usize::MAX);
        sleep(Duration::from_millis(100)).await;
        assert!(pool.is_empty(), "refill kept running after shutdown");
    }

    #[tokio::test]
    async fn test_maintenance_stops_when_sender_drops() {
        let pool = Arc::new(WarmPool::with_options(PoolOptions {
            shard_capacity: 2,
            refill_interval: Duration::from_millis(20),
            sweep_interval: Duration::from_secs(3600),
            ..PoolOptions::default()
        }));
        let (dialer, _) = counting_dialer();
        pool.register_dialer(dialer);
        let (tx, rx) = watch::channel(false);
        pool.spawn_maintenance(rx).unwrap();
        drop(tx);

        sleep(Duration::from_millis(100)).await;
        pool.take(0, usize::MAX);
        pool.take(1, usize::MAX);
        sleep(Duration::from_millis(100)).await;
        assert!(pool.is_empty(), "refill kept running after sender drop");
    }

    #[tokio::test]
    async fn test_spawn_maintenance_only_once() {
        let pool: Arc<WarmPool<usize>> = Arc::new(WarmPool::new());
        let (_tx, rx) = watch::channel(false);
        assert!(pool.spawn_maintenance(rx.clone()).is_ok());
        // the respawn is ignored, not an error
        assert!(pool.spawn_maintenance(rx).is_ok());
    }

    #[test]
    fn test_spawn_maintenance_needs_runtime() {
        let pool: Arc<WarmPool<usize>> = Arc::new(WarmPool::new());
        let (_tx, rx) = watch::channel(false);
        let e = pool.spawn_maintenance(rx.clone()).unwrap_err();
        assert_eq!(e.etype(), &SubmitError);
        // the failed attempt did not burn the once-flag
        let e = pool.spawn_maintenance(rx).unwrap_err();
        assert_eq!(e.etype(), &SubmitError);
    }
}
