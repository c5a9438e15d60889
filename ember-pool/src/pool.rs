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

//! The sharded warm pool and its caller-facing operations.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use ember_error::{Error, ErrorType::*, OkOrErr, Result};
use ember_tasks::{can_submit, submit};
use futures::future::BoxFuture;
use log::{debug, info};
use once_cell::sync::OnceCell;

use crate::shard::{Pooled, Shard};
use crate::throttle::LogThrottle;

/// Number of shards. Shard 0 is the routing target until it reaches the
/// capacity threshold, shard 1 takes the spill-over.
pub const SHARDS: usize = 2;

/// How many entries one acquisition pops from a shard at most (see the
/// split rule on [WarmPool::take]).
pub(crate) const ACQUIRE_BATCH: usize = 3;

/// How many connections one refill cycle dials per shard at most.
pub(crate) const REFILL_BATCH: usize = 3;

/// Factory the caller registers to create new connections. The pool
/// never looks inside: how a connection is made is entirely the
/// caller's business.
pub type Dialer<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Tunables for a [WarmPool].
#[derive(Clone, Debug)]
pub struct PoolOptions {
    /// Per-shard threshold steering release routing and refill. Not a
    /// hard ceiling: [WarmPool::put] never rejects.
    pub shard_capacity: usize,
    /// Cadence of the background refill loop.
    pub refill_interval: Duration,
    /// Cadence of the background sweep loop.
    pub sweep_interval: Duration,
    /// Entries idle for longer than this are retired by the sweep.
    /// `None` disables age-based retirement.
    pub max_idle: Option<Duration>,
    /// Periodic diagnostics emit once per `log_every + 1` occasions.
    pub log_every: u32,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            shard_capacity: 10,
            refill_interval: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(3),
            max_idle: None,
            log_every: 7,
        }
    }
}

/// A two-shard pool of pre-established connections.
///
/// Callers [acquire](WarmPool::acquire) a warm connection through a
/// fast path that never waits on a contended shard and falls back to
/// dialing fresh; [release](WarmPool::release) parks connections for
/// later; [spawn_maintenance](WarmPool::spawn_maintenance) keeps the
/// shards topped up and swept in the background.
///
/// The pool is generic over the connection type and holds no opinion on
/// what a connection is. Retired entries are simply dropped, which for
/// socket-like types is what closes them.
pub struct WarmPool<T> {
    pub(crate) shards: [Arc<Shard<T>>; SHARDS],
    pub(crate) dialer: OnceCell<Dialer<T>>,
    pub(crate) options: PoolOptions,
    pub(crate) cron_started: AtomicBool,
    pub(crate) fill_log: LogThrottle,
    pub(crate) sweep_log: LogThrottle,
    reinsert_log: LogThrottle,
}

impl<T: Send + 'static> WarmPool<T> {
    /// A pool with the default [PoolOptions].
    pub fn new() -> Self {
        Self::with_options(PoolOptions::default())
    }

    pub fn with_options(options: PoolOptions) -> Self {
        let log_every = options.log_every;
        WarmPool {
            shards: [Arc::new(Shard::new()), Arc::new(Shard::new())],
            dialer: OnceCell::new(),
            options,
            cron_started: AtomicBool::new(false),
            fill_log: LogThrottle::new(log_every),
            sweep_log: LogThrottle::new(log_every),
            reinsert_log: LogThrottle::new(log_every),
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Number of entries currently parked in `shard`.
    ///
    /// Panics when `shard >= SHARDS`, as do all shard-indexed methods.
    pub fn len(&self, shard: usize) -> usize {
        self.shards[shard].len()
    }

    /// True when every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.len() == 0)
    }

    /// Register the dialer used by the fallback path and the background
    /// refill. The first registration wins for the lifetime of the
    /// pool; later calls change nothing and return false.
    pub fn register_dialer(&self, dialer: Dialer<T>) -> bool {
        let registered = self.dialer.set(dialer).is_ok();
        if !registered {
            debug!("dialer already registered, keeping the first one");
        }
        registered
    }

    /// Remove and return a batch from the head of `shard`.
    ///
    /// A shard holding more than `max` entries yields the first
    /// `max - 1` and keeps the remainder; otherwise the whole shard is
    /// drained. An empty shard yields an empty vector. The removal is
    /// atomic with respect to every other shard mutation.
    pub fn take(&self, shard: usize, max: usize) -> Vec<Pooled<T>> {
        self.shards[shard].take(max)
    }

    /// Append `items` at the tail of `shard`, preserving order. There
    /// is no ceiling: the capacity threshold steers routing and refill,
    /// it never rejects a put.
    pub fn put(&self, shard: usize, items: Vec<Pooled<T>>) {
        self.shards[shard].push_batch(items);
    }

    /// Park one connection: shard 0 while it is below the capacity
    /// threshold, shard 1 otherwise.
    pub fn release(&self, conn: T) {
        let entry = Pooled::new(conn);
        match self.shards[0].push_within(entry, self.options.shard_capacity) {
            Ok(()) => {}
            Err(entry) => self.shards[1].push(entry),
        }
    }

    /// Hand out a warm connection, or dial a new one.
    ///
    /// The shard scan never waits: a shard whose lock is busy is
    /// skipped for this call. When both shards come up empty the
    /// registered dialer is invoked, bounded by `deadline` when one is
    /// given. `addr` only labels the diagnostics.
    ///
    /// Failures are always an `Err`, never a panic or a hang: no
    /// registered dialer yields [DialerUnset], a failed dial yields
    /// [ConnectError], an expired deadline [ConnectTimedout].
    pub async fn acquire(&self, deadline: Option<Duration>, addr: &str) -> Result<T> {
        for idx in 0..SHARDS {
            let mut batch = match self.shards[idx].try_take(ACQUIRE_BATCH) {
                Some(batch) => batch,
                None => {
                    debug!("shard {} lock busy, skipping it this round", idx);
                    continue;
                }
            };
            if batch.is_empty() {
                continue;
            }
            let selected = batch.remove(0);
            if !batch.is_empty() {
                // the rest goes back without making the caller wait
                self.reinsert(idx, batch);
            }
            debug!(
                "warm connection from shard {} for {}, {} left",
                idx,
                addr,
                self.len(idx)
            );
            return Ok(selected.into_inner());
        }

        let dialer = self
            .dialer
            .get()
            .or_err(DialerUnset, "no dialer registered to fall back on")?;
        debug!("pool exhausted, dialing {}", addr);
        Self::dial(dialer, deadline, addr).await
    }

    /// The dial-hook form of [acquire](Self::acquire): registers
    /// `dialer` first (the earliest registration wins) and then
    /// acquires, for call sites that carry their dial hook with them.
    pub async fn acquire_with(
        &self,
        dialer: Dialer<T>,
        deadline: Option<Duration>,
        addr: &str,
    ) -> Result<T> {
        self.register_dialer(dialer);
        self.acquire(deadline, addr).await
    }

    async fn dial(dialer: &Dialer<T>, deadline: Option<Duration>, addr: &str) -> Result<T> {
        let connecting = dialer();
        let dialed = match deadline {
            Some(wait) => match tokio::time::timeout(wait, connecting).await {
                Ok(res) => res,
                Err(_) => {
                    return Err(Error::explain(
                        ConnectTimedout,
                        format!("cannot dial {addr}: no connection after {wait:?}"),
                    )
                    .into_up())
                }
            },
            None => connecting.await,
        };
        dialed.map_err(|e| Error::because(ConnectError, format!("cannot dial {addr}"), e).into_up())
    }

    /// Give the unselected part of an acquisition batch back to its
    /// shard: a detached task appends it under the shard's maintenance
    /// lock. Without a runtime to take the task the batch is appended
    /// right here under the entries lock instead, which cannot stall
    /// because no maintenance task can be alive to contend with. The
    /// batch is never lost either way.
    fn reinsert(&self, idx: usize, batch: Vec<Pooled<T>>) {
        let restored = batch.len();
        let emit = self.reinsert_log.ready();
        let note = move |before: usize| {
            if emit {
                info!(
                    "reinserted {} unselected entries into shard {}: {} -> {}",
                    restored,
                    idx,
                    before,
                    before + restored
                );
            }
        };
        if !can_submit() {
            debug!("no async runtime, restoring {} entries in place", restored);
            let shard = &self.shards[idx];
            let before = shard.len();
            shard.push_batch(batch);
            note(before);
            return;
        }
        let shard = self.shards[idx].clone();
        let task = async move {
            let _mx = shard.lock_maintenance().await;
            let before = shard.len();
            shard.push_batch(batch);
            note(before);
        };
        // runtime presence is thread-local, checked just above
        let _ = submit(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    /// A dialer yielding 1, 2, 3, ... alongside its call counter.
    fn counting_dialer() -> (Dialer<usize>, Arc<AtomicUsize>) {
        let dials = Arc::new(AtomicUsize::new(0));
        let seen = dials.clone();
        let dialer: Dialer<usize> = Arc::new(move || {
            let seen = seen.clone();
            Box::pin(async move { Ok(seen.fetch_add(1, Ordering::SeqCst) + 1) })
        });
        (dialer, dials)
    }

    fn failing_dialer() -> Dialer<usize> {
        Arc::new(|| Box::pin(async { Error::e_explain(ConnectRefused, "peer is down") }))
    }

    fn seed(pool: &WarmPool<usize>, shard: usize, ids: std::ops::Range<usize>) {
        pool.put(shard, ids.map(Pooled::new).collect());
    }

    #[test]
    fn test_take_split_rule() {
        let pool = WarmPool::new();

        // fewer entries than max: drained whole
        seed(&pool, 0, 0..2);
        assert_eq!(pool.take(0, 3).len(), 2);
        assert_eq!(pool.len(0), 0);

        // exactly max: drained whole
        seed(&pool, 0, 0..3);
        assert_eq!(pool.take(0, 3).len(), 3);
        assert_eq!(pool.len(0), 0);

        // more than max: max - 1 come out, the rest stays
        seed(&pool, 0, 0..5);
        let batch = pool.take(0, 3);
        assert_eq!(batch.len(), 2);
        assert_eq!(pool.len(0), 3);

        // empty: nothing
        assert!(pool.take(1, 3).is_empty());
    }

    #[test]
    fn test_release_routes_by_capacity() {
        let pool = WarmPool::new();
        let cap = pool.options().shard_capacity;
        for conn in 0..cap + 2 {
            pool.release(conn);
        }
        assert_eq!(pool.len(0), cap);
        assert_eq!(pool.len(1), 2);
    }

    #[test]
    fn test_conservation_across_ops() {
        let pool = WarmPool::new();
        for conn in 0..15 {
            pool.release(conn);
        }
        let held = pool.take(0, 3); // 2 out of shard 0
        let total = pool.len(0) + pool.len(1) + held.len();
        assert_eq!(total, 15);
        pool.put(0, held);
        assert_eq!(pool.len(0) + pool.len(1), 15);
    }

    #[tokio::test]
    async fn test_acquire_without_dialer_fails_fast() {
        let pool: WarmPool<usize> = WarmPool::new();
        let e = pool.acquire(None, "nowhere").await.unwrap_err();
        assert_eq!(e.etype(), &DialerUnset);
    }

    #[tokio::test]
    async fn test_acquire_reports_cannot_dial() {
        let pool: WarmPool<usize> = WarmPool::new();
        let e = pool
            .acquire_with(failing_dialer(), None, "203.0.113.9:79")
            .await
            .unwrap_err();
        assert_eq!(e.etype(), &ConnectError);
        assert!(format!("{}", e).contains("cannot dial"));
        assert_eq!(e.root_etype(), &ConnectRefused);
    }

    #[tokio::test]
    async fn test_acquire_falls_back_in_dial_order() {
        let pool: WarmPool<usize> = WarmPool::new();
        let (dialer, dials) = counting_dialer();
        let mut got = vec![];
        for _ in 0..3 {
            got.push(pool.acquire_with(dialer.clone(), None, "peer").await.unwrap());
        }
        assert_eq!(got, vec![1, 2, 3]);
        assert_eq!(dials.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_acquire_respects_deadline() {
        let pool: WarmPool<usize> = WarmPool::new();
        let stuck: Dialer<usize> = Arc::new(|| {
            Box::pin(async {
                sleep(Duration::from_secs(3600)).await;
                Ok(0)
            })
        });
        let e = pool
            .acquire_with(stuck, Some(Duration::from_millis(30)), "blackhole")
            .await
            .unwrap_err();
        assert_eq!(e.etype(), &ConnectTimedout);
    }

    #[tokio::test]
    async fn test_acquire_prefers_pool_and_reinserts_rest() {
        let pool: WarmPool<usize> = WarmPool::new();
        seed(&pool, 0, 10..13);
        let (dialer, dials) = counting_dialer();

        let got = pool.acquire_with(dialer, None, "peer").await.unwrap();
        assert_eq!(got, 10); // head of the shard, not a fresh dial
        assert_eq!(dials.load(Ordering::SeqCst), 0);

        // the two unselected entries come back through the detached task
        sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.len(0) + pool.len(1), 2);
    }

    #[test]
    fn test_acquire_without_runtime_restores_rest() {
        // embedders without a runtime drive the pool with a plain
        // block_on; the unselected entries must come back even then
        let pool: WarmPool<usize> = WarmPool::new();
        seed(&pool, 0, 0..3);

        let got = futures::executor::block_on(pool.acquire(None, "peer")).unwrap();

        assert_eq!(got, 0);
        assert_eq!(pool.len(0) + pool.len(1), 2);
    }

    #[tokio::test]
    async fn test_acquire_skips_busy_shard() {
        let pool: WarmPool<usize> = WarmPool::new();
        seed(&pool, 0, 0..3);
        seed(&pool, 1, 100..101);

        let busy = pool.shards[0].hold_entries();
        let got = pool.acquire(None, "peer").await.unwrap();
        drop(busy);

        assert_eq!(got, 100); // shard 0 was skipped, not waited on
        assert_eq!(pool.len(0), 3);
    }

    #[tokio::test]
    async fn test_first_dialer_registration_wins() {
        let pool: WarmPool<usize> = WarmPool::new();
        let (first, first_dials) = counting_dialer();
        assert!(pool.register_dialer(first));
        assert!(!pool.register_dialer(failing_dialer()));

        // the losing dialer must never be consulted
        assert!(pool.acquire(None, "peer").await.is_ok());
        assert_eq!(first_dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_double_handout() {
        let pool: Arc<WarmPool<usize>> = Arc::new(WarmPool::new());
        seed(&pool, 0, 0..6);
        let (dialer, _) = counting_dialer();
        pool.register_dialer(Arc::new(move || {
            let inner = dialer.clone();
            Box::pin(async move { inner().await.map(|id| 1000 + id) })
        }));

        let mut tasks = vec![];
        for _ in 0..8 {
            let pool = pool.clone();
            tasks.push(tokio::spawn(
                async move { pool.acquire(None, "peer").await },
            ));
        }
        let mut got = vec![];
        for task in tasks {
            got.push(task.await.unwrap().unwrap());
        }
        got.sort_unstable();
        let before = got.len();
        got.dedup();
        assert_eq!(got.len(), before, "a connection was handed out twice");
    }
}
