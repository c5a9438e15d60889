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

//! Shard internals: pooled entries and the per-shard lock pair.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::MutexGuard as AsyncMutexGuard;

/// One pooled connection plus the instant it entered the pool.
///
/// The timestamp backs the optional idle-age sweep criterion; nothing
/// else about the connection is tracked.
#[derive(Debug)]
pub struct Pooled<T> {
    connection: T,
    idle_since: Instant,
}

impl<T> Pooled<T> {
    /// Wrap a connection, stamping it as idle from now.
    pub fn new(connection: T) -> Self {
        Pooled {
            connection,
            idle_since: Instant::now(),
        }
    }

    /// Unwrap the connection for hand-out.
    pub fn into_inner(self) -> T {
        self.connection
    }

    /// Peek at the wrapped connection.
    pub fn connection(&self) -> &T {
        &self.connection
    }

    /// How long this entry has been sitting in the pool.
    pub fn idle_for(&self) -> Duration {
        self.idle_since.elapsed()
    }
}

/// One shard: the entry sequence behind its own short-lived lock, plus
/// the maintenance lock that serializes refill, sweep and reinsertion
/// against each other.
///
/// The entries lock is never held across an await; the maintenance lock
/// is async precisely so refill can keep it through its dials.
pub(crate) struct Shard<T> {
    entries: Mutex<Vec<Pooled<T>>>,
    maintenance: AsyncMutex<()>,
}

impl<T> Shard<T> {
    pub fn new() -> Self {
        Shard {
            entries: Mutex::new(Vec::new()),
            maintenance: AsyncMutex::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Append entries at the tail, preserving order. No ceiling is
    /// enforced here: the capacity threshold steers routing and refill,
    /// it never rejects a put.
    pub fn push_batch(&self, items: Vec<Pooled<T>>) {
        if items.is_empty() {
            return;
        }
        self.entries.lock().extend(items);
    }

    pub fn push(&self, item: Pooled<T>) {
        self.entries.lock().push(item);
    }

    /// Append only while the shard holds fewer than `cap` entries,
    /// handing the entry back otherwise. Check and append are one
    /// critical section.
    pub fn push_within(&self, item: Pooled<T>, cap: usize) -> Result<(), Pooled<T>> {
        let mut entries = self.entries.lock();
        if entries.len() < cap {
            entries.push(item);
            Ok(())
        } else {
            Err(item)
        }
    }

    /// Remove and return a batch from the head.
    ///
    /// A shard holding more than `max` entries yields the first
    /// `max - 1` and keeps the rest; a shard holding `max` or fewer is
    /// drained whole. The removal is one critical section, so no other
    /// mutation can interleave with it.
    pub fn take(&self, max: usize) -> Vec<Pooled<T>> {
        let mut entries = self.entries.lock();
        Self::split_head(&mut entries, max)
    }

    /// Like [take](Self::take) but refusing to wait: `None` means the
    /// entries lock was busy.
    pub fn try_take(&self, max: usize) -> Option<Vec<Pooled<T>>> {
        let mut entries = self.entries.try_lock()?;
        Some(Self::split_head(&mut entries, max))
    }

    fn split_head(entries: &mut Vec<Pooled<T>>, max: usize) -> Vec<Pooled<T>> {
        if entries.is_empty() || max == 0 {
            return Vec::new();
        }
        if entries.len() > max {
            let rest = entries.split_off(max - 1);
            std::mem::replace(entries, rest)
        } else {
            std::mem::take(entries)
        }
    }

    /// Remove every entry idle for longer than `max_idle`, walking the
    /// sequence once in a single critical section. Returns the retired
    /// entries, so the caller can dispose of them with the lock long
    /// gone, and the length left behind.
    pub fn evict_idle(&self, max_idle: Option<Duration>) -> (Vec<Pooled<T>>, usize) {
        let mut entries = self.entries.lock();
        let evicted = match max_idle {
            Some(limit) => {
                let mut keep = Vec::with_capacity(entries.len());
                let mut evicted = Vec::new();
                for entry in entries.drain(..) {
                    if entry.idle_for() > limit {
                        evicted.push(entry);
                    } else {
                        keep.push(entry);
                    }
                }
                *entries = keep;
                evicted
            }
            None => Vec::new(),
        };
        (evicted, entries.len())
    }

    pub async fn lock_maintenance(&self) -> AsyncMutexGuard<'_, ()> {
        self.maintenance.lock().await
    }

    /// Pin the entries lock so tests can stage contention.
    #[cfg(test)]
    pub fn hold_entries(&self) -> parking_lot::MutexGuard<'_, Vec<Pooled<T>>> {
        self.entries.lock()
    }
}
