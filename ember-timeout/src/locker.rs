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

//! A lock that refuses to wait forever.

use std::time::Duration;

use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::timeout;

/// A mutual-exclusion lock with a bounded wait.
///
/// Unlike a plain mutex, [lock](TimeoutLocker::lock) gives up after the
/// caller's wait budget and returns `None`, so a stuck holder can stall
/// its peers by at most that budget. Unlocking is automatic: dropping
/// the returned [LockerGuard] releases the lock, which makes unbalanced
/// unlocks unrepresentable.
pub struct TimeoutLocker {
    sem: Semaphore,
}

/// Proof of exclusive access to a [TimeoutLocker]. Releases on drop.
pub struct LockerGuard<'a> {
    _permit: SemaphorePermit<'a>,
}

impl TimeoutLocker {
    pub fn new() -> Self {
        TimeoutLocker {
            sem: Semaphore::new(1),
        }
    }

    /// Wait up to `wait` for the lock. `None` means the budget ran out.
    pub async fn lock(&self, wait: Duration) -> Option<LockerGuard<'_>> {
        match timeout(wait, self.sem.acquire()).await {
            Ok(Ok(permit)) => Some(LockerGuard { _permit: permit }),
            // elapsed, or the semaphore was closed (it never is)
            _ => None,
        }
    }

    /// Take the lock only if it is free right now.
    pub fn try_lock(&self) -> Option<LockerGuard<'_>> {
        self.sem
            .try_acquire()
            .ok()
            .map(|permit| LockerGuard { _permit: permit })
    }
}
