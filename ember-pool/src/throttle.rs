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

//! Keeps steady-state diagnostics from flooding the log.

use std::sync::atomic::{AtomicU32, Ordering};

/// An atomic gate that lets one caller in `every + 1` through.
///
/// Each call to [ready](LogThrottle::ready) bumps a counter; the call
/// that finds the counter at the threshold resets it and is told to
/// emit, every other call is told to stay quiet. The gate never blocks
/// and has no effect on anything but the log volume.
pub struct LogThrottle {
    count: AtomicU32,
    every: u32,
}

impl LogThrottle {
    pub const fn new(every: u32) -> Self {
        LogThrottle {
            count: AtomicU32::new(0),
            every,
        }
    }

    /// True when this call should emit its log line.
    pub fn ready(&self) -> bool {
        loop {
            let seen = self.count.load(Ordering::Relaxed);
            let next = if seen >= self.every { 0 } else { seen + 1 };
            if self
                .count
                .compare_exchange_weak(seen, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return seen >= self.every;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_ready_cadence() {
        let throttle = LogThrottle::new(3);
        // three quiet calls, then one emit, repeating
        for _ in 0..2 {
            assert!(!throttle.ready());
            assert!(!throttle.ready());
            assert!(!throttle.ready());
            assert!(throttle.ready());
        }
    }

    #[test]
    fn test_zero_threshold_always_emits() {
        let throttle = LogThrottle::new(0);
        assert!(throttle.ready());
        assert!(throttle.ready());
    }

    #[test]
    fn test_ready_concurrent_budget() {
        let throttle = Arc::new(LogThrottle::new(7));
        let mut workers = vec![];
        for _ in 0..4 {
            let throttle = throttle.clone();
            workers.push(std::thread::spawn(move || {
                (0..200).filter(|_| throttle.ready()).count()
            }));
        }
        let emitted: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        // 800 transitions of a counter cycling over 8 states: the emit
        // budget is exact no matter the interleaving
        assert_eq!(emitted, 100);
    }
}
