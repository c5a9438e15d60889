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

//! Fire a callback when something has been idle for too long.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use ember_error::Result;
use ember_tasks::submit;
use log::debug;
use parking_lot::Mutex;
use tokio::time::sleep;

/// Runs a callback once after nothing has touched the timer for a full
/// window.
///
/// [update](ActivityTimer::update) marks activity. The window is checked
/// coarsely, once per window: the callback fires between one and two
/// windows after the last activity. Dropping the timer disarms it
/// without firing.
pub struct ActivityTimer {
    inner: Arc<TimerInner>,
}

struct TimerInner {
    active: AtomicBool,
    closed: AtomicBool,
    window_ms: AtomicU64,
    on_timeout: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl TimerInner {
    fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.load(Ordering::SeqCst))
    }

    fn finish(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return; // already fired
        }
        debug!("activity timer fired");
        if let Some(on_timeout) = self.on_timeout.lock().take() {
            on_timeout();
        }
    }
}

impl ActivityTimer {
    /// Arm a timer that runs `on_timeout` once no [update](Self::update)
    /// arrives for `window`. A zero window fires right away.
    ///
    /// The checker task needs an async runtime; without one this fails
    /// with `SubmitError` and nothing is armed.
    pub fn after_inactivity<F>(window: Duration, on_timeout: F) -> Result<ActivityTimer>
    where
        F: FnOnce() + Send + 'static,
    {
        let timer = ActivityTimer {
            inner: Arc::new(TimerInner {
                active: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                window_ms: AtomicU64::new(window.as_millis() as u64),
                on_timeout: Mutex::new(Some(Box::new(on_timeout))),
            }),
        };
        if window.is_zero() {
            timer.inner.finish();
            return Ok(timer);
        }
        // grace mark: the first full window cannot fire
        timer.update();
        submit(check_loop(Arc::downgrade(&timer.inner)))?;
        Ok(timer)
    }

    /// Mark activity, deferring the timeout by a full window.
    pub fn update(&self) {
        self.inner.active.store(true, Ordering::SeqCst);
    }

    /// Re-arm with a new window. Takes effect once the in-flight window
    /// elapses. A zero window fires immediately.
    pub fn set_window(&self, window: Duration) {
        if window.is_zero() {
            self.inner.finish();
            return;
        }
        self.inner
            .window_ms
            .store(window.as_millis() as u64, Ordering::SeqCst);
        self.update();
    }

    /// Whether the callback has fired.
    pub fn fired(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

async fn check_loop(watch: Weak<TimerInner>) {
    loop {
        // read the window without pinning the state alive across the
        // sleep, so a dropped handle disarms the timer
        let window = match watch.upgrade() {
            Some(inner) if !inner.closed.load(Ordering::SeqCst) => inner.window(),
            _ => return,
        };
        sleep(window).await;
        match watch.upgrade() {
            Some(inner) => {
                if inner.closed.load(Ordering::SeqCst) {
                    return;
                }
                if !inner.active.swap(false, Ordering::SeqCst) {
                    inner.finish();
                    return;
                }
            }
            None => return,
        }
    }
}
