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

#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
//! Time-bounded coordination utilities.
//!
//! [TimeoutLocker] is a mutual-exclusion primitive whose lock attempts
//! give up after a bounded wait instead of parking forever.
//! [ActivityTimer] fires a callback once after a configurable window of
//! inactivity, for tearing down things nobody touches anymore.

mod locker;
mod timer;

pub use locker::{LockerGuard, TimeoutLocker};
pub use timer::ActivityTimer;
