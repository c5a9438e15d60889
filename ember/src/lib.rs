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

//! # Ember
//!
//! Ember keeps pools of pre-established network connections warm, so
//! callers get a ready connection instead of paying for a dial on the
//! hot path.
//!
//! # Features
//! - Two-shard pool with a lock-skipping, never-blocking acquisition
//!   fast path and a deadline-bounded dial fallback
//! - Background refill and sweep loops with watch-based shutdown
//! - Generic over the connection type: TCP, TLS, or anything that
//!   closes on drop
//!
//! # Usage
//! Most users only need [`WarmPool`] and the types in [`prelude`]. The
//! sibling crates are re-exported as modules for the pieces that are
//! useful on their own.

pub use ember_pool::*;

/// Shared error and result types
pub mod error {
    pub use ember_error::*;
}

/// Detached task submission and combinators
pub mod tasks {
    pub use ember_tasks::*;
}

/// Time-bounded locking and inactivity timing
pub mod time {
    pub use ember_timeout::*;
}

/// A useful set of types for getting started
pub mod prelude {
    pub use ember_error::{Context, Error, ErrorType, OrErr, Result};
    pub use ember_pool::{Dialer, PoolOptions, Pooled, ShutdownWatch, WarmPool};
}
