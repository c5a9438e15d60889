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
//! A sharded pool of pre-established ("warm") connections.
//!
//! [WarmPool] parks ready-to-use connections in two shards and hands
//! them out through a lock-skipping fast path that falls back to
//! dialing fresh through a caller-registered dialer. Background
//! maintenance keeps the shards topped up and retires entries that sit
//! idle past a configurable age. The pool is generic over the
//! connection type and works the same for TCP sockets, TLS sessions,
//! or anything else that closes on drop.

mod maintenance;
mod pool;
mod shard;
mod throttle;

pub use maintenance::ShutdownWatch;
pub use pool::{Dialer, PoolOptions, WarmPool, SHARDS};
pub use shard::Pooled;
pub use throttle::LogThrottle;
