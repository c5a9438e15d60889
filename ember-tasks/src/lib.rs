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
//! Detached task submission and small task combinators.
//!
//! [submit] is the seam through which the pool hands asynchronous side
//! work (batch reinsertion, maintenance loops) to the ambient runtime:
//! the caller fires and forgets, and a missing runtime surfaces as an
//! error instead of a panic. The combinators cover the two composition
//! shapes the callers need: gate one task on another ([on_success]) and
//! drive a set of fallible tasks to the first failure ([run_all]).

use std::future::Future;

use ember_error::{Error, ErrorType::*, Result};
use futures::future::try_join_all;
use tokio::runtime::Handle;

/// Hand `task` to the current thread's async runtime to run detached.
///
/// Fails with [SubmitError] when called outside any Tokio runtime; it
/// never panics, so callers can fall back to doing the work inline.
pub fn submit<F>(task: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    submit_or_return(task)
        .map_err(|_| Error::explain(SubmitError, "no async runtime to submit to"))
}

/// Like [submit], but hands `task` back instead of dropping it when no
/// runtime is available, so the caller can run it some other way.
pub fn submit_or_return<F>(task: F) -> std::result::Result<(), F>
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
            Ok(())
        }
        Err(_) => Err(task),
    }
}

/// Whether [submit] called from this thread right now would find a
/// runtime to take the task.
///
/// Runtime context is thread-local, so the answer holds for the rest of
/// the caller's synchronous stretch; callers branch on it to pick an
/// inline code path before committing resources to a future.
pub fn can_submit() -> bool {
    Handle::try_current().is_ok()
}

/// Run `first`; if and only if it succeeds, run `then`.
///
/// The composed future resolves to the first error encountered.
pub async fn on_success<A, B>(first: A, then: B) -> Result<()>
where
    A: Future<Output = Result<()>>,
    B: Future<Output = Result<()>>,
{
    first.await?;
    then.await
}

/// Drive all `tasks` concurrently to completion.
///
/// Resolves `Ok` once every task succeeds. The first failure resolves
/// the whole set with that error and drops the unfinished tasks, which
/// cancels them.
pub async fn run_all<I, F>(tasks: I) -> Result<()>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<()>>,
{
    try_join_all(tasks).await?;
    Ok(())
}
