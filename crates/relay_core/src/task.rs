//! # Tasks
//!
//! A [`PackagedTask`] binds a callable to the promise side of a result
//! channel, so whoever runs it (this thread, a new thread, a worker pool)
//! delivers the outcome to the holder of the [`Future`].
//!
//! [`spawn`] is the one-call version with a [`Launch`] policy:
//!
//! ```text
//!   Launch::Async     ─> new thread runs the task now
//!   Launch::Deferred  ─> nothing runs until the future is waited on,
//!                        then the waiting thread runs it inline
//! ```

use crate::error::{SyncError, SyncResult};
use crate::sync::result_channel::{channel, Future, Promise};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// Where a spawned task runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Launch {
    /// On a freshly spawned thread, immediately.
    #[default]
    Async,
    /// On the first thread that waits on the future.
    Deferred,
}

/// A callable bound to a result channel.
///
/// Running it fulfils the paired [`Future`]; a panic inside the callable is
/// caught and reported as [`SyncError::TaskFailed`]. Dropping the task
/// without running it breaks the channel.
///
/// ```rust
/// use relay_core::PackagedTask;
///
/// let (task, future) = PackagedTask::new(|| (1..=5).product::<u32>());
/// task.run();
/// assert_eq!(future.get(), Ok(120));
/// ```
pub struct PackagedTask<T> {
    job: Box<dyn FnOnce() -> T + Send>,
    promise: Promise<T>,
}

impl<T> PackagedTask<T> {
    /// Packages `job` and returns it together with the future for its result.
    pub fn new<F>(job: F) -> (Self, Future<T>)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (promise, future) = channel();
        (
            Self {
                job: Box::new(job),
                promise,
            },
            future,
        )
    }

    /// Runs the callable on the current thread and delivers its outcome.
    pub fn run(self) {
        let Self { job, promise } = self;
        promise.complete(run_catching(job));
    }
}

impl<T> fmt::Debug for PackagedTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackagedTask")
            .field("promise", &self.promise)
            .finish_non_exhaustive()
    }
}

/// Runs `f` according to `launch` and returns the future for its result.
///
/// An `Async` task runs on a detached thread named `relay-async`. If the
/// thread cannot be spawned the task is dropped and the future resolves to
/// [`SyncError::BrokenChannel`].
pub fn spawn<F, T>(launch: Launch, f: F) -> Future<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match launch {
        Launch::Async => {
            let (task, future) = PackagedTask::new(f);
            let spawned = thread::Builder::new()
                .name("relay-async".into())
                .spawn(move || task.run());
            if let Err(e) = spawned {
                tracing::warn!("failed to spawn async task thread: {}", e);
            }
            future
        }
        Launch::Deferred => Future::deferred(Box::new(move || run_catching(f))),
    }
}

/// Calls `f`, converting a panic into `SyncError::TaskFailed`.
fn run_catching<T>(f: impl FnOnce() -> T) -> SyncResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::warn!("task panicked: {}", message);
        SyncError::TaskFailed(message)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
