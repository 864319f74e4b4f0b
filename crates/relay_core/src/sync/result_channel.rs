//! # Result Channel
//!
//! Single-assignment handoff slot for returning a value from one thread to
//! another: a [`Promise`] writes it once, a [`Future`] reads it once, and a
//! [`SharedFuture`] lets any number of readers observe the same value.
//!
//! ## Slot Lifecycle
//!
//! ```text
//!   Pending ──set/set_error──> Ready ──Future::get──> Taken
//!      │                         ▲
//!      └──Promise dropped────────┘  (Ready(Err(BrokenChannel)))
//!
//!   Deferred ──first wait/get──> Running ──job returns──> Ready
//! ```
//!
//! ## Thread Safety
//!
//! - The slot state only changes under its mutex.
//! - Every wait loops on the state, so spurious wakes are harmless.
//! - Completion broadcasts (`notify_all`): shared readers all wake.

use crate::error::{SyncError, SyncResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Work run lazily by the first reader of a deferred slot.
pub(crate) type DeferredJob<T> = Box<dyn FnOnce() -> SyncResult<T> + Send>;

enum SlotState<T> {
    Pending,
    Deferred(DeferredJob<T>),
    Running,
    Ready(SyncResult<T>),
    Taken,
}

impl<T> SlotState<T> {
    const fn name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Deferred(_) => "Deferred",
            Self::Running => "Running",
            Self::Ready(_) => "Ready",
            Self::Taken => "Taken",
        }
    }

    const fn is_complete(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Taken)
    }
}

/// Outcome of a bounded wait on a future.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitStatus {
    /// The result (value, error or broken channel) is available.
    Ready,
    /// The timeout elapsed first.
    Timeout,
    /// The result is produced by a deferred job that has not started; only
    /// `get`/`wait` will run it.
    Deferred,
}

/// The shared slot behind a promise and its readers.
pub(crate) struct Slot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> Slot<T> {
    fn new(state: SlotState<T>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            ready: Condvar::new(),
        })
    }

    /// Stores the result and wakes every reader.
    ///
    /// # Panics
    ///
    /// Panics with "value already set" if the slot was already completed.
    pub(crate) fn complete(&self, result: SyncResult<T>) {
        {
            let mut state = self.state.lock();
            assert!(
                matches!(*state, SlotState::Pending | SlotState::Running),
                "value already set"
            );
            *state = SlotState::Ready(result);
        }
        self.ready.notify_all();
    }

    /// Blocks until the slot is complete, running a deferred job inline.
    fn wait_complete(&self) -> MutexGuard<'_, SlotState<T>> {
        let mut state = self.state.lock();
        loop {
            if state.is_complete() {
                return state;
            }
            if let Some(job) = Self::take_deferred(&mut state) {
                drop(state);
                self.complete(job());
                state = self.state.lock();
                continue;
            }
            self.ready.wait(&mut state);
        }
    }

    /// Waits up to `deadline` without starting deferred work.
    fn wait_until(&self, deadline: Instant) -> WaitStatus {
        let mut state = self.state.lock();
        loop {
            match *state {
                SlotState::Ready(_) | SlotState::Taken => return WaitStatus::Ready,
                SlotState::Deferred(_) => return WaitStatus::Deferred,
                SlotState::Pending | SlotState::Running => {}
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return if state.is_complete() {
                    WaitStatus::Ready
                } else {
                    WaitStatus::Timeout
                };
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.state.lock().is_complete()
    }

    fn state_name(&self) -> &'static str {
        self.state.lock().name()
    }

    fn take_deferred(state: &mut SlotState<T>) -> Option<DeferredJob<T>> {
        if !matches!(state, SlotState::Deferred(_)) {
            return None;
        }
        match std::mem::replace(state, SlotState::Running) {
            SlotState::Deferred(job) => Some(job),
            _ => None,
        }
    }
}

/// Creates a connected promise/future pair.
///
/// ```rust
/// use relay_core::channel;
/// use std::thread;
///
/// let (promise, future) = channel();
/// let child = thread::spawn(move || future.get().map(|n: u64| (1..=n).product::<u64>()));
/// promise.set(5);
/// assert_eq!(child.join().unwrap(), Ok(120));
/// ```
#[must_use]
pub fn channel<T>() -> (Promise<T>, Future<T>) {
    let slot = Slot::new(SlotState::Pending);
    (
        Promise {
            slot: Some(Arc::clone(&slot)),
        },
        Future { slot },
    )
}

/// Write side of a result channel. Consumed by [`set`](Self::set); dropping
/// it unset breaks the channel.
pub struct Promise<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> Promise<T> {
    /// Supplies the value and wakes every reader.
    pub fn set(self, value: T) {
        self.complete(Ok(value));
    }

    /// Supplies a failure instead of a value. Readers get
    /// [`SyncError::TaskFailed`].
    pub fn set_error(self, message: impl Into<String>) {
        self.complete(Err(SyncError::TaskFailed(message.into())));
    }

    /// Returns true if every reader has been dropped.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.slot.as_ref().map_or(true, |slot| Arc::strong_count(slot) == 1)
    }

    pub(crate) fn complete(mut self, result: SyncResult<T>) {
        if let Some(slot) = self.slot.take() {
            slot.complete(result);
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::debug!("promise dropped without a value, channel broken");
            slot.complete(Err(SyncError::BrokenChannel));
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.slot.as_ref().map_or("Completed", |slot| slot.state_name());
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

/// Single-read side of a result channel.
pub struct Future<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Future<T> {
    /// A future whose value is computed by `job` on the first thread that
    /// waits for it.
    pub(crate) fn deferred(job: DeferredJob<T>) -> Self {
        Self {
            slot: Slot::new(SlotState::Deferred(job)),
        }
    }

    /// Blocks until the result is available and returns it.
    ///
    /// # Errors
    ///
    /// - [`SyncError::BrokenChannel`] if the promise was dropped unset.
    /// - [`SyncError::TaskFailed`] if the producer reported a failure.
    pub fn get(self) -> SyncResult<T> {
        let mut state = self.slot.wait_complete();
        match std::mem::replace(&mut *state, SlotState::Taken) {
            SlotState::Ready(result) => result,
            _ => Err(SyncError::AlreadyRetrieved),
        }
    }

    /// Like [`get`](Self::get) but gives up after `timeout`.
    ///
    /// A deferred future runs its job on this thread and ignores the timeout.
    ///
    /// # Errors
    ///
    /// [`SyncError::Timeout`] if no result arrived in time, otherwise as
    /// [`get`](Self::get).
    pub fn get_timeout(self, timeout: Duration) -> SyncResult<T> {
        match self.wait_for(timeout) {
            WaitStatus::Timeout => Err(SyncError::Timeout(timeout)),
            WaitStatus::Ready | WaitStatus::Deferred => self.get(),
        }
    }

    /// Blocks until the result is available without taking it.
    pub fn wait(&self) {
        drop(self.slot.wait_complete());
    }

    /// Waits at most `timeout` for the result.
    #[must_use]
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        self.slot.wait_until(Instant::now() + timeout)
    }

    /// Returns true if the result is available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.slot.is_complete()
    }

    /// Converts into a cloneable handle for many readers.
    #[must_use]
    pub fn share(self) -> SharedFuture<T>
    where
        T: Clone,
    {
        SharedFuture { slot: self.slot }
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("state", &self.slot.state_name())
            .finish()
    }
}

/// Multi-read side of a result channel. Every clone observes the same
/// value once it is available.
pub struct SharedFuture<T> {
    slot: Arc<Slot<T>>,
}

impl<T: Clone> SharedFuture<T> {
    /// Blocks until the result is available and returns a copy of it.
    ///
    /// # Errors
    ///
    /// Same as [`Future::get`].
    pub fn get(&self) -> SyncResult<T> {
        let state = self.slot.wait_complete();
        match &*state {
            SlotState::Ready(result) => result.clone(),
            _ => Err(SyncError::AlreadyRetrieved),
        }
    }

    /// Blocks until the result is available.
    pub fn wait(&self) {
        drop(self.slot.wait_complete());
    }

    /// Waits at most `timeout` for the result.
    #[must_use]
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        self.slot.wait_until(Instant::now() + timeout)
    }

    /// Returns true if the result is available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.slot.is_complete()
    }
}

impl<T> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for SharedFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedFuture")
            .field("state", &self.slot.state_name())
            .field("readers", &Arc::strong_count(&self.slot))
            .finish()
    }
}
