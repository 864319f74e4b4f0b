//! # Shared Work Queue
//!
//! Monitor-style FIFO queue: one mutex around a `VecDeque`, one condition
//! variable for the empty → non-empty transition and, when bounded, one for
//! full → not full.
//!
//! ## Architecture
//!
//! ```text
//!   Producer 1 ──┐                                   ┌──> Consumer 1
//!   Producer 2 ──┼──> push ──> [Mutex<VecDeque<T>>] ─┼──> Consumer 2
//!   Producer N ──┘      │            ▲               └──> Consumer N
//!                       │            │
//!                       └─ notify ─> not_empty (predicate re-checked on wake)
//! ```
//!
//! Signals are sent after the lock is released, so a woken consumer never
//! immediately blocks on the mutex the producer still holds.

use crate::config::QueueConfig;
use crate::sync::cancel::CancellationToken;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Everything protected by the queue lock.
struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Counters describing the traffic through a queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Total items pushed.
    pub pushed: u64,
    /// Total items popped (including drained).
    pub popped: u64,
    /// Items currently queued.
    pub pending: usize,
}

/// Thread-safe FIFO queue with blocking and non-blocking consumers.
///
/// Share it between threads with `Arc<SharedQueue<T>>`; all locking is
/// internal.
///
/// ## Usage
///
/// ```rust
/// use relay_core::SharedQueue;
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue = Arc::new(SharedQueue::<i32>::new());
/// let producer = {
///     let queue = Arc::clone(&queue);
///     thread::spawn(move || {
///         for i in (1..=3).rev() {
///             queue.push(i);
///         }
///     })
/// };
///
/// let mut seen = Vec::new();
/// while seen.last() != Some(&1) {
///     seen.push(queue.pop_blocking());
/// }
/// producer.join().unwrap();
/// assert_eq!(seen, vec![3, 2, 1]);
/// ```
pub struct SharedQueue<T> {
    state: Mutex<State<T>>,
    /// Signalled after every push and on close.
    not_empty: Condvar,
    /// Signalled after every pop on a bounded queue and on close.
    not_full: Condvar,
    capacity: Option<usize>,
    cancel_poll: Duration,
    pushed: AtomicU64,
    popped: AtomicU64,
}

impl<T> SharedQueue<T> {
    /// Creates an unbounded queue.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&QueueConfig::unbounded())
    }

    /// Creates a queue that holds at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        Self::with_config(&QueueConfig::bounded(capacity))
    }

    /// Creates a queue from a validated [`QueueConfig`].
    #[must_use]
    pub fn with_config(config: &QueueConfig) -> Self {
        let items = config
            .capacity
            .map_or_else(VecDeque::new, VecDeque::with_capacity);
        Self {
            state: Mutex::new(State {
                items,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: config.capacity,
            cancel_poll: config.cancel_poll(),
            pushed: AtomicU64::new(0),
            popped: AtomicU64::new(0),
        }
    }

    /// Appends an item and wakes one waiting consumer.
    ///
    /// On a bounded queue this blocks while the queue is full. Once the
    /// queue is closed the capacity no longer applies, so a producer never
    /// waits on a queue that nobody will drain.
    pub fn push(&self, item: T) {
        {
            let mut state = self.state.lock();
            if let Some(capacity) = self.capacity {
                while state.items.len() >= capacity && !state.closed {
                    self.not_full.wait(&mut state);
                }
            }
            state.items.push_back(item);
            self.pushed.fetch_add(1, Ordering::Relaxed);
        }
        self.not_empty.notify_one();
    }

    /// Appends an item without blocking.
    ///
    /// # Errors
    ///
    /// Returns the item back if the queue is bounded and full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        {
            let mut state = self.state.lock();
            if let Some(capacity) = self.capacity {
                if state.items.len() >= capacity && !state.closed {
                    return Err(item);
                }
            }
            state.items.push_back(item);
            self.pushed.fetch_add(1, Ordering::Relaxed);
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Like [`push`](Self::push), but refuses the item once the queue is
    /// closed. A producer blocked on a full queue is released by
    /// [`close`](Self::close) and gets its item back.
    ///
    /// # Errors
    ///
    /// Returns the item back if the queue is closed.
    pub fn push_unless_closed(&self, item: T) -> Result<(), T> {
        {
            let mut state = self.state.lock();
            if let Some(capacity) = self.capacity {
                while state.items.len() >= capacity && !state.closed {
                    self.not_full.wait(&mut state);
                }
            }
            if state.closed {
                return Err(item);
            }
            state.items.push_back(item);
            self.pushed.fetch_add(1, Ordering::Relaxed);
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the front item, blocking until one is available.
    ///
    /// Only a push can release this call; closing the queue does not. Use
    /// [`pop_until_closed`](Self::pop_until_closed) or
    /// [`pop_cancellable`](Self::pop_cancellable) when the consumer must be
    /// stoppable.
    #[must_use]
    pub fn pop_blocking(&self) -> T {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = self.take_front(&mut state) {
                drop(state);
                self.after_pop();
                return item;
            }
            // Woken without an item (spurious or stolen): wait again.
            self.not_empty.wait(&mut state);
        }
    }

    /// Removes the front item if there is one.
    #[must_use]
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        let item = self.take_front(&mut state);
        drop(state);
        if item.is_some() {
            self.after_pop();
        }
        item
    }

    /// Removes the front item, waiting at most `timeout` for one.
    #[must_use]
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(item) = self.take_front(&mut state) {
                drop(state);
                self.after_pop();
                return Some(item);
            }
            if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                let item = self.take_front(&mut state);
                drop(state);
                if item.is_some() {
                    self.after_pop();
                }
                return item;
            }
        }
    }

    /// Removes the front item unless `token` is cancelled first.
    ///
    /// The token is checked before every pop attempt, so a cancelled token
    /// wins over queued items. A consumer blocked here notices cancellation
    /// within the configured poll interval.
    #[must_use]
    pub fn pop_cancellable(&self, token: &CancellationToken) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if token.is_cancelled() {
                // The wake that got us here may have been meant for an item
                // we are leaving behind: hand it to the next waiter.
                let pending = !state.items.is_empty();
                drop(state);
                if pending {
                    self.not_empty.notify_one();
                }
                return None;
            }
            if let Some(item) = self.take_front(&mut state) {
                drop(state);
                self.after_pop();
                return Some(item);
            }
            let _ = self.not_empty.wait_for(&mut state, self.cancel_poll);
        }
    }

    /// Removes the front item, blocking until one arrives or the queue is
    /// closed and drained.
    ///
    /// Items pushed before [`close`](Self::close) are still delivered.
    #[must_use]
    pub fn pop_until_closed(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = self.take_front(&mut state) {
                drop(state);
                self.after_pop();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Removes and returns every queued item in FIFO order.
    #[must_use]
    pub fn drain(&self) -> Vec<T> {
        let items: Vec<T> = {
            let mut state = self.state.lock();
            state.items.drain(..).collect()
        };
        if !items.is_empty() {
            self.popped.fetch_add(items.len() as u64, Ordering::Relaxed);
            self.not_full.notify_all();
        }
        items
    }

    /// Marks the queue closed and wakes every waiter.
    ///
    /// Consumers in [`pop_until_closed`](Self::pop_until_closed) finish once
    /// the remaining items are gone; blocked bounded producers are released.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        tracing::debug!("shared queue closed");
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Returns the number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Returns the capacity of a bounded queue.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Returns traffic counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let pending = self.len();
        QueueStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            pending,
        }
    }

    /// Pops under the lock and counts it. Caller holds the lock.
    fn take_front(&self, state: &mut State<T>) -> Option<T> {
        let item = state.items.pop_front();
        if item.is_some() {
            self.popped.fetch_add(1, Ordering::Relaxed);
        }
        item
    }

    /// Wakes a blocked producer after the lock has been released.
    #[inline]
    fn after_pop(&self) {
        if self.capacity.is_some() {
            self.not_full.notify_one();
        }
    }
}

impl<T> Default for SharedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SharedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SharedQueue")
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .field("capacity", &self.capacity)
            .finish()
    }
}
