//! # Atomic Multi-Lock Acquisition
//!
//! Taking two locks one after the other, in an order that differs between
//! call sites, is the classic lock-order deadlock:
//!
//! ```text
//!   Thread 1: lock(A) ──────────> lock(B)  (waits for thread 2)
//!   Thread 2: lock(B) ──────────> lock(A)  (waits for thread 1)
//! ```
//!
//! Everything here acquires a set of locks as one step. A thread blocks on
//! at most one lock at a time and never while holding another: it blocks on
//! one, *tries* the rest, and if any is contended it releases everything and
//! starts over by blocking on the contended lock. The argument order does
//! not matter.

use parking_lot::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Which lock of a pair is blocked on first. Only a scheduling hint: the
/// guards come back in the same positions either way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StartWith {
    /// Block on the first lock, try the second.
    #[default]
    First,
    /// Block on the second lock, try the first.
    Second,
}

impl StartWith {
    const fn flip(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

fn assert_distinct<A, B>(a: &Mutex<A>, b: &Mutex<B>) {
    let a = (a as *const Mutex<A>).cast::<()>();
    let b = (b as *const Mutex<B>).cast::<()>();
    assert!(!std::ptr::eq(a, b), "the same mutex was passed twice");
}

/// Locks `a` and `b` together, whatever order other threads use.
///
/// # Panics
///
/// Panics if `a` and `b` are the same mutex.
///
/// ```rust
/// use parking_lot::Mutex;
/// use relay_core::lock_both;
///
/// let a = Mutex::new(1);
/// let b = Mutex::new(2);
/// let (mut ga, gb) = lock_both(&a, &b);
/// *ga += *gb;
/// assert_eq!(*ga, 3);
/// ```
pub fn lock_both<'a, A, B>(a: &'a Mutex<A>, b: &'a Mutex<B>) -> (MutexGuard<'a, A>, MutexGuard<'a, B>) {
    lock_both_from(a, b, StartWith::First)
}

/// [`lock_both`] with an explicit first lock to block on.
///
/// # Panics
///
/// Panics if `a` and `b` are the same mutex.
pub fn lock_both_from<'a, A, B>(
    a: &'a Mutex<A>,
    b: &'a Mutex<B>,
    start: StartWith,
) -> (MutexGuard<'a, A>, MutexGuard<'a, B>) {
    assert_distinct(a, b);
    let mut start = start;
    loop {
        match start {
            StartWith::First => {
                let ga = a.lock();
                if let Some(gb) = b.try_lock() {
                    return (ga, gb);
                }
            }
            StartWith::Second => {
                let gb = b.lock();
                if let Some(ga) = a.try_lock() {
                    return (ga, gb);
                }
            }
        }
        // Everything is released here; block on the lock that was busy.
        start = start.flip();
        thread::yield_now();
    }
}

/// Like [`lock_both`] but gives up once `timeout` has elapsed.
///
/// Returns `None` without holding either lock if the pair could not be
/// acquired in time.
///
/// # Panics
///
/// Panics if `a` and `b` are the same mutex.
#[must_use]
pub fn try_lock_both_for<'a, A, B>(
    a: &'a Mutex<A>,
    b: &'a Mutex<B>,
    timeout: Duration,
) -> Option<(MutexGuard<'a, A>, MutexGuard<'a, B>)> {
    assert_distinct(a, b);
    let deadline = Instant::now() + timeout;
    let mut start = StartWith::First;
    loop {
        match start {
            StartWith::First => {
                let ga = a.try_lock_until(deadline)?;
                if let Some(gb) = b.try_lock() {
                    return Some((ga, gb));
                }
            }
            StartWith::Second => {
                let gb = b.try_lock_until(deadline)?;
                if let Some(ga) = a.try_lock() {
                    return Some((ga, gb));
                }
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        start = start.flip();
        thread::yield_now();
    }
}

/// Locks every mutex in `locks` together. Guards are returned in input
/// order.
///
/// # Panics
///
/// Panics if the same mutex appears twice.
pub fn lock_all<'a, T>(locks: &[&'a Mutex<T>]) -> Vec<MutexGuard<'a, T>> {
    for (i, a) in locks.iter().enumerate() {
        for b in &locks[i + 1..] {
            assert_distinct(*a, *b);
        }
    }
    let n = locks.len();
    if n == 0 {
        return Vec::new();
    }

    let mut start = 0;
    let mut rounds = 0u32;
    loop {
        let mut guards: Vec<Option<MutexGuard<'a, T>>> = (0..n).map(|_| None).collect();
        guards[start] = Some(locks[start].lock());

        let contended = (1..n).map(|offset| (start + offset) % n).find(|&i| {
            match locks[i].try_lock() {
                Some(guard) => {
                    guards[i] = Some(guard);
                    false
                }
                None => true,
            }
        });

        match contended {
            None => return guards.into_iter().flatten().collect(),
            Some(busy) => {
                drop(guards);
                rounds += 1;
                tracing::trace!(rounds, busy, "lock_all backing off");
                start = busy;
                thread::yield_now();
            }
        }
    }
}

/// Two independently locked values that can only be locked together.
///
/// There is no way to lock just one of them, so no call site can acquire
/// the pair in the wrong order.
///
/// ```rust
/// use relay_core::LockPair;
///
/// let pair = LockPair::new(Vec::<u8>::new(), 0usize);
/// pair.with(|bytes, count| {
///     bytes.push(1);
///     *count += 1;
/// });
/// assert_eq!(pair.into_inner(), (vec![1], 1));
/// ```
#[derive(Debug, Default)]
pub struct LockPair<A, B> {
    first: Mutex<A>,
    second: Mutex<B>,
}

impl<A, B> LockPair<A, B> {
    /// Wraps two values.
    #[must_use]
    pub fn new(first: A, second: B) -> Self {
        Self {
            first: Mutex::new(first),
            second: Mutex::new(second),
        }
    }

    /// Locks both values.
    pub fn lock(&self) -> (MutexGuard<'_, A>, MutexGuard<'_, B>) {
        lock_both_from(&self.first, &self.second, StartWith::First)
    }

    /// Locks both values, blocking on `start` first.
    pub fn lock_from(&self, start: StartWith) -> (MutexGuard<'_, A>, MutexGuard<'_, B>) {
        lock_both_from(&self.first, &self.second, start)
    }

    /// Locks both values, giving up after `timeout`.
    #[must_use]
    pub fn try_lock_for(&self, timeout: Duration) -> Option<(MutexGuard<'_, A>, MutexGuard<'_, B>)> {
        try_lock_both_for(&self.first, &self.second, timeout)
    }

    /// Runs `f` with both values locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut A, &mut B) -> R) -> R {
        let (mut first, mut second) = self.lock();
        f(&mut first, &mut second)
    }

    /// Mutable access without locking (requires exclusive ownership).
    pub fn get_mut(&mut self) -> (&mut A, &mut B) {
        (self.first.get_mut(), self.second.get_mut())
    }

    /// Consumes the pair, returning the values.
    pub fn into_inner(self) -> (A, B) {
        (self.first.into_inner(), self.second.into_inner())
    }
}
