//! # Producer
//!
//! Pushes a sequence of items onto a shared queue, optionally pacing them.

use relay_core::{CancellationToken, SharedQueue, SyncError, SyncResult};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Feeds items into a [`SharedQueue`].
///
/// ```rust
/// use relay::Producer;
/// use relay_core::SharedQueue;
/// use std::sync::Arc;
///
/// let queue = Arc::new(SharedQueue::new());
/// let pushed = Producer::new(Arc::clone(&queue)).run([3, 2, 1]);
/// assert_eq!(pushed, 3);
/// assert_eq!(queue.drain(), vec![3, 2, 1]);
/// ```
#[derive(Debug)]
pub struct Producer<T> {
    queue: Arc<SharedQueue<T>>,
    interval: Duration,
    token: Option<CancellationToken>,
}

impl<T> Producer<T> {
    /// Creates a producer for `queue` with no pacing.
    #[must_use]
    pub fn new(queue: Arc<SharedQueue<T>>) -> Self {
        Self {
            queue,
            interval: Duration::ZERO,
            token: None,
        }
    }

    /// Sleeps `interval` between consecutive pushes.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stops producing once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Pushes every item in order on the current thread. Returns how many
    /// were pushed before the sequence ended or the token fired.
    pub fn run<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut pushed = 0;
        for item in items {
            if self.is_cancelled() {
                tracing::debug!(pushed, "producer cancelled");
                break;
            }
            if pushed > 0 && !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
            self.queue.push(item);
            pushed += 1;
        }
        pushed
    }

    fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

impl<T: Send + 'static> Producer<T> {
    /// Runs the producer on a new thread named `relay-producer`.
    ///
    /// # Errors
    ///
    /// [`SyncError::ThreadSpawn`] if the thread could not be started.
    pub fn spawn<I>(self, items: I) -> SyncResult<JoinHandle<usize>>
    where
        I: IntoIterator<Item = T> + Send + 'static,
    {
        thread::Builder::new()
            .name("relay-producer".into())
            .spawn(move || self.run(items))
            .map_err(|e| SyncError::ThreadSpawn(e.to_string()))
    }
}
