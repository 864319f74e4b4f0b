//! # Consumer
//!
//! Drains a shared queue. Every item is handed to the processing closure
//! after `pop_*` has returned, i.e. with the queue lock already released.

use relay_core::{CancellationToken, SharedQueue, SyncError, SyncResult};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Pulls items from a [`SharedQueue`] and processes them.
#[derive(Debug)]
pub struct Consumer<T> {
    queue: Arc<SharedQueue<T>>,
}

impl<T> Consumer<T> {
    /// Creates a consumer for `queue`.
    #[must_use]
    pub fn new(queue: Arc<SharedQueue<T>>) -> Self {
        Self { queue }
    }

    /// Blocks on the queue and processes items until `is_last` accepts one.
    /// The last item is processed too. Returns the number processed.
    pub fn run_until<P, F>(&self, mut is_last: P, mut process: F) -> usize
    where
        P: FnMut(&T) -> bool,
        F: FnMut(T),
    {
        let mut processed = 0;
        loop {
            let item = self.queue.pop_blocking();
            let last = is_last(&item);
            process(item);
            processed += 1;
            if last {
                return processed;
            }
        }
    }

    /// Processes items until the queue is closed and drained.
    pub fn run_until_closed<F>(&self, mut process: F) -> usize
    where
        F: FnMut(T),
    {
        let mut processed = 0;
        while let Some(item) = self.queue.pop_until_closed() {
            process(item);
            processed += 1;
        }
        processed
    }

    /// Processes items until `token` is cancelled.
    pub fn run_cancellable<F>(&self, token: &CancellationToken, mut process: F) -> usize
    where
        F: FnMut(T),
    {
        let mut processed = 0;
        while let Some(item) = self.queue.pop_cancellable(token) {
            process(item);
            processed += 1;
        }
        processed
    }
}

impl<T: Send + 'static> Consumer<T> {
    /// Runs [`run_until`](Self::run_until) on a new thread named
    /// `relay-consumer`.
    ///
    /// # Errors
    ///
    /// [`SyncError::ThreadSpawn`] if the thread could not be started.
    pub fn spawn_until<P, F>(self, is_last: P, process: F) -> SyncResult<JoinHandle<usize>>
    where
        P: FnMut(&T) -> bool + Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        thread::Builder::new()
            .name("relay-consumer".into())
            .spawn(move || self.run_until(is_last, process))
            .map_err(|e| SyncError::ThreadSpawn(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_run_until_stops_at_last() {
        let queue = Arc::new(SharedQueue::new());
        for n in [5, 4, 1, 9] {
            queue.push(n);
        }
        let mut seen = Vec::new();
        let count = Consumer::new(Arc::clone(&queue)).run_until(|&n| n == 1, |n| seen.push(n));
        assert_eq!(count, 3);
        assert_eq!(seen, vec![5, 4, 1]);
        // Items after the last one stay queued.
        assert_eq!(queue.drain(), vec![9]);
    }

    #[test]
    fn test_run_until_closed_drains() {
        let queue = Arc::new(SharedQueue::new());
        queue.push('a');
        queue.push('b');
        queue.close();
        let mut seen = String::new();
        let count = Consumer::new(queue).run_until_closed(|c| seen.push(c));
        assert_eq!(count, 2);
        assert_eq!(seen, "ab");
    }

    #[test]
    fn test_run_cancellable_exits() {
        let queue: Arc<SharedQueue<u8>> = Arc::new(SharedQueue::new());
        let token = CancellationToken::new();
        let consumer = Consumer::new(Arc::clone(&queue));
        let handle = {
            let token = token.clone();
            std::thread::spawn(move || consumer.run_cancellable(&token, drop))
        };
        queue.push(1);
        std::thread::sleep(Duration::from_millis(30));
        token.cancel();
        assert_eq!(handle.join().unwrap(), 1);
    }
}
