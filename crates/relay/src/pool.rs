//! # Worker Pool
//!
//! A task queue of packaged tasks: `submit` wraps a closure in a
//! [`PackagedTask`], pushes it onto a [`SharedQueue`] and hands back the
//! [`Future`] for its result. Worker threads pop jobs with
//! `pop_until_closed` and run them.
//!
//! ```text
//!   submit(f) ──> PackagedTask ──push──> [SharedQueue<Job>] ──> worker-0
//!        │                                                 ├──> worker-1
//!        └──> Future<T>  <──── result delivered by run() ──┴──> worker-N
//! ```
//!
//! Shutdown closes the queue: jobs already queued still run, later
//! submissions resolve to [`SyncError::BrokenChannel`].

use parking_lot::Mutex;
use relay_core::{
    Future, PackagedTask, SharedQueue, SyncError, SyncResult, Validate, WorkerPoolConfig,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send>;

/// Pool counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Jobs accepted by `submit`.
    pub submitted: u64,
    /// Jobs that returned normally.
    pub completed: u64,
    /// Jobs that panicked.
    pub failed: u64,
    /// Submissions refused because the pool was shut down.
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

/// Counts a job as completed or failed when it goes out of scope.
struct Outcome<'a>(&'a Counters);

impl Drop for Outcome<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.0.completed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Fixed set of worker threads draining one job queue.
///
/// ```rust
/// use relay::WorkerPool;
/// use relay_core::WorkerPoolConfig;
///
/// let pool = WorkerPool::new(&WorkerPoolConfig::single()).unwrap();
/// let answer = pool.submit(|| 6 * 7);
/// assert_eq!(answer.get(), Ok(42));
/// ```
pub struct WorkerPool {
    queue: Arc<SharedQueue<Job>>,
    counters: Arc<Counters>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Validates `config` and starts its worker threads.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidConfig`] for an invalid `config`
    /// - [`SyncError::ThreadSpawn`] if a worker could not be started; the
    ///   workers already running are shut down first
    pub fn new(config: &WorkerPoolConfig) -> SyncResult<Self> {
        config.validate()?;

        let pool = Self {
            queue: Arc::new(SharedQueue::with_config(&config.queue)),
            counters: Arc::new(Counters::default()),
            workers: Mutex::new(Vec::with_capacity(config.workers)),
        };

        for index in 0..config.workers {
            let queue = Arc::clone(&pool.queue);
            let spawned = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name))
                .spawn(move || work(&queue));
            match spawned {
                Ok(handle) => pool.workers.lock().push(handle),
                Err(e) => {
                    // Dropping `pool` joins the workers started so far.
                    return Err(SyncError::ThreadSpawn(e.to_string()));
                }
            }
        }

        tracing::info!(workers = config.workers, name = %config.thread_name, "worker pool started");
        Ok(pool)
    }

    /// Queues `f` and returns the future for its result.
    ///
    /// A panic inside `f` resolves the future to [`SyncError::TaskFailed`].
    /// After [`shutdown`](Self::shutdown) the job is dropped unrun and the
    /// future resolves to [`SyncError::BrokenChannel`].
    pub fn submit<F, T>(&self, f: F) -> Future<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let counters = Arc::clone(&self.counters);
        let (task, future) = PackagedTask::new(move || {
            let _outcome = Outcome(&*counters);
            f()
        });

        // Blocks while a bounded queue is full. Shutdown closes the queue,
        // which releases this call with the job handed back.
        match self.queue.push_unless_closed(Box::new(move || task.run())) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(job) => {
                drop(job);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("job submitted after shutdown, dropping it");
            }
        }
        future
    }

    /// Jobs queued but not yet picked up by a worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Returns true once [`shutdown`](Self::shutdown) has started.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.queue.is_closed()
    }

    /// Stops accepting jobs, lets the workers finish the queued ones and
    /// joins them. Calling it again is a no-op.
    pub fn shutdown(&self) {
        self.queue.close();

        let workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }
        let count = workers.len();
        for handle in workers {
            // Jobs catch their own panics, so a worker only dies on a bug in
            // the pool itself.
            if handle.join().is_err() {
                tracing::warn!("worker thread panicked");
            }
        }
        tracing::info!(workers = count, stats = ?self.stats(), "worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.lock().len())
            .field("pending", &self.pending())
            .field("stats", &self.stats())
            .finish()
    }
}

fn work(queue: &SharedQueue<Job>) {
    while let Some(job) = queue.pop_until_closed() {
        job();
    }
    tracing::trace!("worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::QueueConfig;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn config(workers: usize) -> WorkerPoolConfig {
        WorkerPoolConfig {
            workers,
            thread_name: "test-worker".into(),
            queue: QueueConfig::unbounded(),
        }
    }

    #[test]
    fn test_submit_returns_result() {
        let pool = WorkerPool::new(&config(2)).unwrap();
        let future = pool.submit(|| "done".to_string());
        assert_eq!(future.get(), Ok("done".to_string()));
    }

    #[test]
    fn test_single_worker_runs_in_order() {
        let pool = WorkerPool::new(&WorkerPoolConfig::single()).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let futures: Vec<_> = (0..20)
            .map(|i| {
                let order = Arc::clone(&order);
                pool.submit(move || order.lock().push(i))
            })
            .collect();
        for f in futures {
            f.get().unwrap();
        }
        assert_eq!(*order.lock(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_job_fails_its_future_only() {
        let pool = WorkerPool::new(&config(1)).unwrap();
        let bad = pool.submit(|| -> u8 { panic!("bad job") });
        let good = pool.submit(|| 7u8);
        assert_eq!(bad.get(), Err(SyncError::TaskFailed("bad job".into())));
        assert_eq!(good.get(), Ok(7));
        pool.shutdown();
        let stats = pool.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn test_submit_after_shutdown_breaks_channel() {
        let pool = WorkerPool::new(&config(1)).unwrap();
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert_eq!(pool.submit(|| 1).get(), Err(SyncError::BrokenChannel));
        assert_eq!(pool.stats().rejected, 1);
        assert_eq!(pool.stats().submitted, 0);
    }

    #[test]
    fn test_shutdown_runs_queued_jobs() {
        let pool = WorkerPool::new(&config(1)).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let ran = Arc::clone(&ran);
            drop(pool.submit(move || {
                thread::sleep(Duration::from_millis(2));
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 5);
        assert_eq!(pool.pending(), 0);
    }

    #[test]
    fn test_shutdown_while_job_submits_to_full_queue() {
        let pool = Arc::new(
            WorkerPool::new(&WorkerPoolConfig {
                workers: 1,
                thread_name: "nested".into(),
                queue: QueueConfig::bounded(1),
            })
            .unwrap(),
        );

        // The only worker sleeps, then submits back into its own pool.
        let inner = Arc::clone(&pool);
        let nested = pool.submit(move || {
            thread::sleep(Duration::from_millis(60));
            inner.submit(|| 1u8)
        });
        thread::sleep(Duration::from_millis(10));
        let queued = pool.submit(|| 2u8);
        let blocked = {
            let pool = Arc::clone(&pool);
            relay_core::spawn(relay_core::Launch::Async, move || pool.submit(|| 3u8))
        };
        thread::sleep(Duration::from_millis(10));

        let stopper = {
            let pool = Arc::clone(&pool);
            relay_core::spawn(relay_core::Launch::Async, move || pool.shutdown())
        };
        assert_eq!(stopper.get_timeout(Duration::from_secs(3)), Ok(()));

        assert_eq!(queued.get(), Ok(2));
        let blocked = blocked.get_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(blocked.get(), Ok(3) | Err(SyncError::BrokenChannel)));
        let nested = nested.get().unwrap();
        assert_eq!(nested.get(), Err(SyncError::BrokenChannel));

        let stats = pool.stats();
        assert_eq!(stats.submitted + stats.rejected, 4);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = WorkerPool::new(&config(2)).unwrap();
        pool.shutdown();
        pool.shutdown();
        drop(pool);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = WorkerPool::new(&config(0)).unwrap_err();
        assert!(matches!(err, SyncError::InvalidConfig(_)));
    }
}
