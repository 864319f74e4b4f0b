//! # RELAY Core
//!
//! Handoff primitives for preemptive OS threads:
//! - [`SharedQueue`]: monitor-style FIFO work queue
//! - [`Promise`] / [`Future`] / [`SharedFuture`]: single-assignment result channel
//! - [`PackagedTask`] and [`spawn`]: run a callable, deliver its result
//! - [`lock_both`] / [`lock_all`] / [`LockPair`]: deadlock-free multi-lock
//!
//! ## Rules
//!
//! 1. **No ambient globals** - every primitive is constructed and shared via `Arc`
//! 2. **Predicate loops** - every condition wait re-checks its predicate
//! 3. **All or none** - two locks are acquired as one step
//!
//! ## Example
//!
//! ```rust
//! use relay_core::{spawn, Launch, SharedQueue};
//! use std::sync::Arc;
//!
//! let queue = Arc::new(SharedQueue::<i32>::new());
//! let consumer = {
//!     let queue = Arc::clone(&queue);
//!     spawn(Launch::Async, move || queue.pop_blocking() * 2)
//! };
//! queue.push(21);
//! assert_eq!(consumer.get(), Ok(42));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod sync;
pub mod task;

pub use config::{QueueConfig, Validate, WorkerPoolConfig};
pub use error::{SyncError, SyncResult};
pub use sync::{
    channel, lock_all, lock_both, lock_both_from, try_lock_both_for, CancellationToken, Future,
    LockPair, Promise, QueueStats, SharedFuture, SharedQueue, StartWith, WaitStatus,
};
pub use task::{spawn, Launch, PackagedTask};
