//! # RELAY
//!
//! Drivers and demos on top of [`relay_core`]:
//! - [`Producer`] / [`Consumer`]: the two ends of a shared work queue
//! - [`countdown`]: the canonical producer/consumer run
//! - [`WorkerPool`]: a task queue of packaged tasks
//! - [`log`]: synchronized single-sink and dual-sink logs
//!
//! ## Example
//!
//! ```rust
//! use relay::countdown::{self, CountdownConfig};
//!
//! let report = countdown::run(&CountdownConfig::fast()).unwrap();
//! assert_eq!(report.observed.first(), Some(&10));
//! assert_eq!(report.observed.last(), Some(&1));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod consumer;
pub mod countdown;
pub mod log;
pub mod pool;
pub mod producer;

pub use consumer::Consumer;
pub use countdown::{CountdownConfig, CountdownReport};
pub use log::{DualSinkLog, LogTarget, MemorySink, SyncLog};
pub use pool::{PoolStats, WorkerPool};
pub use producer::Producer;
