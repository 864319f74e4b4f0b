//! # Configuration
//!
//! Every tunable of the primitives lives in a plain struct that can be built
//! in code (`Default`, `const fn` presets) or loaded once at startup from a
//! TOML file.
//!
//! ```toml
//! capacity = 1024
//! cancel_poll_ms = 5
//! ```

use crate::error::{SyncError, SyncResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Implemented by config structs that have invariants beyond their types.
pub trait Validate {
    /// Checks the invariants, returning `SyncError::InvalidConfig` on failure.
    fn validate(&self) -> SyncResult<()>;
}

/// Parses and validates a config from TOML text.
pub fn from_toml_str<C>(text: &str) -> SyncResult<C>
where
    C: DeserializeOwned + Validate,
{
    let config: C = toml::from_str(text).map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Reads, parses and validates a config file.
pub fn from_toml_file<C>(path: impl AsRef<Path>) -> SyncResult<C>
where
    C: DeserializeOwned + Validate,
{
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        SyncError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
    })?;
    from_toml_str(&text)
}

/// Configuration for a [`SharedQueue`](crate::SharedQueue).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of queued items. `None` means unbounded.
    pub capacity: Option<usize>,
    /// How often a cancellable wait re-checks its token (ms).
    pub cancel_poll_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            cancel_poll_ms: 10,
        }
    }
}

impl QueueConfig {
    /// Unbounded queue with the default poll interval.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            capacity: None,
            cancel_poll_ms: 10,
        }
    }

    /// Bounded queue: producers block (or get their item back) when full.
    #[must_use]
    pub const fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            cancel_poll_ms: 10,
        }
    }

    /// Poll interval as a `Duration`.
    #[must_use]
    pub const fn cancel_poll(&self) -> Duration {
        Duration::from_millis(self.cancel_poll_ms)
    }
}

impl Validate for QueueConfig {
    fn validate(&self) -> SyncResult<()> {
        if self.capacity == Some(0) {
            return Err(SyncError::InvalidConfig(
                "queue capacity must be greater than zero".into(),
            ));
        }
        if self.cancel_poll_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "cancel_poll_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for a pool of worker threads draining a job queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Prefix for worker thread names (`{prefix}-{index}`).
    pub thread_name: String,
    /// The job queue.
    pub queue: QueueConfig,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get),
            thread_name: "relay-worker".into(),
            queue: QueueConfig::default(),
        }
    }
}

impl WorkerPoolConfig {
    /// A single worker: jobs run strictly in submission order.
    #[must_use]
    pub fn single() -> Self {
        Self {
            workers: 1,
            ..Self::default()
        }
    }
}

impl Validate for WorkerPoolConfig {
    fn validate(&self) -> SyncResult<()> {
        if self.workers == 0 {
            return Err(SyncError::InvalidConfig(
                "worker pool needs at least one worker".into(),
            ));
        }
        if self.thread_name.is_empty() {
            return Err(SyncError::InvalidConfig("thread_name must not be empty".into()));
        }
        self.queue.validate()
    }
}
