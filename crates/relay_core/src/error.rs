//! # Relay Error Types
//!
//! All recoverable errors that can surface from the handoff primitives.
//!
//! Precondition violations (setting a result twice, passing the same mutex
//! twice to a multi-lock) are not represented here: they panic.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when waiting on or configuring a primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The promise side was dropped before a value was supplied.
    #[error("broken channel: promise dropped before a value was set")]
    BrokenChannel,

    /// The producing task reported a failure instead of a value.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// A bounded wait elapsed before the value became available.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The wait was abandoned because its cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The single-read value has already been taken by another reader.
    #[error("value already retrieved")]
    AlreadyRetrieved,

    /// The OS refused to start a thread.
    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(String),

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for relay operations.
pub type SyncResult<T> = Result<T, SyncError>;
