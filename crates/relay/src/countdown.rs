//! # Countdown Scenario
//!
//! The canonical producer/consumer run:
//!
//! ```text
//!   producer thread            SharedQueue             consumer thread
//!   start, .., 2, 1  ──push──>  [ ... ]  ──pop_blocking──>  stop after 1
//!        (one per interval)                                    │
//!                                                              │ crossbeam
//!                                                              ▼
//!                                                   caller observes values
//! ```
//!
//! The consumer reports each value it takes over a `crossbeam-channel`, so the
//! caller sees the sequence live while both threads are still running.

use crate::consumer::Consumer;
use crate::producer::Producer;
use relay_core::config::{from_toml_file, Validate};
use relay_core::{QueueConfig, QueueStats, SharedQueue, SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Configuration for the countdown run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountdownConfig {
    /// First value pushed. The producer counts down to 1.
    pub start: u32,
    /// Pause between pushes (ms).
    pub interval_ms: u64,
    /// The queue between the two threads.
    pub queue: QueueConfig,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            start: 10,
            interval_ms: 1000,
            queue: QueueConfig::unbounded(),
        }
    }
}

impl CountdownConfig {
    /// Same sequence with no pacing. For tests.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            start: 10,
            interval_ms: 0,
            queue: QueueConfig::unbounded(),
        }
    }

    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfig`] if the file is unreadable or invalid.
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        from_toml_file(path)
    }

    /// Pause between pushes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Validate for CountdownConfig {
    fn validate(&self) -> SyncResult<()> {
        if self.start == 0 {
            return Err(SyncError::InvalidConfig(
                "countdown start must be at least 1".into(),
            ));
        }
        self.queue.validate()
    }
}

/// What a finished countdown observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountdownReport {
    /// Values in the order the consumer took them.
    pub observed: Vec<u32>,
    /// Values the producer pushed.
    pub pushed: usize,
    /// Wall time of the whole run.
    pub elapsed: Duration,
    /// Queue counters at the end of the run.
    pub stats: QueueStats,
}

/// Runs the countdown and collects what the consumer saw.
///
/// # Errors
///
/// See [`run_with`].
pub fn run(config: &CountdownConfig) -> SyncResult<CountdownReport> {
    run_with(config, |_| {})
}

/// Runs the countdown, calling `on_value` on the caller's thread for every
/// value as soon as the consumer reports it.
///
/// # Errors
///
/// - [`SyncError::InvalidConfig`] for an invalid `config`
/// - [`SyncError::ThreadSpawn`] if either thread could not be started
/// - [`SyncError::TaskFailed`] if either thread panicked
pub fn run_with<F>(config: &CountdownConfig, mut on_value: F) -> SyncResult<CountdownReport>
where
    F: FnMut(u32),
{
    config.validate()?;
    let started = Instant::now();
    let queue = Arc::new(SharedQueue::with_config(&config.queue));
    let (tx, rx) = crossbeam_channel::unbounded();

    tracing::info!(start = config.start, interval_ms = config.interval_ms, "countdown starting");

    let consumer = Consumer::new(Arc::clone(&queue)).spawn_until(
        |&value| value == 1,
        move |value| {
            tracing::debug!(value, "consumer took value");
            // The receiver outlives this thread unless the caller panicked.
            let _ = tx.send(value);
        },
    )?;
    let producer = Producer::new(Arc::clone(&queue))
        .with_interval(config.interval())
        .spawn((1..=config.start).rev())?;

    // Ends when the consumer thread exits and drops its sender.
    let mut observed = Vec::with_capacity(config.start as usize);
    for value in rx {
        on_value(value);
        observed.push(value);
    }

    let pushed = join(producer, "producer")?;
    join(consumer, "consumer")?;

    let report = CountdownReport {
        observed,
        pushed,
        elapsed: started.elapsed(),
        stats: queue.stats(),
    };
    tracing::info!(elapsed = ?report.elapsed, "countdown finished");
    Ok(report)
}

fn join(handle: JoinHandle<usize>, role: &str) -> SyncResult<usize> {
    handle
        .join()
        .map_err(|_| SyncError::TaskFailed(format!("{role} thread panicked")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::config::from_toml_str;

    #[test]
    fn test_fast_countdown_sequence() {
        let report = run(&CountdownConfig::fast()).unwrap();
        assert_eq!(report.observed, (1..=10).rev().collect::<Vec<_>>());
        assert_eq!(report.pushed, 10);
        assert_eq!(report.stats.pushed, 10);
        assert_eq!(report.stats.popped, 10);
        assert_eq!(report.stats.pending, 0);
    }

    #[test]
    fn test_on_value_sees_every_value() {
        let mut seen = Vec::new();
        let config = CountdownConfig {
            start: 3,
            ..CountdownConfig::fast()
        };
        run_with(&config, |v| seen.push(v)).unwrap();
        assert_eq!(seen, vec![3, 2, 1]);
    }

    #[test]
    fn test_paced_countdown_takes_time() {
        let config = CountdownConfig {
            start: 4,
            interval_ms: 10,
            queue: QueueConfig::bounded(1),
        };
        let report = run(&config).unwrap();
        assert_eq!(report.observed, vec![4, 3, 2, 1]);
        assert!(report.elapsed >= Duration::from_millis(30));
    }

    #[test]
    fn test_zero_start_rejected() {
        let config = CountdownConfig {
            start: 0,
            ..CountdownConfig::fast()
        };
        assert!(matches!(run(&config), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_from_toml() {
        let config: CountdownConfig = from_toml_str("start = 5\ninterval_ms = 2").unwrap();
        assert_eq!(config.start, 5);
        assert_eq!(config.interval(), Duration::from_millis(2));
        assert_eq!(config.queue, QueueConfig::unbounded());
    }
}
