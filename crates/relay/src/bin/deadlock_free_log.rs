//! # Deadlock-Free Log Demo
//!
//! Two threads write to the same pair of log files, naming the files in
//! opposite order. Both acquisitions go through one all-or-none lock step,
//! so the run always finishes.
//!
//! Usage: `deadlock_free_log [dir]` (defaults to the system temp directory)

use relay::{DualSinkLog, LogTarget, SyncLog};
use relay_core::SyncError;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use std::thread;

const LINES: usize = 1_000;

fn open(path: &Path) -> Result<File, SyncError> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| SyncError::InvalidConfig(format!("cannot open {}: {e}", path.display())))
}

fn main() -> Result<(), SyncError> {
    let dir = std::env::args()
        .nth(1)
        .map_or_else(std::env::temp_dir, Into::into);
    let first_path = dir.join("relay-log-1.txt");
    let second_path = dir.join("relay-log-2.txt");

    println!("=== DEADLOCK-FREE LOG ===");
    println!("  Sinks: {} and {}", first_path.display(), second_path.display());
    println!("  Lines: {LINES} per thread");
    println!();

    let log = Arc::new(DualSinkLog::new(open(&first_path)?, open(&second_path)?));
    let writers: Vec<_> = [true, false]
        .into_iter()
        .enumerate()
        .map(|(index, primary_first)| {
            let log = Arc::clone(&log);
            thread::spawn(move || -> std::io::Result<()> {
                for i in 0..LINES {
                    let line = format!("thread{}: {i}", index + 1);
                    if primary_first {
                        log.log_primary_first(&line)?;
                    } else {
                        log.log_secondary_first(&line)?;
                    }
                }
                Ok(())
            })
        })
        .collect();

    for (index, writer) in writers.into_iter().enumerate() {
        match writer.join() {
            Ok(Ok(())) => println!("writer {} finished", index + 1),
            Ok(Err(e)) => println!("writer {} failed: {e}", index + 1),
            Err(_) => return Err(SyncError::TaskFailed(format!("writer {} panicked", index + 1))),
        }
    }
    if let Err(e) = log.flush() {
        println!("flush failed: {e}");
    }

    // One more line through a lazily opened single-sink log.
    let summary = SyncLog::new(LogTarget::Stdout);
    if let Err(e) = summary.log(&format!("done: {} lines in each sink", 2 * LINES)) {
        println!("summary failed: {e}");
    }
    Ok(())
}
