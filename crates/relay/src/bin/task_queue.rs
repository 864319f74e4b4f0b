//! # Task Queue Demo
//!
//! Packaged tasks queued on a worker pool. The main thread submits a batch of
//! jobs, one of which panics, then collects every result through its future.

use relay::WorkerPool;
use relay_core::{SyncError, WorkerPoolConfig};
use std::thread;
use std::time::Duration;

const JOBS: u64 = 8;

fn main() -> Result<(), SyncError> {
    let config = WorkerPoolConfig {
        workers: 3,
        ..WorkerPoolConfig::default()
    };
    let pool = WorkerPool::new(&config)?;

    println!("=== TASK QUEUE ===");
    println!("  Workers:  {}", config.workers);
    println!("  Jobs:     {JOBS}");
    println!();

    let futures: Vec<_> = (1..=JOBS)
        .map(|n| {
            pool.submit(move || {
                let name = thread::current().name().unwrap_or("?").to_string();
                thread::sleep(Duration::from_millis(20 * n));
                if n == 5 {
                    panic!("job {n} refuses to run");
                }
                (name, n * n)
            })
        })
        .collect();

    for (n, future) in (1..=JOBS).zip(futures) {
        match future.get() {
            Ok((worker, square)) => println!("job {n}: {square} (on {worker})"),
            Err(e) => println!("job {n}: {e}"),
        }
    }

    pool.shutdown();
    let late = pool.submit(|| 0u64);
    println!();
    println!("after shutdown: {:?}", late.get());

    let stats = pool.stats();
    println!(
        "stats: submitted={} completed={} failed={} rejected={}",
        stats.submitted, stats.completed, stats.failed, stats.rejected
    );
    Ok(())
}
