//! # Countdown Demo
//!
//! A producer pushes 10 down to 1, one value per second; a consumer prints
//! each value as it takes it off the shared queue and stops after 1.
//!
//! Usage: `countdown [config.toml]`
//!
//! ```toml
//! start = 10
//! interval_ms = 1000
//!
//! [queue]
//! capacity = 4
//! ```

use relay::countdown::{self, CountdownConfig};
use relay_core::SyncError;

fn main() -> Result<(), SyncError> {
    let config = match std::env::args().nth(1) {
        Some(path) => CountdownConfig::load(path)?,
        None => CountdownConfig::default(),
    };

    println!("=== COUNTDOWN ===");
    println!("  Start:     {}", config.start);
    println!("  Interval:  {}ms", config.interval_ms);
    match config.queue.capacity {
        Some(capacity) => println!("  Queue:     bounded ({capacity})"),
        None => println!("  Queue:     unbounded"),
    }
    println!();

    let report = countdown::run_with(&config, |value| println!("Value: {value}"))?;

    println!();
    println!("Consumer done after {} values in {:.2?}", report.observed.len(), report.elapsed);
    println!(
        "Queue stats: pushed={} popped={} pending={}",
        report.stats.pushed, report.stats.popped, report.stats.pending
    );
    Ok(())
}
