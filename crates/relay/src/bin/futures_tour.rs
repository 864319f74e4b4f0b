//! # Futures Tour
//!
//! Walks through the result-channel primitives one at a time:
//! async and deferred launch, an explicit promise, a broken promise, a
//! reported failure and a shared future read by several threads.

use relay_core::{channel, spawn, Launch, SyncError, WaitStatus};
use std::thread;
use std::time::Duration;

fn factorial(n: u64) -> u64 {
    (2..=n).product()
}

fn main() -> Result<(), SyncError> {
    println!("=== FUTURES TOUR ===");
    println!("main thread: {:?}", thread::current().id());
    println!();

    // Async: runs right away on its own thread.
    let async_future = spawn(Launch::Async, || {
        println!("  [async] running on {:?}", thread::current().id());
        factorial(10)
    });
    println!("1. async factorial(10) = {}", async_future.get()?);

    // Deferred: nothing runs until someone asks.
    let deferred = spawn(Launch::Deferred, || {
        println!("  [deferred] running on {:?}", thread::current().id());
        factorial(5)
    });
    println!(
        "2. deferred before get: wait_for -> {:?}",
        deferred.wait_for(Duration::ZERO)
    );
    println!("   deferred factorial(5) = {}", deferred.get()?);

    // Promise fulfilled from another thread.
    let (promise, future) = channel::<String>();
    let worker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        promise.set("computed on a worker".to_string());
    });
    while future.wait_for(Duration::from_millis(10)) == WaitStatus::Timeout {
        println!("3. still waiting...");
    }
    println!("   promise delivered: {}", future.get()?);
    worker
        .join()
        .map_err(|_| SyncError::TaskFailed("promise worker panicked".into()))?;

    // Broken promise: the writer goes away without a value.
    let (promise, future) = channel::<u32>();
    drop(promise);
    match future.get() {
        Err(SyncError::BrokenChannel) => println!("4. broken promise reported as expected"),
        other => println!("4. unexpected: {other:?}"),
    }

    // Failure delivered instead of a value.
    let (promise, future) = channel::<u32>();
    promise.set_error("input out of range");
    match future.get() {
        Err(e) => println!("5. failure reported: {e}"),
        Ok(v) => println!("5. unexpected value {v}"),
    }

    // Shared future: every reader sees the same value.
    let (promise, future) = channel::<u64>();
    let shared = future.share();
    let readers: Vec<_> = (0..3)
        .map(|i| {
            let shared = shared.clone();
            thread::spawn(move || {
                let value = shared.get();
                println!("  [reader {i}] got {value:?}");
            })
        })
        .collect();
    promise.set(factorial(6));
    for (i, reader) in readers.into_iter().enumerate() {
        if reader.join().is_err() {
            return Err(SyncError::TaskFailed(format!("reader {i} panicked")));
        }
    }
    println!("6. shared future value = {}", shared.get()?);

    Ok(())
}
