//! Integration tests for the handoff primitives under real thread
//! contention.
//!
//! Run with: cargo test --package relay_core --test handoff_properties

use parking_lot::Mutex;
use proptest::prelude::*;
use rand::Rng;
use relay_core::{
    channel, lock_all, lock_both, CancellationToken, LockPair, QueueConfig, SharedQueue, StartWith,
    SyncError,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any interleaving of pushes and pops on one thread preserves FIFO order.
    #[test]
    fn prop_interleaved_fifo(ops in proptest::collection::vec(any::<Option<u16>>(), 0..200)) {
        let queue = SharedQueue::new();
        let mut pushed = Vec::new();
        let mut popped = Vec::new();

        for op in ops {
            match op {
                Some(value) => {
                    queue.push(value);
                    pushed.push(value);
                }
                None => {
                    if let Some(value) = queue.try_pop() {
                        popped.push(value);
                    }
                }
            }
        }
        popped.extend(queue.drain());
        prop_assert_eq!(popped, pushed);
    }

    /// A single producer thread and a single consumer thread agree on order.
    #[test]
    fn prop_spsc_fifo(items in proptest::collection::vec(any::<u32>(), 1..100)) {
        let queue = Arc::new(SharedQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            let items = items.clone();
            thread::spawn(move || {
                for item in items {
                    queue.push(item);
                }
            })
        };

        let received: Vec<u32> = (0..items.len()).map(|_| queue.pop_blocking()).collect();
        producer.join().unwrap();
        prop_assert_eq!(received, items);
    }
}

#[test]
fn test_multi_producer_count_preservation() {
    let queue = Arc::new(SharedQueue::bounded(32));
    let producers = 8;
    let per_producer = 2_000;

    let handles: Vec<_> = (0..producers)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for seq in 0..per_producer {
                    queue.push((p, seq));
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(item) = queue.pop_until_closed() {
                    seen.push(item);
                }
                seen
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    queue.close();

    let mut per_consumer = Vec::new();
    for c in consumers {
        per_consumer.push(c.join().unwrap());
    }

    // No loss, no duplication.
    let total: usize = per_consumer.iter().map(Vec::len).sum();
    assert_eq!(total, producers * per_producer);
    let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
    for item in per_consumer.iter().flatten() {
        *counts.entry(*item).or_default() += 1;
    }
    assert_eq!(counts.len(), producers * per_producer);
    assert!(counts.values().all(|&n| n == 1));

    // Per-producer FIFO as seen by each consumer.
    for seen in &per_consumer {
        let mut last: HashMap<usize, usize> = HashMap::new();
        for &(p, seq) in seen {
            if let Some(&prev) = last.get(&p) {
                assert!(seq > prev, "producer {p} reordered: {prev} then {seq}");
            }
            last.insert(p, seq);
        }
    }

    let stats = queue.stats();
    assert_eq!(stats.pushed, stats.popped);
    assert_eq!(stats.pending, 0);
}

#[test]
fn test_mixed_pop_variants_deliver_every_item() {
    const FILLER: u64 = u64::MAX;
    let queue = Arc::new(SharedQueue::with_config(&QueueConfig {
        capacity: Some(8),
        cancel_poll_ms: 1,
    }));
    let token = CancellationToken::new();
    let producers = 4u64;
    let per_producer = 2_000u64;

    let handles: Vec<_> = (0..producers)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for seq in 0..per_producer {
                    queue.push(p * per_producer + seq);
                }
            })
        })
        .collect();

    let until_closed = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(item) = queue.pop_until_closed() {
                seen.push(item);
            }
            seen
        })
    };
    let timed = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut seen = Vec::new();
            loop {
                match queue.pop_timeout(Duration::from_millis(2)) {
                    Some(item) => seen.push(item),
                    None if queue.is_closed() && queue.is_empty() => return seen,
                    None => {}
                }
            }
        })
    };
    let cancellable: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let token = token.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(item) = queue.pop_cancellable(&token) {
                    seen.push(item);
                }
                seen
            })
        })
        .collect();
    // Stops only after taking `blocking_pops` items, fillers included.
    let blocking_pops = 500;
    let blocking = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            (0..blocking_pops)
                .map(|_| queue.pop_blocking())
                .collect::<Vec<_>>()
        })
    };

    thread::sleep(Duration::from_millis(5));
    token.cancel();
    for h in handles {
        h.join().unwrap();
    }
    queue.close();

    let mut seen = Vec::new();
    seen.extend(until_closed.join().unwrap());
    seen.extend(timed.join().unwrap());
    for c in cancellable {
        seen.extend(c.join().unwrap());
    }
    // Every other consumer is gone: feed the blocking one until it finishes.
    while !blocking.is_finished() {
        queue.push(FILLER);
        thread::sleep(Duration::from_millis(1));
    }
    seen.extend(blocking.join().unwrap());
    seen.extend(queue.drain());

    let real: Vec<u64> = seen.into_iter().filter(|&item| item != FILLER).collect();
    let unique: HashSet<u64> = real.iter().copied().collect();
    assert_eq!(real.len(), unique.len(), "an item was delivered twice");
    assert_eq!(unique.len() as u64, producers * per_producer, "an item was lost");
}

#[test]
fn test_broken_channel_releases_every_blocked_reader() {
    let (promise, future) = channel::<u64>();
    let shared = future.share();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || shared.get())
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    drop(promise);

    for reader in readers {
        assert_eq!(reader.join().unwrap(), Err(SyncError::BrokenChannel));
    }
    // A reader arriving later sees the same failure without blocking.
    assert_eq!(shared.get(), Err(SyncError::BrokenChannel));
}

#[test]
fn test_lock_pair_opposite_order_stress() {
    let pair = Arc::new(LockPair::new(0u64, 0u64));
    let rounds = 5;
    let iterations = 2_000;

    for _ in 0..rounds {
        let workers: Vec<_> = [StartWith::First, StartWith::Second]
            .into_iter()
            .map(|start| {
                let pair = Arc::clone(&pair);
                thread::spawn(move || {
                    for _ in 0..iterations {
                        let (mut a, mut b) = pair.lock_from(start);
                        *a += 1;
                        *b += 1;
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
    }

    let (a, b) = pair.lock();
    assert_eq!(*a, 2 * rounds * iterations);
    assert_eq!(*a, *b);
}

#[test]
fn test_lock_all_random_order_stress() {
    let locks: Arc<Vec<Mutex<u32>>> = Arc::new((0..4).map(|_| Mutex::new(0)).collect());
    let threads = 6;
    let iterations = 500;

    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..iterations {
                    let offset = rng.gen_range(0..locks.len());
                    let order: Vec<&Mutex<u32>> = (0..locks.len())
                        .map(|i| &locks[(i + offset) % locks.len()])
                        .collect();
                    let mut guards = lock_all(&order);
                    for guard in &mut guards {
                        **guard += 1;
                    }
                }
            })
        })
        .collect();

    for w in workers {
        w.join().unwrap();
    }
    for lock in locks.iter() {
        assert_eq!(*lock.lock(), threads * iterations);
    }
}

#[test]
fn test_two_resource_writer_scenario() {
    // Two writers touching the same two resources, each naming them in the
    // opposite order.
    let log_a = Arc::new(Mutex::new(Vec::new()));
    let log_b = Arc::new(Mutex::new(Vec::new()));
    let loops = 1_000;

    let t1 = {
        let (a, b) = (Arc::clone(&log_a), Arc::clone(&log_b));
        thread::spawn(move || {
            for i in 0..loops {
                let (mut a, mut b) = lock_both(&a, &b);
                a.push(format!("thread1: {i}"));
                b.push(format!("thread1: {i}"));
            }
        })
    };
    let t2 = {
        let (a, b) = (Arc::clone(&log_a), Arc::clone(&log_b));
        thread::spawn(move || {
            for i in 0..loops {
                let (mut b, mut a) = lock_both(&b, &a);
                a.push(format!("thread2: {i}"));
                b.push(format!("thread2: {i}"));
            }
        })
    };
    t1.join().unwrap();
    t2.join().unwrap();

    // Both sinks saw every line in the same order: the pair was held together.
    let a = log_a.lock();
    let b = log_b.lock();
    assert_eq!(a.len(), 2 * loops);
    assert_eq!(*a, *b);
}
