//! Benchmark for shared queue throughput.
//!
//! Run with: cargo bench --package relay_core --bench queue_benchmark

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use relay_core::SharedQueue;
use std::sync::Arc;
use std::thread;

const ITEMS: u64 = 10_000;

fn benchmark_push_pop_single_thread(c: &mut Criterion) {
    let queue = SharedQueue::new();

    let mut group = c.benchmark_group("shared_queue");
    group.throughput(Throughput::Elements(1));
    group.bench_function("push_then_try_pop", |b| {
        b.iter(|| {
            queue.push(black_box(1u64));
            black_box(queue.try_pop())
        });
    });
    group.finish();
}

fn benchmark_spsc_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared_queue_spsc");
    group.throughput(Throughput::Elements(ITEMS));
    group.sample_size(20);

    for capacity in [None, Some(64usize)] {
        let name = capacity.map_or_else(|| "unbounded".to_string(), |c| format!("bounded_{c}"));
        group.bench_function(name, |b| {
            b.iter(|| {
                let queue = Arc::new(capacity.map_or_else(SharedQueue::new, SharedQueue::bounded));
                let producer = {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        for i in 0..ITEMS {
                            queue.push(i);
                        }
                    })
                };
                let mut sum = 0u64;
                for _ in 0..ITEMS {
                    sum += queue.pop_blocking();
                }
                producer.join().unwrap();
                black_box(sum)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_push_pop_single_thread, benchmark_spsc_handoff);
criterion_main!(benches);
