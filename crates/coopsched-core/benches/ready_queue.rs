//! Ready queue benchmarks
//!
//! - Fill then drain with mixed priorities
//! - Steady-state round robin (remove head, reinsert at back)
//!
//! Run: `cargo bench -p coopsched-core --bench ready_queue`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use coopsched_core::{Priority, ReadyQueue, ThreadId};

fn fill(queue: &mut ReadyQueue, n: u32) {
    for i in 0..n {
        queue.insert(ThreadId::new(i), Priority::new((i % 8) as i32));
    }
}

fn bench_fill_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_drain");
    for &n in &[16u32, 256, 4096] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut queue = ReadyQueue::new();
                fill(&mut queue, n);
                while let Some(entry) = queue.remove_next() {
                    black_box(entry);
                }
            });
        });
    }
    group.finish();
}

fn bench_round_robin(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_robin");
    for &n in &[4u32, 64, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut queue = ReadyQueue::new();
            for i in 0..n {
                queue.insert(ThreadId::new(i), Priority::NORMAL);
            }
            b.iter(|| {
                if let Some(entry) = queue.remove_next() {
                    queue.insert(black_box(entry.id), entry.priority);
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fill_drain, bench_round_robin);
criterion_main!(benches);
