//! Pool throughput benchmarks.
//!
//! Measures steady-state batch cycles where every batch is reclaimed.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use fenced_pool::{CommandBufferLevel, CommandBufferPool, CpuFence, MockDevice};

fn bench_batch_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_cycle");

    for per_batch in [1usize, 8, 32] {
        let device = MockDevice::new(1);
        let mut pool: CommandBufferPool<'_, _> =
            CommandBufferPool::new(&device, 0, CommandBufferLevel::Primary).unwrap();

        group.throughput(Throughput::Elements(per_batch as u64));
        group.bench_function(BenchmarkId::new("acquire_reclaim", per_batch), |b| {
            b.iter(|| {
                pool.begin_batch().unwrap();
                for _ in 0..per_batch {
                    black_box(pool.acquire().unwrap());
                }
                pool.end_batch(CpuFence::signaled()).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_frames_in_flight(c: &mut Criterion) {
    let mut group = c.benchmark_group("frames_in_flight");

    // Three frames in flight: a batch is reclaimed three submissions later.
    let device = MockDevice::new(1);
    let mut pool: CommandBufferPool<'_, _> =
        CommandBufferPool::new(&device, 0, CommandBufferLevel::Primary).unwrap();
    let mut in_flight: std::collections::VecDeque<CpuFence> = Default::default();

    group.throughput(Throughput::Elements(4));
    group.bench_function("triple_buffered", |b| {
        b.iter(|| {
            if in_flight.len() == 3 {
                if let Some(oldest) = in_flight.pop_front() {
                    oldest.signal();
                }
            }
            pool.begin_batch().unwrap();
            for _ in 0..4 {
                black_box(pool.acquire().unwrap());
            }
            let fence = CpuFence::new();
            pool.end_batch(fence.clone()).unwrap();
            in_flight.push_back(fence);
        })
    });

    for fence in in_flight.drain(..) {
        fence.signal();
    }
    group.finish();
}

criterion_group!(benches, bench_batch_cycle, bench_frames_in_flight);
criterion_main!(benches);
