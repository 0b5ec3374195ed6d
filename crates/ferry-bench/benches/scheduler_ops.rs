//! Criterion micro-benchmarks for task submission and drain.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use ferry_array::ArrayRef;
use ferry_bench::{halo_strip, queue_halo_exchange, queue_overlapping_copies};
use ferry_engine::{SchedulerConfig, TaskList};
use ferry_test_utils::LiveProbe;
use ferry_transport::LocalWorld;

/// Benchmark: queue and drain a ghost exchange over 64 grids of 16x16.
fn bench_halo_exchange_64(c: &mut Criterion) {
    let array = halo_strip(64, 16, 16);
    let mut list = TaskList::with_transport(LocalWorld::single());
    c.bench_function("halo_exchange_64", |b| {
        b.iter(|| {
            let queued = queue_halo_exchange(&mut list, &array);
            let report = list.execute().unwrap();
            black_box((queued, report.metrics.passes));
        });
    });
}

/// Benchmark: 256 chained copies, each scanning the queue for hazards.
fn bench_hazard_chain_256(c: &mut Criterion) {
    let arrays: Vec<ArrayRef> = (0..3).map(|_| halo_strip(1, 32, 32)).collect();
    let mut list = TaskList::with_transport(LocalWorld::single());
    c.bench_function("hazard_chain_256", |b| {
        b.iter(|| {
            queue_overlapping_copies(&mut list, &arrays, 256, 16);
            black_box(list.execute().unwrap());
        });
    });
}

/// Benchmark: 1000 short jobs admitted eight at a time.
fn bench_throttled_jobs_1000(c: &mut Criterion) {
    let config = SchedulerConfig::default().with_max_live_tasks(8);
    let mut list = TaskList::new(config, LocalWorld::single()).unwrap();
    let probe = LiveProbe::new();
    c.bench_function("throttled_jobs_1000", |b| {
        b.iter(|| {
            for i in 0..1000u32 {
                list.add_job(probe.job(i % 3));
            }
            let report = list.execute().unwrap();
            black_box(report.metrics.throttled_passes);
        });
    });
}

criterion_group!(
    benches,
    bench_halo_exchange_64,
    bench_hazard_chain_256,
    bench_throttled_jobs_1000
);
criterion_main!(benches);
