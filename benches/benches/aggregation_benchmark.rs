//! Aggregation benchmarks: record folding, aggregator batches, routing and
//! persistence.
//!
//! Run with: `cargo bench --package trendbar-bench`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use trendbar_bench::{bench_instance, quotes, raw_quotes};
use trendbar_lib::{
    BarAggregator, BarRecord, BarRegistry, BarStore, BatchSink, FileBarStore,
    FinalizeFailurePolicy, InMemoryBarStore, QuoteRouter,
};

const BATCH_SIZES: [usize; 3] = [10, 100, 1_000];

fn record_fold_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_fold");
    let instance = bench_instance();

    for size in BATCH_SIZES {
        let batch = quotes(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| {
                let record = BarRecord::open(&instance, &batch[..1]).unwrap();
                record.with_batch(batch).finalized(&batch[batch.len() - 1..])
            });
        });
    }

    group.finish();
}

fn aggregator_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregator_batch");
    let instance = bench_instance();

    for size in BATCH_SIZES {
        let batch = quotes(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            let registry = Arc::new(BarRegistry::new());
            let aggregator = BarAggregator::new(
                Arc::clone(&registry),
                Arc::new(InMemoryBarStore::new()),
                FinalizeFailurePolicy::default(),
            );
            b.iter(|| {
                aggregator
                    .process_batch(batch.clone(), &instance, false)
                    .unwrap();
            });
        });
    }

    group.finish();
}

fn router_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("router");
    let count = 1_000;
    let raw = raw_quotes(count);
    group.throughput(Throughput::Elements(count as u64));

    group.bench_function("route_active_bar", |b| {
        let registry = Arc::new(BarRegistry::new());
        let queue = registry.activate(bench_instance()).unwrap();
        let router = QuoteRouter::new(registry, Duration::from_secs(1));
        b.iter(|| {
            for quote in &raw {
                router.route(*quote);
            }
            queue.take_backlog()
        });
    });

    group.finish();
}

fn file_store_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_store");
    group.sample_size(20);

    let temp_dir = TempDir::new().unwrap();
    let store = FileBarStore::new(temp_dir.path().to_path_buf()).unwrap();
    let batch = quotes(100);
    let record = BarRecord::open(&bench_instance(), &batch)
        .unwrap()
        .finalized(&[]);

    group.bench_function("save", |b| {
        b.iter(|| store.save(record).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    record_fold_benchmark,
    aggregator_benchmark,
    router_benchmark,
    file_store_benchmark
);
criterion_main!(benches);
