//! Performance benchmarks for reactive-cache
//!
//! This benchmark suite measures:
//! - Accessor reads (memoized hit, random ids, fresh entries)
//! - Single and batch loads across different batch sizes
//! - Change propagation to subscribed accessors
//!
//! Run with: cargo bench
//! View results: open target/criterion/report/index.html

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reactive_cache::{Cache, Computed, Source};
use std::hint::black_box;
use std::sync::Arc;

// ============================================================================
// Benchmark Test Fixtures
// ============================================================================

#[derive(Clone, PartialEq)]
struct BenchEntity {
    id: u64,
    data: Vec<u8>,
}

impl BenchEntity {
    fn new(id: u64, size: usize) -> Self {
        BenchEntity {
            id,
            data: vec![0u8; size],
        }
    }
}

fn populated(entries: u64) -> Cache<BenchEntity> {
    let cache = Cache::new();
    futures::executor::block_on(cache.load_many(
        0..entries,
        (0..entries).map(|id| BenchEntity::new(id, 64)).collect::<Vec<_>>(),
    ));
    cache
}

// ============================================================================
// Group 1: Reads
// ============================================================================

fn read_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("reads");

    group.bench_function("by_id_hit", |b| {
        let cache = populated(1_000);
        b.iter(|| cache.by_id(black_box(500u64)).get());
    });

    group.bench_function("by_id_random", |b| {
        let cache = populated(10_000);
        let mut rng = StdRng::seed_from_u64(7);
        b.iter(|| cache.by_id(black_box(rng.random_range(0..10_000u64))).get());
    });

    group.bench_function("status_by_id", |b| {
        let cache = populated(1_000);
        b.iter(|| cache.status_by_id(black_box(500u64)));
    });

    // Each iteration allocates an entry and an accessor
    group.bench_function("by_id_fresh_entry", |b| {
        let cache: Cache<BenchEntity> = Cache::new();
        let mut next = 0u64;
        b.iter(|| {
            next += 1;
            cache.by_id(black_box(next)).get()
        });
    });

    group.finish();
}

// ============================================================================
// Group 2: Loads
// ============================================================================

fn load_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("loads");

    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");

    group.bench_function("load_value", |b| {
        let cache: Cache<BenchEntity> = Cache::new();
        b.to_async(&rt)
            .iter(|| cache.load(black_box(1u64), BenchEntity::new(1, 64)));
    });

    group.bench_function("load_async_resolver", |b| {
        let cache: Cache<BenchEntity> = Cache::new();
        b.to_async(&rt).iter(|| {
            cache.load(
                black_box(1u64),
                Source::from_future_fn(|| async { Ok(BenchEntity::new(1, 64)) }),
            )
        });
    });

    for size in [10u64, 100, 1_000].iter() {
        group
            .throughput(Throughput::Elements(*size))
            .bench_with_input(BenchmarkId::new("load_many", size), size, |b, &size| {
                let cache: Cache<BenchEntity> = Cache::new();
                let values: Vec<BenchEntity> = (0..size).map(|id| BenchEntity::new(id, 64)).collect();

                b.to_async(&rt)
                    .iter(|| cache.load_many(0..size, black_box(values.clone())));
            });
    }

    group.finish();
}

// ============================================================================
// Group 3: Propagation
// ============================================================================

fn propagation_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation");

    for subscribers in [1usize, 10, 100].iter() {
        group.bench_with_input(
            BenchmarkId::new("load_with_subscribers", subscribers),
            subscribers,
            |b, &subscribers| {
                let cache: Arc<Cache<BenchEntity>> = Arc::new(Cache::new());
                let derived: Vec<Computed<Option<u64>>> = (0..subscribers)
                    .map(|_| {
                        let accessor = cache.by_id(1u64);
                        let computed = Computed::new(move || accessor.get().value.map(|e| e.id));
                        computed.subscribe(|id| {
                            black_box(id);
                        });
                        computed
                    })
                    .collect();

                let mut toggle = 0u64;
                b.iter(|| {
                    toggle ^= 1;
                    futures::executor::block_on(
                        cache.load(1u64, BenchEntity::new(toggle, 16)),
                    )
                });
                drop(derived);
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark Registration
// ============================================================================

criterion_group!(benches, read_benchmarks, load_benchmarks, propagation_benchmarks);
criterion_main!(benches);
