//! Benchmark for PersistentHashMap vs standard HashMap.
//!
//! Compares shardmap's PersistentHashMap against Rust's standard HashMap
//! for common operations.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use shardmap::PersistentHashMap;
use std::collections::HashMap;
use std::hint::black_box;

// =============================================================================
// insert Benchmark
// =============================================================================

fn benchmark_insert(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("insert");

    for size in [1_000, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = PersistentHashMap::new();
                    for index in 0..size {
                        map = map.insert(black_box(index), black_box(index * 2));
                    }
                    black_box(map)
                });
            },
        );

        // Standard HashMap insert
        group.bench_with_input(
            BenchmarkId::new("HashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = HashMap::new();
                    for index in 0..size {
                        map.insert(black_box(index), black_box(index * 2));
                    }
                    black_box(map)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// get Benchmark
// =============================================================================

fn benchmark_get(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("get");

    for size in [100, 1_000, 10_000] {
        let persistent_map: PersistentHashMap<i32, i32> =
            (0..size).map(|index| (index, index * 2)).collect();
        let standard_map: HashMap<i32, i32> = (0..size).map(|index| (index, index * 2)).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut total = 0i64;
                    for index in 0..size {
                        if let Some(value) = persistent_map.get(&black_box(index)) {
                            total += i64::from(*value);
                        }
                    }
                    black_box(total)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("HashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut total = 0i64;
                    for index in 0..size {
                        if let Some(value) = standard_map.get(&black_box(index)) {
                            total += i64::from(*value);
                        }
                    }
                    black_box(total)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// remove Benchmark
// =============================================================================

fn benchmark_remove(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("remove");

    for size in [1_000, 10_000] {
        let persistent_map: PersistentHashMap<i32, i32> =
            (0..size).map(|index| (index, index)).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = persistent_map.clone();
                    for index in (0..size).step_by(10) {
                        map = map.remove(&black_box(index));
                    }
                    black_box(map)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// iterate Benchmark
// =============================================================================

fn benchmark_iterate(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("iterate");

    for size in [1_000, 100_000] {
        let persistent_map: PersistentHashMap<i32, i32> =
            (0..size).map(|index| (index, index)).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    let total: i64 = persistent_map.values().map(|value| i64::from(*value)).sum();
                    black_box(total)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_insert,
    benchmark_get,
    benchmark_remove,
    benchmark_iterate
);
criterion_main!(benches);
