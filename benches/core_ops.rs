// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Core Table operation benchmarks.
//!
//! Measures performance of:
//! - get() - point lookup
//! - put_or_update() - insert/update
//! - remove() - delete
//! - scan() - ordered range scan
//!
//! ## Performance Targets
//! - get: < 1us for a warm tree under 10k keys
//! - put_or_update: < 5us, excluding amortized split cost
//! - scan: throughput should stay roughly flat as the tree grows

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use latticekv::Table;
use std::ops::ControlFlow;
use std::sync::Arc;

fn populated_table(n: u64) -> Table<u64> {
    let table: Table<u64> = Table::new();
    let mut ctx = table.context();
    for i in 0..n {
        table.put_or_update(&mut ctx, &i.to_be_bytes(), i);
    }
    table
}

/// Benchmark get().
///
/// Target: < 1us for a warm tree.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    for size in [1_000, 10_000, 100_000].iter() {
        let table = populated_table(*size);
        let ctx = table.context();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &n| {
            let mid = (n / 2).to_be_bytes();
            b.iter(|| {
                black_box(table.get(&ctx, &mid));
            });
        });
    }

    group.finish();
}

/// Benchmark put_or_update() as new-key insert.
///
/// Target: < 5us, excluding amortized split cost.
fn bench_put_new_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_new_key");
    group.sample_size(30);

    for size in [1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &n| {
            b.iter_batched(
                || populated_table(n),
                |table| {
                    let mut ctx = table.context();
                    black_box(table.put_or_update(&mut ctx, &n.to_be_bytes(), n));
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark put_or_update() as an existing-key update.
fn bench_put_update_existing(c: &mut Criterion) {
    let table = populated_table(10_000);
    let mut ctx = table.context();

    c.bench_function("put_update_existing", |b| {
        b.iter(|| {
            black_box(table.put_or_update(&mut ctx, &5_000u64.to_be_bytes(), 5_001));
        });
    });
}

/// Benchmark remove().
fn bench_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove");
    group.sample_size(30);

    for size in [1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &n| {
            b.iter_batched(
                || populated_table(n),
                |table| {
                    let mut ctx = table.context();
                    black_box(table.remove(&mut ctx, &(n / 2).to_be_bytes()));
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark scan() over the whole tree.
///
/// Target: throughput should stay roughly flat as the tree grows.
fn bench_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_scan");
    group.sample_size(20);

    for size in [1_000, 10_000, 100_000].iter() {
        let table = populated_table(*size);
        let ctx = table.context();

        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut count = 0u64;
                table.scan(&ctx, None, true, |_k, v| {
                    count += black_box(*v);
                    ControlFlow::Continue(())
                });
                black_box(count);
            });
        });
    }

    group.finish();
}

/// Benchmark concurrent reads (no locking needed on the read path).
///
/// Target: linear scaling with threads.
fn bench_concurrent_gets(c: &mut Criterion) {
    let table = Arc::new(populated_table(10_000));

    let mut group = c.benchmark_group("concurrent_gets");

    for thread_count in [1, 2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(thread_count),
            thread_count,
            |b, &threads| {
                b.iter(|| {
                    std::thread::scope(|scope| {
                        for _ in 0..threads {
                            let table = Arc::clone(&table);
                            scope.spawn(move || {
                                let ctx = table.context();
                                for i in 0..100u64 {
                                    black_box(table.get(&ctx, &i.to_be_bytes()));
                                }
                            });
                        }
                    });
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_get,
    bench_put_new_key,
    bench_put_update_existing,
    bench_remove,
    bench_full_scan,
    bench_concurrent_gets
);
criterion_main!(benches);
