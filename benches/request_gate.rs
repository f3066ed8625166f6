//! # Request Gate Benchmarks
//!
//! Hot-path costs of the fixed-window gate.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use recipe_gate::{GateCategory, GateConfig, GateRegistry, ManualClock, RegistryConfig, RequestGate, RequestGateBuilder};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Checks against one hot key, admitted and rejected
fn bench_single_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_key");
    group.throughput(Throughput::Elements(1));

    group.bench_function("admitted", |b| {
        let gate = RequestGate::new(GateConfig::per_minute(u32::MAX));
        b.iter(|| std::hint::black_box(gate.check_limit("recipe-generation")));
    });

    group.bench_function("rejected", |b| {
        let gate = RequestGate::new(GateConfig::recipe_generation());
        for _ in 0..5 {
            gate.check_limit("recipe-generation");
        }
        b.iter(|| std::hint::black_box(gate.check_limit("recipe-generation")));
    });

    group.finish();
}

/// Lookups spread over a growing key space
fn bench_many_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("many_keys");

    for num_keys in [100, 10_000, 100_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_keys),
            &num_keys,
            |b, &num_keys| {
                let gate = RequestGate::new(GateConfig::per_minute(u32::MAX));
                let keys: Vec<String> = (0..num_keys).map(|i| format!("user-{i}")).collect();
                for key in &keys {
                    gate.check_limit(key);
                }

                let mut i = 0;
                b.iter(|| {
                    i = (i + 1) % keys.len();
                    std::hint::black_box(gate.check_limit(&keys[i]))
                });
            },
        );
    }

    group.finish();
}

/// Threads hammering the same key
fn bench_concurrent_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_check");

    for num_threads in [2, 4, 8, 16] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let gate = Arc::new(RequestGate::new(GateConfig::per_minute(1_000_000)));

                b.iter_custom(|iters| {
                    let mut total_duration = Duration::ZERO;

                    for _ in 0..iters {
                        gate.clear();

                        let start = std::time::Instant::now();

                        let handles: Vec<_> = (0..num_threads)
                            .map(|_| {
                                let gate = gate.clone();
                                thread::spawn(move || {
                                    for _ in 0..1000 {
                                        gate.check_limit("chat");
                                    }
                                })
                            })
                            .collect();

                        for handle in handles {
                            handle.join().unwrap();
                        }

                        total_duration += start.elapsed();
                    }

                    total_duration
                });
            },
        );
    }

    group.finish();
}

/// Sweeping a map full of expired records
fn bench_cleanup(c: &mut Criterion) {
    let mut group = c.benchmark_group("cleanup");

    for num_keys in [1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_keys),
            &num_keys,
            |b, &num_keys| {
                b.iter_batched(
                    || {
                        let clock = Arc::new(ManualClock::new(0));
                        let gate = RequestGateBuilder::new()
                            .max_requests(5)
                            .window_ms(1_000)
                            .clock(clock.clone())
                            .build();
                        for i in 0..num_keys {
                            gate.check_limit(&format!("user-{i}"));
                        }
                        clock.advance_ms(1_000);
                        gate
                    },
                    |gate| std::hint::black_box(gate.cleanup()),
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

/// Registry dispatch on top of a gate check
fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    group.bench_function("check_category", |b| {
        let registry = GateRegistry::new(RegistryConfig::default());
        b.iter(|| std::hint::black_box(registry.check_category(GateCategory::Chat)));
    });

    group.bench_function("stats", |b| {
        let registry = GateRegistry::new(RegistryConfig::default());
        registry.check_category(GateCategory::RecipeGeneration);
        b.iter(|| std::hint::black_box(registry.stats()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_key,
    bench_many_keys,
    bench_concurrent_check,
    bench_cleanup,
    bench_registry
);

criterion_main!(benches);
