//! Group-commit throughput benchmarks for the write-ahead log.
//!
//! Uses Criterion for statistically rigorous measurement with regression
//! detection and HTML reports.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench group_commit              # run all benchmarks
//! cargo bench --bench group_commit -- append    # filter by name
//! ```
//!
//! Reports are generated in `target/criterion/report/index.html`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use aeternus_wal::{Wal, WalConfig};
use tempfile::TempDir;

const VALUE_128B: &[u8; 128] = &[0xAB; 128];

fn make_key(i: u64) -> Vec<u8> {
    format!("key-{i:012}").into_bytes()
}

/// Benchmark group for single-caller sequential append latency.
///
/// # Sub-benchmarks
///
/// ## `sequential`
///
/// **Scenario:** A single caller repeatedly appends 128 B values with the
/// default configuration.
///
/// **What it measures:** The best-case round trip through the committer —
/// enqueue, batch of one, msync, wake — with no contention from other
/// callers.
///
/// **Expected behaviour:** Latency tracks the flush-timer interval unless
/// `batch_max` is reached first; with a single caller it almost always is
/// the timer that fires.
fn bench_sequential_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    group.bench_function("sequential", |b| {
        let dir = TempDir::new().unwrap();
        let wal = Wal::open(dir.path()).unwrap();
        let mut seq = 0u64;

        b.iter(|| {
            let key = make_key(seq);
            wal.append(black_box(key), black_box(VALUE_128B.to_vec()))
                .unwrap();
            seq += 1;
        });

        wal.close().unwrap();
    });

    group.finish();
}

/// Benchmark group for concurrent append throughput, mirroring the original
/// implementation's many-concurrent-callers stress pattern.
///
/// # Sub-benchmarks
///
/// ## `concurrent_writers/{1,4,16,64}`
///
/// **Scenario:** N threads each append one 128 B record concurrently against
/// a shared WAL, all appends issued before any thread's `append` returns.
///
/// **What it measures:** How group-commit batching amortizes flush cost as
/// concurrency rises — more concurrent callers should land in fewer,
/// larger batches rather than proportionally more flushes.
///
/// **Expected behaviour:** Aggregate throughput (elements/sec) should
/// improve with concurrency up to the point where `batch_max` caps batch
/// size, after which it levels off.
fn bench_concurrent_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    group.sample_size(10);

    for &num_writers in &[1u64, 4, 16, 64] {
        group.throughput(Throughput::Elements(num_writers));
        group.bench_function(BenchmarkId::new("concurrent_writers", num_writers), |b| {
            b.iter_batched(
                || {
                    let dir = TempDir::new().unwrap();
                    let wal = Arc::new(Wal::open(dir.path()).unwrap());
                    (dir, wal)
                },
                |(_dir, wal)| {
                    let handles: Vec<_> = (0..num_writers)
                        .map(|i| {
                            let wal = Arc::clone(&wal);
                            thread::spawn(move || {
                                wal.append(make_key(i), VALUE_128B.to_vec()).unwrap();
                            })
                        })
                        .collect();
                    for h in handles {
                        h.join().unwrap();
                    }
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

/// Benchmark group for how `batch_max` affects flush latency under a fixed
/// concurrent-writer count.
///
/// # Sub-benchmarks
///
/// ## `batch_max/{1,10,100,1000}`
///
/// **Scenario:** 32 concurrent callers append against a WAL configured with
/// the given `batch_max`, with a flush interval long enough that
/// `batch_max` (not the timer) determines when each batch flushes.
///
/// **What it measures:** The tradeoff between per-caller latency (larger
/// batches wait longer to fill) and flush efficiency (fewer, larger
/// `msync` calls).
///
/// **Expected behaviour:** Very small `batch_max` approaches per-record
/// fsync cost; large `batch_max` trades latency for fewer flushes.
fn bench_batch_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_max");
    group.sample_size(10);

    let num_writers = 32u64;

    for &batch_max in &[1usize, 10, 100, 1000] {
        group.bench_function(BenchmarkId::new("batch_max", batch_max), |b| {
            b.iter_batched(
                || {
                    let dir = TempDir::new().unwrap();
                    let config = WalConfig {
                        batch_max,
                        flush_interval: Duration::from_secs(1),
                        ..WalConfig::default()
                    };
                    let wal = Arc::new(Wal::open_with_config(dir.path(), config).unwrap());
                    (dir, wal)
                },
                |(_dir, wal)| {
                    let handles: Vec<_> = (0..num_writers)
                        .map(|i| {
                            let wal = Arc::clone(&wal);
                            thread::spawn(move || {
                                wal.append(make_key(i), VALUE_128B.to_vec()).unwrap();
                            })
                        })
                        .collect();
                    for h in handles {
                        h.join().unwrap();
                    }
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sequential_append,
    bench_concurrent_append,
    bench_batch_size,
);

criterion_main!(benches);
