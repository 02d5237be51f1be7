//! Measurement phase benchmarks

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use ivb::digest::{digest_of, Sha256Digest};
use ivbench_reader::run_phases;

/// Benchmark the full phase sequence at protocol-relevant payload sizes
fn bench_phase_sequence(c: &mut Criterion) {
    let payload_64k = vec![0x7Eu8; 64 * 1024];
    let digest_64k = digest_of(&payload_64k);
    let payload_1m = vec![0x7Eu8; 1024 * 1024];
    let digest_1m = digest_of(&payload_1m);

    let mut local = Vec::new();
    let mut hasher = Sha256Digest::new();

    c.bench_function("phases_64k", |b| {
        b.iter(|| {
            black_box(
                run_phases(black_box(&payload_64k), &digest_64k, &mut local, &mut hasher)
                    .unwrap(),
            )
        });
    });

    c.bench_function("phases_1m", |b| {
        b.iter(|| {
            black_box(
                run_phases(black_box(&payload_1m), &digest_1m, &mut local, &mut hasher)
                    .unwrap(),
            )
        });
    });
}

criterion_group!(benches, bench_phase_sequence);
criterion_main!(benches);
