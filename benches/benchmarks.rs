//! Benchmarks for hidlink hot paths
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hidlink::{feature_buffer, forced_ascii, frame_report, widen};

/// Benchmark forced ASCII conversion of device strings.
///
/// Runs for three strings of every enumerated device, so scans of busy
/// buses convert a few hundred of them.
fn bench_forced_ascii(c: &mut Criterion) {
    let mut group = c.benchmark_group("forced_ascii");

    for (name, text) in [
        ("ascii", "Razer BlackWidow Chroma V2".to_string()),
        ("latin1", "Périphérique d'entrée étendu".to_string()),
        ("max_len", "x".repeat(300)),
    ] {
        let wide = widen(&text);
        group.throughput(Throughput::Elements(wide.len() as u64));
        group.bench_with_input(BenchmarkId::new("convert", name), &wide, |b, wide| {
            b.iter(|| forced_ascii(Some(black_box(wide.as_slice()))))
        });
    }

    group.finish();
}

/// Benchmark report buffer framing at typical report sizes.
fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("framing");

    for size in [8usize, 64, 90, 1024] {
        let payload: Vec<u8> = (0..size).map(|i| (i * 7 + 13) as u8).collect();
        group.throughput(Throughput::Bytes(size as u64 + 1));

        group.bench_with_input(BenchmarkId::new("frame_report", size), &payload, |b, p| {
            b.iter(|| frame_report(black_box(5), black_box(p)))
        });
        group.bench_with_input(BenchmarkId::new("feature_buffer", size), &size, |b, &s| {
            b.iter(|| feature_buffer(black_box(7), black_box(s)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_forced_ascii, bench_framing);
criterion_main!(benches);
