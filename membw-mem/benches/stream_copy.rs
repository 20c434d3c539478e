//! Streaming copy kernel benchmarks
//!
//! Compares the dispatched streaming kernel against the portable copy on
//! cache-line aligned buffers.
//!
//! ```bash
//! cargo bench -p membw-mem --bench stream_copy
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use membw_mem::kernel::{active_level, stream_copy_at};
use membw_mem::{SimdLevel, Workspace};
use std::hint::black_box;

fn bench_stream_copy_f32(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_copy_f32");
    let mut levels = vec![SimdLevel::Portable];
    if active_level() != SimdLevel::Portable {
        levels.push(active_level());
    }

    for len in [4 * 1024, 256 * 1024, 4 * 1024 * 1024] {
        let mut ws = Workspace::<f32>::allocate(len, 0).expect("allocation failed");
        ws.initialize();

        // read + write
        group.throughput(Throughput::Bytes((2 * len * 4) as u64));

        for &level in &levels {
            group.bench_with_input(BenchmarkId::new(level.name(), len), &len, |b, _| {
                b.iter(|| {
                    let (src, dst) = ws.copy_views();
                    stream_copy_at(level, black_box(src), black_box(dst));
                });
            });
        }
    }

    group.finish();
}

fn bench_stream_copy_f64(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_copy_f64");
    let len = 2 * 1024 * 1024;
    let mut ws = Workspace::<f64>::allocate(len, 0).expect("allocation failed");
    ws.initialize();
    group.throughput(Throughput::Bytes((2 * len * 8) as u64));

    group.bench_function(active_level().name(), |b| {
        b.iter(|| {
            let (src, dst) = ws.copy_views();
            stream_copy_at(active_level(), black_box(src), black_box(dst));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_stream_copy_f32, bench_stream_copy_f64);
criterion_main!(benches);
