// benches/benchmarks.rs -- CPU-side benchmarks.
//
// Always runnable, no GPU required:
//   cargo bench --bench benchmarks
//
// Covers the reference renderer (the cost model the GPU path is judged
// against), the aligned packing helper, chunk-plan iteration and the
// `.df` serializer.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use holoren::gpu::marshal;
use holoren::gpu::render::ChunkPlan;
use holoren::{CpuRenderer, OpticalField, PointCloud, PointSource};

// ============================================================
// Helpers
// ============================================================

/// Deterministic pseudo-random cloud in a 1 mm cube in front of the
/// hologram plane.
fn make_cloud(n: usize) -> PointCloud {
    let mut cloud = PointCloud::with_capacity(n);
    let mut rng = 0x9e3779b9u32;
    let mut next = || {
        rng = rng.wrapping_mul(1664525).wrapping_add(1013904223);
        (rng >> 8) as f32 / (1u32 << 24) as f32 - 0.5
    };
    for _ in 0..n {
        cloud.push(PointSource::new(
            next() * 1e-3,
            next() * 1e-3,
            -0.1 + next() * 1e-3,
        ));
    }
    cloud
}

// ============================================================
// Benchmarks
// ============================================================

fn bench_cpu_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_render");
    group.sample_size(10);

    for points in [10usize, 100] {
        let cloud = make_cloud(points);
        group.bench_with_input(BenchmarkId::new("64x64", points), &cloud, |b, cloud| {
            let renderer = CpuRenderer::new(0.0);
            b.iter(|| {
                let mut field = OpticalField::new(64, 64, 630e-9, 20e-6);
                renderer.render_object_wave(cloud, &mut field);
                field
            })
        });
    }
    group.finish();
}

fn bench_pack_aligned(c: &mut Criterion) {
    let mut group = c.benchmark_group("marshal");
    for points in [1_000usize, 100_000] {
        let cloud = make_cloud(points);
        group.bench_with_input(
            BenchmarkId::new("pack_aligned", points),
            &cloud,
            |b, cloud| b.iter(|| marshal::pack_aligned(cloud.points())),
        );
    }
    group.finish();
}

fn bench_chunk_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_plan");
    // 4K-class field, 128 MiB allocation ceiling.
    group.bench_function("plan_and_iterate_8M", |b| {
        b.iter(|| {
            let plan = ChunkPlan::new(3840 * 2160, None, 128 << 20, usize::MAX).unwrap();
            plan.iter().map(|(_, len)| len).sum::<usize>()
        })
    });
    group.finish();
}

fn bench_field_save(c: &mut Criterion) {
    let mut field = OpticalField::new(512, 512, 630e-9, 20e-6);
    for (i, s) in field.samples_mut().iter_mut().enumerate() {
        s.re = (i as f32).sin();
        s.im = (i as f32).cos();
    }

    let mut group = c.benchmark_group("field_io");
    group.bench_function("save_512x512", |b| {
        b.iter(|| {
            let mut buf = Vec::with_capacity(field.byte_size() + 66);
            field.save_to(&mut buf).unwrap();
            buf
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_cpu_render,
    bench_pack_aligned,
    bench_chunk_plan,
    bench_field_save
);
criterion_main!(benches);
