//! Criterion benchmarks for host-side validation metrics.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stereo_core::{end_point_error, three_pixel_error, MaskPolicy};

/// Create a synthetic prediction/target pair of `len` pixels.
fn make_maps(len: usize) -> (Vec<f32>, Vec<f32>) {
    let target: Vec<f32> = (0..len)
        .map(|i| if i % 7 == 0 { 0.0 } else { (i % 200) as f32 })
        .collect();
    let prediction: Vec<f32> = target
        .iter()
        .enumerate()
        .map(|(i, t)| t + ((i % 9) as f32 - 4.0) * 0.75)
        .collect();
    (prediction, target)
}

fn bench_metrics(c: &mut Criterion) {
    let policy = MaskPolicy::new(192.0);
    let mut group = c.benchmark_group("validation_metrics");

    // KITTI-sized crop and a SceneFlow-sized crop
    for &(h, w) in &[(240usize, 528usize), (576, 960)] {
        let (prediction, target) = make_maps(h * w);
        let mask = policy.training_mask(&target);
        group.throughput(Throughput::Elements((h * w) as u64));

        group.bench_with_input(
            BenchmarkId::new("end_point_error", format!("{}x{}", h, w)),
            &(h, w),
            |b, _| b.iter(|| end_point_error(black_box(&prediction), black_box(&target), &mask)),
        );

        group.bench_with_input(
            BenchmarkId::new("three_pixel_error", format!("{}x{}", h, w)),
            &(h, w),
            |b, _| {
                b.iter(|| three_pixel_error(black_box(&prediction), black_box(&target), &policy))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_metrics);
criterion_main!(benches);
