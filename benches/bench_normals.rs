use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use depthseg::normals::{estimate_normals, mls_smooth, MlsParams};
use depthseg::{Point3D, PointCloud};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Noisy samples of a gently curved 20 x 20 cm patch one meter away.
fn surface_cloud(n: usize, seed: u64) -> PointCloud<Point3D> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let x: f64 = rng.gen_range(-0.1..0.1);
            let y: f64 = rng.gen_range(-0.1..0.1);
            let z = 1.0 + 2.0 * (x * x + y * y) + rng.gen_range(-0.0005..0.0005);
            Point3D::new(x, y, z)
        })
        .collect()
}

fn bench_estimate_normals(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_normals_r10mm");
    for size in [10_000, 100_000] {
        let cloud = surface_cloud(size, 42);
        group.bench_with_input(BenchmarkId::new("depthseg", size), &cloud, |b, cloud| {
            b.iter(|| estimate_normals(cloud, 0.01))
        });
    }
    group.finish();
}

fn bench_mls_smooth(c: &mut Criterion) {
    let mut group = c.benchmark_group("mls_smooth_r10mm");
    group.sample_size(10);
    let params = MlsParams {
        search_radius: 0.01,
        ..MlsParams::default()
    };
    for size in [10_000, 50_000] {
        let cloud = surface_cloud(size, 42);
        group.bench_with_input(BenchmarkId::new("depthseg", size), &cloud, |b, cloud| {
            b.iter(|| mls_smooth(cloud, &params))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_estimate_normals, bench_mls_smooth);
criterion_main!(benches);
