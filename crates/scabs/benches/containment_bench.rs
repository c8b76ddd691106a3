//! Criterion benchmarks for polytope containment.
//! Focus: H-representation check vs. simplex fallback, dims {2, 3, 4}
//! (the simplex path only from 3-D on).
//! Results: by default under target/criterion.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use nalgebra::DVector;
use rand::{rngs::StdRng, Rng, SeedableRng};
use scabs::geom::{box_vertices, GeomCfg};
use scabs::lp::ContainmentLp;

fn random_points(dim: usize, count: usize, seed: u64) -> Vec<DVector<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| DVector::from_fn(dim, |_, _| rng.gen_range(-1.5..1.5)))
        .collect()
}

fn bench_containment(c: &mut Criterion) {
    let mut group = c.benchmark_group("containment");
    for &dim in &[2usize, 3, 4] {
        let lo = DVector::from_element(dim, -1.0);
        let hi = DVector::from_element(dim, 1.0);
        let verts = box_vertices(&lo, &hi);

        group.bench_with_input(BenchmarkId::new("setup", dim), &dim, |b, _| {
            b.iter(|| ContainmentLp::new(&verts, GeomCfg::default()))
        });

        let hrep = ContainmentLp::new(&verts, GeomCfg::default());
        group.bench_with_input(BenchmarkId::new("halfspaces", dim), &dim, |b, &dim| {
            b.iter_batched(
                || random_points(dim, 64, 11),
                |pts| pts.iter().filter(|x| hrep.contains(x)).count(),
                BatchSize::SmallInput,
            )
        });

        if dim < 3 {
            continue;
        }
        // A zero facet cap forces the vertex (simplex) path from 3-D on.
        let simplex = ContainmentLp::new(
            &verts,
            GeomCfg {
                max_facet_candidates: 0,
                ..GeomCfg::default()
            },
        );
        group.bench_with_input(BenchmarkId::new("simplex", dim), &dim, |b, &dim| {
            b.iter_batched(
                || random_points(dim, 64, 12),
                |pts| pts.iter().filter(|x| simplex.contains(x)).count(),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_containment);
criterion_main!(benches);
