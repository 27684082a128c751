//! Benchmarks for the solver family and the campaign driver.
//!
//! Measures one solve per algorithm on seeded random graphs of growing size,
//! and a short Monte Carlo campaign sequentially and on the rayon pool.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use neural_rank::complex::ComplexRankSolver;
use neural_rank::config::ExperimentConfig;
use neural_rank::matrix::AdjacencyMatrix;
use neural_rank::pagerank::PageRankSolver;
use neural_rank::rank::{compare, to_permutation};
use neural_rank::real::RealRankSolver;
use neural_rank::traits::{LinearRankSolver, NonlinearRankSolver};
use neural_rank::trial::TrialDriver;

const SIZES: [usize; 3] = [5, 16, 48];

/// Seeded random adjacency matrix with ~30% nonzero entries.
fn random_matrix(n: usize, seed: u64) -> AdjacencyMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..n * n)
        .map(|_| if rng.gen::<f64>() < 0.3 { rng.gen_range(0.0..1.0) } else { 0.0 })
        .collect();
    AdjacencyMatrix::from_flat(n, values).expect("random matrix is valid")
}

fn bench_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");
    group.warm_up_time(Duration::from_secs(2));
    group.sample_size(50);

    for &n in &SIZES {
        let matrix = random_matrix(n, 42);
        group.throughput(Throughput::Elements((n * n) as u64));

        let pagerank = PageRankSolver::default();
        group.bench_with_input(BenchmarkId::new("pagerank", n), &matrix, |b, m| {
            b.iter(|| pagerank.rank(black_box(m)).expect("pagerank"))
        });

        let real = RealRankSolver::default();
        group.bench_with_input(BenchmarkId::new("real_fixed_point", n), &matrix, |b, m| {
            b.iter(|| real.solve(black_box(m)).expect("real solve"))
        });

        let complex = ComplexRankSolver::default();
        group.bench_with_input(BenchmarkId::new("complex_fixed_point", n), &matrix, |b, m| {
            b.iter(|| complex.solve(black_box(m)).expect("complex solve"))
        });
    }
    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    for &n in &SIZES {
        let mut rng = StdRng::seed_from_u64(n as u64);
        let a: Vec<f64> = (0..n).map(|_| rng.gen()).collect();
        let b: Vec<f64> = (0..n).map(|_| rng.gen()).collect();
        let (p, q) = (to_permutation(&a), to_permutation(&b));
        group.bench_with_input(BenchmarkId::new("edit_distance", n), &n, |bench, _| {
            bench.iter(|| compare(black_box(&p), black_box(&q)))
        });
    }
    group.finish();
}

fn bench_campaign(c: &mut Criterion) {
    let mut group = c.benchmark_group("campaign");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    for parallel in [false, true] {
        let driver = TrialDriver::new(ExperimentConfig {
            trials: 128,
            parallel,
            ..ExperimentConfig::default()
        })
        .expect("valid configuration");
        let label = if parallel { "parallel" } else { "sequential" };
        group.bench_function(BenchmarkId::new("monte_carlo_128", label), |b| {
            b.iter(|| driver.run_monte_carlo().expect("campaign"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_solvers, bench_compare, bench_campaign);
criterion_main!(benches);
