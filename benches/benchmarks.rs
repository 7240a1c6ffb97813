criterion::criterion_main!(benches);
criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default()
        .without_plots()
        .noise_threshold(3.0)
        .significance_level(0.01)
        .sample_size(10)
        .measurement_time(std::time::Duration::from_secs(1));
    targets =
        collecting_sparse_histogram,
        building_dense_graph,
        solving_transport_simplex,
        solving_transport_augmenting,
        solving_transport_sparsified,
}

use earthmover::graph::GraphMode;
use earthmover::histogram::SparseHistogram;
use earthmover::solve::transport;
use earthmover::solve::Backend;
use earthmover::solve::Config;
use rand::Rng;
use rand::SeedableRng;

fn samples(n: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|_| vec![rng.random::<f64>() * 4., rng.random::<f64>() * 4.])
        .collect()
}

fn collecting_sparse_histogram(c: &mut criterion::Criterion) {
    let samples = samples(10_000, 0);
    c.bench_function("collect a 10k-sample SparseHistogram", |b| {
        b.iter(|| SparseHistogram::from_samples(&samples, &[0.1, 0.1]))
    });
}

fn building_dense_graph(c: &mut criterion::Criterion) {
    let a = SparseHistogram::from_samples(&samples(10_000, 0), &[0.25, 0.25]).unwrap();
    let b = SparseHistogram::from_samples(&samples(10_000, 1), &[0.25, 0.25]).unwrap();
    c.bench_function("build the dense bipartite graph", |x| {
        x.iter(|| {
            earthmover::graph::TransportGraph::build(
                &a,
                &b,
                &earthmover::metric::CostModel::SqEuclidean,
                GraphMode::Dense,
                earthmover::graph::MassMismatchPolicy::Rescale,
                1e-9,
            )
        })
    });
}

fn solving_transport_simplex(c: &mut criterion::Criterion) {
    let a = SparseHistogram::from_samples(&samples(10_000, 0), &[0.25, 0.25]).unwrap();
    let b = SparseHistogram::from_samples(&samples(10_000, 1), &[0.25, 0.25]).unwrap();
    c.bench_function("solve dense transport via network simplex", |x| {
        let config = Config {
            policy: earthmover::graph::MassMismatchPolicy::Rescale,
            ..Config::default()
        };
        x.iter(|| transport(&a, &b, &config))
    });
}

fn solving_transport_augmenting(c: &mut criterion::Criterion) {
    let a = SparseHistogram::from_samples(&samples(10_000, 0), &[0.25, 0.25]).unwrap();
    let b = SparseHistogram::from_samples(&samples(10_000, 1), &[0.25, 0.25]).unwrap();
    c.bench_function("solve dense transport via augmenting paths", |x| {
        let config = Config {
            backend: Backend::AugmentingPaths,
            policy: earthmover::graph::MassMismatchPolicy::Rescale,
            ..Config::default()
        };
        x.iter(|| transport(&a, &b, &config))
    });
}

fn solving_transport_sparsified(c: &mut criterion::Criterion) {
    let a = SparseHistogram::from_samples(&samples(10_000, 0), &[0.25, 0.25]).unwrap();
    let b = SparseHistogram::from_samples(&samples(10_000, 1), &[0.25, 0.25]).unwrap();
    c.bench_function("solve sparsified transport via network simplex", |x| {
        let config = Config {
            mode: GraphMode::Sparsified { neighbors: 8 },
            policy: earthmover::graph::MassMismatchPolicy::Rescale,
            ..Config::default()
        };
        x.iter(|| transport(&a, &b, &config))
    });
}
