use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shardlight_shatter::{generate_broken_glass, sites::scatter_sites, voronoi, FractureParams};

pub fn benchmark(c: &mut Criterion) {
    let params = FractureParams::default();
    let sites = scatter_sites(&mut ChaCha8Rng::seed_from_u64(0), &params);

    c.bench_function("voronoi", |b| b.iter(|| voronoi::diagram(black_box(&sites))));
    c.bench_function("broken glass", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        b.iter(|| generate_broken_glass(&mut rng, black_box(&params)));
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
