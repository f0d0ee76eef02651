use criterion::*;
use std::hint::black_box;

use mc_tally::engine::indexer::PhaseSpacePoint;

mod common;
use common::*;

fn contribute_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("contribute");
    let tracks = make_tracks(10_000, 7);
    let aux = PhaseSpacePoint::new();

    group.throughput(Throughput::Elements(tracks.len() as u64));
    group.bench_function("add_partial_10k", |b| {
        b.iter_batched(
            make_estimator,
            |mut core| {
                for (cell, state, value) in &tracks {
                    core.add_partial_history_contribution(*cell, state, &aux, *value).unwrap();
                }
                black_box(core.has_uncommitted_history_contribution());
                core
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, contribute_benchmark);
criterion_main!(benches);
