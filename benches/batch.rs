use criterion::*;
use std::hint::black_box;

use mc_tally::engine::scheduler::{run_histories, BatchConfig};

mod common;
use common::*;

fn batch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    let prototype = make_estimator();

    for threads in [1usize, 4] {
        group.bench_function(format!("run_histories_100k_{threads}t"), |b| {
            let config = BatchConfig::new(2_048).with_threads(threads);
            b.iter(|| {
                let reduced = run_histories(&prototype, HISTORIES_MED, &config, history).unwrap();
                black_box(reduced.histories());
            });
        });
    }

    group.bench_function("merge_8_replicas", |b| {
        b.iter_batched(
            || {
                (0..8u64)
                    .map(|k| {
                        let mut replica = prototype.replicate();
                        for i in 0..1_000 {
                            history(k * 1_000 + i, &mut replica).unwrap();
                            replica.commit_history_contribution().unwrap();
                        }
                        replica
                    })
                    .collect::<Vec<_>>()
            },
            |replicas| {
                let mut reduced = prototype.replicate();
                for replica in &replicas {
                    reduced.merge(replica).unwrap();
                }
                black_box(reduced.histories());
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, batch_benchmark);
criterion_main!(benches);
