use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use mc_tally::engine::dimension::Dimension;
use mc_tally::engine::error::{ConfigurationError, TallyError, TallyResult};
use mc_tally::engine::estimator::{EstimatorConfig, EstimatorCore};
use mc_tally::engine::indexer::PhaseSpacePoint;
use mc_tally::engine::moments::Moments;
use mc_tally::engine::report::EstimatorSnapshot;
use mc_tally::engine::response::{FnResponse, UniformResponse};
use mc_tally::engine::scheduler::{run_histories, BatchConfig};
use mc_tally::engine::types::{ParticleState, ParticleType};

const HISTORIES: u64 = 2_000;
const CELLS: [u64; 3] = [11, 12, 13];

fn prototype() -> EstimatorCore {
    let mut config = EstimatorConfig::new(1)
        .with_axis(Dimension::Energy, [0.0, 1.0, 2.5, 5.0, 10.0])
        .with_axis(Dimension::CollisionCount, [0.0, 1.0, 3.0, f64::INFINITY]);
    for (i, &cell) in CELLS.iter().enumerate() {
        config = config.with_entity(cell, 1.0 + i as f64);
    }
    config
        .build_with_responses(vec![
            UniformResponse::shared(),
            FnResponse::uniform("energy", |s: &ParticleState| s.energy).shared(),
        ])
        .unwrap()
}

/// One pseudo-random history, fully determined by its index.
fn history(index: u64, core: &mut EstimatorCore) -> TallyResult<()> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(index);
    let tracks = rng.random_range(0..6u32);
    for collision in 0..tracks {
        let cell = CELLS[rng.random_range(0..CELLS.len())];
        // Some energies fall outside the phase space on purpose.
        let energy = rng.random_range(0.0..12.0);
        let state = ParticleState::new(ParticleType::Neutron, energy).with_collision_number(collision);
        core.add_partial_history_contribution(cell, &state, &PhaseSpacePoint::new(), rng.random::<f64>())?;
    }
    Ok(())
}

fn sequential() -> EstimatorCore {
    let mut core = prototype();
    for i in 0..HISTORIES {
        history(i, &mut core).unwrap();
        core.commit_history_contribution().unwrap();
    }
    core
}

fn assert_moments_close(a: &[Moments], b: &[Moments]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        for (u, v) in [(x.m1, y.m1), (x.m2, y.m2), (x.m3, y.m3), (x.m4, y.m4)] {
            assert!((u - v).abs() <= 1e-9 * u.abs().max(1.0), "{u} != {v}");
        }
    }
}

fn assert_snapshots_close(a: &EstimatorSnapshot, b: &EstimatorSnapshot) {
    assert_eq!(a.histories, b.histories);
    for (x, y) in a.entities.iter().zip(b.entities.iter()) {
        assert_eq!(x.id, y.id);
        assert_moments_close(&x.bin_moments, &y.bin_moments);
        assert_moments_close(&x.total_moments, &y.total_moments);
    }
    assert_moments_close(&a.total_bin_moments, &b.total_bin_moments);
    assert_moments_close(&a.total_moments, &b.total_moments);
}

#[test]
fn four_replicas_merge_to_the_single_worker_result() {
    let single = sequential();

    let proto = prototype();
    let mut replicas: Vec<EstimatorCore> = (0..4).map(|_| proto.replicate()).collect();
    for i in 0..HISTORIES {
        let replica = &mut replicas[(i % 4) as usize];
        history(i, replica).unwrap();
        replica.commit_history_contribution().unwrap();
    }

    let mut merged = proto.replicate();
    for replica in &replicas {
        merged.merge(replica).unwrap();
    }

    assert_snapshots_close(&merged.snapshot(), &single.snapshot());
    assert!(single.total_moments()[0].m1 > 0.0);
}

#[test]
fn parallel_batch_matches_sequential_run() {
    let single = sequential();
    let proto = prototype();

    let batch = run_histories(&proto, HISTORIES, &BatchConfig::new(64).with_threads(4), history).unwrap();
    assert!(batch.is_compatible_with(&proto));
    assert_snapshots_close(&batch.snapshot(), &single.snapshot());
}

#[test]
fn parallel_batch_is_independent_of_thread_count() {
    let proto = prototype();
    let config = BatchConfig::new(50);

    let one = run_histories(&proto, HISTORIES, &config.with_threads(1), history).unwrap();
    let many = run_histories(&proto, HISTORIES, &config.with_threads(4), history).unwrap();

    // Same chunking, same merge order: bit-identical.
    assert_eq!(one.snapshot(), many.snapshot());
}

#[test]
fn batch_result_merges_back_into_the_prototype() {
    let mut proto = prototype();
    let batch = run_histories(&proto, 100, &BatchConfig::new(16), history).unwrap();
    assert_eq!(batch.histories(), 100);

    proto.merge(&batch).unwrap();
    assert_eq!(proto.histories(), 100);
    assert_eq!(proto.snapshot().total_moments, batch.snapshot().total_moments);
}

#[test]
fn merge_requires_a_shared_layout_and_committed_replicas() {
    let mut a = prototype();
    let b = prototype();
    assert!(!a.is_compatible_with(&b));
    assert_eq!(a.merge(&b), Err(ConfigurationError::IncompatibleLayout));

    let mut replica = a.replicate();
    let state = ParticleState::new(ParticleType::Neutron, 1.0);
    replica
        .add_partial_history_contribution(CELLS[0], &state, &PhaseSpacePoint::new(), 1.0)
        .unwrap();
    assert_eq!(a.merge(&replica), Err(ConfigurationError::UncommittedReplica));

    replica.commit_history_contribution().unwrap();
    a.merge(&replica).unwrap();
    assert_eq!(a.histories(), 1);
    assert_eq!(a.entity_total_moments(CELLS[0]).unwrap()[0].m1, 1.0);
}

#[test]
fn replicas_cannot_be_reconfigured() {
    let proto = prototype();
    let mut replica = proto.replicate();
    assert_eq!(
        replica.assign_axis(Dimension::Time, &[0.0, 1.0]),
        Err(ConfigurationError::AxisAfterCommit)
    );
}

#[test]
fn batch_errors_abort_the_run() {
    let proto = prototype();

    assert_eq!(
        run_histories(&proto, 10, &BatchConfig::new(0), history).unwrap_err(),
        TallyError::Configuration(ConfigurationError::ZeroChunkSize)
    );

    let failing = |index: u64, core: &mut EstimatorCore| -> TallyResult<()> {
        if index == 37 {
            let state = ParticleState::new(ParticleType::Neutron, 1.0);
            core.add_partial_history_contribution(999, &state, &PhaseSpacePoint::new(), 1.0)?;
        }
        history(index, core)
    };
    assert_eq!(
        run_histories(&proto, 100, &BatchConfig::new(8), failing).unwrap_err(),
        TallyError::Configuration(ConfigurationError::UnknownEntity(999))
    );
}

#[test]
fn empty_batch_yields_an_empty_estimator() {
    let proto = prototype();
    let batch = run_histories(&proto, 0, &BatchConfig::default(), history).unwrap();
    assert_eq!(batch.histories(), 0);
    assert!(batch.total_moments().iter().all(Moments::is_zero));
}

#[test]
fn single_history_chunks_reduce_like_the_sequential_run() {
    let single = sequential();
    let proto = prototype();

    // One chunk per history: thousands of chunks flow through the waves.
    let config = BatchConfig::new(1);
    let narrow = run_histories(&proto, HISTORIES, &config.with_threads(1), history).unwrap();
    let wide = run_histories(&proto, HISTORIES, &config.with_threads(3), history).unwrap();

    assert_eq!(narrow.histories(), HISTORIES);
    assert_eq!(narrow.snapshot(), wide.snapshot());
    assert_snapshots_close(&wide.snapshot(), &single.snapshot());
}

#[test]
fn lowest_failing_chunk_reports_its_error() {
    let proto = prototype();
    let failing = |index: u64, core: &mut EstimatorCore| -> TallyResult<()> {
        if index == 7 || index == 96 {
            let state = ParticleState::new(ParticleType::Neutron, 1.0);
            core.add_partial_history_contribution(1000 + index, &state, &PhaseSpacePoint::new(), 1.0)?;
        }
        history(index, core)
    };

    for _ in 0..20 {
        assert_eq!(
            run_histories(&proto, 200, &BatchConfig::new(8).with_threads(4), failing).unwrap_err(),
            TallyError::Configuration(ConfigurationError::UnknownEntity(1007))
        );
    }
}

#[test]
fn chunk_bounds_saturate_at_the_history_count() {
    let proto = prototype();
    let reject = |index: u64, core: &mut EstimatorCore| -> TallyResult<()> {
        let state = ParticleState::new(ParticleType::Neutron, 1.0);
        core.add_partial_history_contribution(index, &state, &PhaseSpacePoint::new(), 1.0)
    };

    // Two chunks; the second starts one history before u64::MAX.
    let config = BatchConfig::new(u64::MAX - 1).with_threads(2);
    assert_eq!(
        run_histories(&proto, u64::MAX, &config, reject).unwrap_err(),
        TallyError::Configuration(ConfigurationError::UnknownEntity(0))
    );
}
