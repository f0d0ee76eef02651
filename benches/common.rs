#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use mc_tally::engine::dimension::Dimension;
use mc_tally::engine::error::TallyResult;
use mc_tally::engine::estimator::{EstimatorConfig, EstimatorCore};
use mc_tally::engine::indexer::PhaseSpacePoint;
use mc_tally::engine::response::{FnResponse, UniformResponse};
use mc_tally::engine::types::{ParticleState, ParticleType};

pub const CELLS: u64 = 64;
pub const HISTORIES_SMALL: u64 = 10_000;
pub const HISTORIES_MED: u64 = 100_000;
pub const TRACKS_PER_HISTORY: u32 = 8;

/// 64 cells, 100 energy bins x 4 collision bins, two responses.
pub fn make_estimator() -> EstimatorCore {
    let energies: Vec<f64> = (0..=100).map(|i| f64::from(i) * 0.2).collect();
    let mut config = EstimatorConfig::new(1)
        .with_axis(Dimension::Energy, energies)
        .with_axis(Dimension::CollisionCount, [0.0, 1.0, 4.0, f64::INFINITY]);
    for cell in 0..CELLS {
        config = config.with_entity(cell, 1.0);
    }
    config
        .build_with_responses(vec![
            UniformResponse::shared(),
            FnResponse::uniform("energy", |s: &ParticleState| s.energy).shared(),
        ])
        .unwrap()
}

/// Pre-generated contributions: (cell, state, value).
pub fn make_tracks(count: usize, seed: u64) -> Vec<(u64, ParticleState, f64)> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let state = ParticleState::new(ParticleType::Neutron, rng.random_range(0.0..20.0))
                .with_collision_number(rng.random_range(0..10));
            (rng.random_range(0..CELLS), state, rng.random::<f64>())
        })
        .collect()
}

/// One history of `TRACKS_PER_HISTORY` random contributions.
pub fn history(index: u64, core: &mut EstimatorCore) -> TallyResult<()> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(index);
    let aux = PhaseSpacePoint::new();
    for _ in 0..TRACKS_PER_HISTORY {
        let state = ParticleState::new(ParticleType::Neutron, rng.random_range(0.0..20.0))
            .with_collision_number(rng.random_range(0..10));
        core.add_partial_history_contribution(rng.random_range(0..CELLS), &state, &aux, rng.random::<f64>())?;
    }
    Ok(())
}
