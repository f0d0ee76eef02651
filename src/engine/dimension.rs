//! Phase-space dimension tags.
//!
//! A [`Dimension`] identifies one axis of the phase space an estimator can
//! bin on. Tags carry no behavior beyond identity, a stable name, and the
//! boundary semantics ([`DimensionKind`]) their discretization uses.
//!
//! Coordinates of every dimension are normalized to `f64` at the indexer
//! boundary; integer-valued dimensions (collision counts) convert losslessly.

use crate::engine::types::ParticleState;


/// Number of dimension tags.
pub const DIMENSION_COUNT: usize = 6;

/// One axis of the observer phase space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dimension {
    /// Particle energy.
    Energy,
    /// Energy of the source particle that started the history.
    SourceEnergy,
    /// Cosine of the angle between the direction of flight and a reference
    /// direction (usually a surface normal). Supplied externally.
    AngleCosine,
    /// Simulation time.
    Time,
    /// Time at which the source particle was born.
    SourceTime,
    /// Number of collisions suffered so far.
    CollisionCount,
}

/// Boundary semantics used to discretize a dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DimensionKind {
    /// `n` boundaries delimit `n - 1` half-open bins, the last one closed.
    Continuous,
    /// `n` boundaries are inclusive upper edges of `n` bins; the last bin is
    /// an open tail.
    DiscreteCount,
}

impl Dimension {
    /// Every dimension, in declaration order.
    pub const ALL: [Dimension; DIMENSION_COUNT] = [
        Dimension::Energy,
        Dimension::SourceEnergy,
        Dimension::AngleCosine,
        Dimension::Time,
        Dimension::SourceTime,
        Dimension::CollisionCount,
    ];

    /// Dense position of the tag, usable as an array index.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Human-readable name used in bin descriptions and logs.
    pub fn name(self) -> &'static str {
        match self {
            Dimension::Energy => "Energy",
            Dimension::SourceEnergy => "Source Energy",
            Dimension::AngleCosine => "Cosine",
            Dimension::Time => "Time",
            Dimension::SourceTime => "Source Time",
            Dimension::CollisionCount => "Collision Number",
        }
    }

    /// Boundary semantics for this dimension.
    pub const fn kind(self) -> DimensionKind {
        match self {
            Dimension::CollisionCount => DimensionKind::DiscreteCount,
            _ => DimensionKind::Continuous,
        }
    }

    /// Reads this dimension's coordinate off a particle state.
    ///
    /// Returns `None` for coordinates the state does not carry; those must be
    /// supplied as auxiliary coordinates.
    pub fn coordinate_of(self, state: &ParticleState) -> Option<f64> {
        match self {
            Dimension::Energy => Some(state.energy),
            Dimension::SourceEnergy => Some(state.source_energy),
            Dimension::AngleCosine => None,
            Dimension::Time => Some(state.time),
            Dimension::SourceTime => Some(state.source_time),
            Dimension::CollisionCount => Some(f64::from(state.collision_number)),
        }
    }
}
