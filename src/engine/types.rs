//! Core Tally Types and Identifiers
//!
//! This module defines the **fundamental identifiers and particle-facing value
//! types** shared by every other part of the tally engine. Nothing in here has
//! behavior beyond identity and plain data access.
//!
//! ## Identifiers
//!
//! - [`EntityId`] names a geometric cell or surface. It is opaque to the
//!   engine; entities are mapped to dense indices at configuration time.
//! - [`EstimatorId`] names an estimator within a simulation.
//! - [`BinIndex`] addresses one flat slot of the discretized phase space
//!   (including the response-function offset).
//!
//! ## Particle state
//!
//! The physics and geometry collaborators hand the engine a
//! [`ParticleState`]: the subset of a particle's state that the engine may
//! bin on or hand to a response function. Coordinates that are not stored on
//! the particle itself (e.g. the cosine between the direction of flight and a
//! surface normal) are supplied separately, see
//! [`PhaseSpacePoint`](crate::engine::indexer::PhaseSpacePoint).

/// Opaque identifier of a cell or surface that can receive contributions.
pub type EntityId = u64;

/// Identifier of an estimator.
pub type EstimatorId = u32;

/// Flat index into the `bins × response functions` slot space.
pub type BinIndex = usize;

/// Dense index assigned to an entity at configuration time.
pub type EntityIndex = usize;

/// Upper bound on the number of flat slots a single estimator may own.
///
/// Each entity owns one [`Moments`](crate::engine::moments::Moments) per
/// slot, so this caps the per-entity memory footprint at a few hundred MiB.
pub const MAX_FLAT_BINS: usize = 1 << 24;

/// Particle categories an estimator can be restricted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParticleType {
    /// Neutral hadron.
    Neutron,
    /// Gamma / x-ray.
    Photon,
    /// Electron.
    Electron,
    /// Positron.
    Positron,
    /// Adjoint neutron.
    AdjointNeutron,
    /// Adjoint photon.
    AdjointPhoton,
    /// Adjoint electron.
    AdjointElectron,
}

impl ParticleType {
    /// Every particle type, in declaration order.
    pub const ALL: [ParticleType; 7] = [
        ParticleType::Neutron,
        ParticleType::Photon,
        ParticleType::Electron,
        ParticleType::Positron,
        ParticleType::AdjointNeutron,
        ParticleType::AdjointPhoton,
        ParticleType::AdjointElectron,
    ];

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            ParticleType::Neutron => "neutron",
            ParticleType::Photon => "photon",
            ParticleType::Electron => "electron",
            ParticleType::Positron => "positron",
            ParticleType::AdjointNeutron => "adjoint neutron",
            ParticleType::AdjointPhoton => "adjoint photon",
            ParticleType::AdjointElectron => "adjoint electron",
        }
    }
}

/// Snapshot of a particle at the moment it produces a contribution.
///
/// ## Semantics
/// This is a plain value handed in by the transport collaborators. The engine
/// reads it to build phase-space coordinates and passes it to every bound
/// response function; it never mutates it.
///
/// `weight` is informational only: contributions handed to the engine are
/// expected to be pre-weighted.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleState {
    /// Particle category, checked against the estimator's accepted set.
    pub particle_type: ParticleType,

    /// Kinetic energy (MeV).
    pub energy: f64,

    /// Energy at birth in the source (MeV).
    pub source_energy: f64,

    /// Simulation time (s).
    pub time: f64,

    /// Time at birth in the source (s).
    pub source_time: f64,

    /// Number of collisions suffered so far.
    pub collision_number: u32,

    /// Statistical weight.
    pub weight: f64,
}

impl ParticleState {
    /// Creates a unit-weight state of the given type and energy, born at
    /// time zero with that same energy and no collisions.
    pub fn new(particle_type: ParticleType, energy: f64) -> Self {
        Self {
            particle_type,
            energy,
            source_energy: energy,
            time: 0.0,
            source_time: 0.0,
            collision_number: 0,
            weight: 1.0,
        }
    }

    /// Sets the simulation time.
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Sets the collision count.
    pub fn with_collision_number(mut self, collision_number: u32) -> Self {
        self.collision_number = collision_number;
        self
    }

    /// Sets the source energy.
    pub fn with_source_energy(mut self, source_energy: f64) -> Self {
        self.source_energy = source_energy;
        self
    }

    /// Sets the source time.
    pub fn with_source_time(mut self, source_time: f64) -> Self {
        self.source_time = source_time;
        self
    }

    /// Sets the statistical weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}
