//! Error types for estimator configuration and contribution scoring.
//!
//! This module declares focused, composable error types used across the
//! tally engine. Each error carries enough context to make a failure
//! actionable while remaining small and cheap to pass around or convert into
//! the aggregate [`TallyError`].
//!
//! ## Taxonomy
//! * [`ConfigurationError`]: structural misuse: bad boundaries, late setup
//!   calls, unknown entities, mismatched replicas. These abort estimator setup.
//! * [`OutOfRangeError`]: a caller asked for a bin index without first
//!   checking that the value lies inside the discretization. The normal
//!   contribution path never produces this; it silently drops such samples.
//! * [`InvalidValueError`]: a single contribution (or the moment update it
//!   would cause) is not finite, or the particle type is not accepted. These
//!   reject one contribution without invalidating the run.
//!
//! ## Typical flow
//! Low-level operations return the dedicated error type. Orchestration code
//! uses `?` to bubble failures into [`TallyError`], which callers match on to
//! decide whether to abort or to skip a single contribution:
//! ```ignore
//! match core.add_partial_history_contribution(cell, &state, &point, value) {
//!     Ok(()) => {}
//!     Err(TallyError::InvalidValue(e)) => { rejected += 1; tracing::debug!("{e}"); }
//!     Err(e) => return Err(e),
//! }
//! ```
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is short and suitable for operator logs.
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::fmt;

use crate::engine::dimension::Dimension;
use crate::engine::types::{BinIndex, EntityId, ParticleType};


/// Structural misuse of the estimator or one of its configuration parts.
///
/// ## Notes
/// These represent programming or input errors upstream. None of them can
/// occur once an estimator has been configured and is only receiving
/// contributions, except [`ConfigurationError::UnknownEntity`].

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {

    /// An axis was given no boundaries at all.
    EmptyBoundaries {
        /// Axis being configured.
        dimension: Dimension,
    },

    /// An axis was given fewer boundaries than its kind requires.
    TooFewBoundaries {
        /// Axis being configured.
        dimension: Dimension,
        /// Minimum number of boundaries for this kind.
        required: usize,
        /// Number supplied.
        got: usize,
    },

    /// Boundaries were not strictly increasing (includes duplicates).
    UnsortedBoundaries {
        /// Axis being configured.
        dimension: Dimension,
        /// Position of the first offending boundary.
        position: usize,
    },

    /// A boundary was NaN, or infinite where only finite values are allowed.
    NonFiniteBoundary {
        /// Axis being configured.
        dimension: Dimension,
        /// Position of the offending boundary.
        position: usize,
    },

    /// A discrete-count axis was given a negative boundary.
    NegativeCountBoundary {
        /// Axis being configured.
        dimension: Dimension,
        /// Offending boundary value.
        value: f64,
    },

    /// The same dimension was discretized twice.
    DuplicateDimension(Dimension),

    /// An axis was assigned after contributions or commits had begun.
    AxisAfterCommit,

    /// Response functions were assigned after contributions or commits had begun.
    ResponseAfterCommit,

    /// Entities were assigned after contributions or commits had begun.
    EntitiesAfterCommit,

    /// Accepted particle types were changed after contributions or commits
    /// had begun.
    ParticleTypesAfterCommit,

    /// An empty response-function list was supplied.
    NoResponseFunctions,

    /// An empty entity list was supplied.
    NoEntities,

    /// Entity ids and normalization constants differ in length.
    NormalizationMismatch {
        /// Number of entity ids.
        ids: usize,
        /// Number of normalization constants.
        constants: usize,
    },

    /// A normalization constant was not finite and strictly positive.
    InvalidNormalization {
        /// Entity the constant belongs to.
        entity: EntityId,
        /// Offending constant.
        value: f64,
    },

    /// The estimator multiplier was not finite and strictly positive.
    InvalidMultiplier(f64),

    /// An empty particle-type set was supplied.
    NoParticleTypes,

    /// A contribution or query referenced an entity that is not bound.
    UnknownEntity(EntityId),

    /// Two replicas with different layouts were merged.
    IncompatibleLayout,

    /// A replica with uncommitted history content was merged.
    UncommittedReplica,

    /// The product of all bin counts does not fit in the slot space.
    BinCountOverflow,

    /// A response-function index beyond the bound count was requested.
    ResponseIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of bound response functions.
        count: usize,
    },

    /// A response function is not allowed on this estimator.
    IncompatibleResponse {
        /// Name of the rejected response function.
        name: String,
    },

    /// A parallel batch was asked to use chunks of zero histories.
    ZeroChunkSize,

    /// The worker pool for a parallel batch could not be built.
    ThreadPool(String),
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::EmptyBoundaries { dimension } => {
                write!(f, "{} axis has no boundaries", dimension.name())
            }
            ConfigurationError::TooFewBoundaries { dimension, required, got } => write!(
                f,
                "{} axis needs at least {} boundaries, got {}",
                dimension.name(), required, got
            ),
            ConfigurationError::UnsortedBoundaries { dimension, position } => write!(
                f,
                "{} boundaries are not strictly increasing at position {}",
                dimension.name(), position
            ),
            ConfigurationError::NonFiniteBoundary { dimension, position } => write!(
                f,
                "{} boundary at position {} is not finite",
                dimension.name(), position
            ),
            ConfigurationError::NegativeCountBoundary { dimension, value } => write!(
                f,
                "{} boundary {} is negative",
                dimension.name(), value
            ),
            ConfigurationError::DuplicateDimension(dimension) => {
                write!(f, "{} axis is already discretized", dimension.name())
            }
            ConfigurationError::AxisAfterCommit => {
                f.write_str("cannot assign an axis once contributions have begun")
            }
            ConfigurationError::ResponseAfterCommit => {
                f.write_str("cannot assign response functions once contributions have begun")
            }
            ConfigurationError::EntitiesAfterCommit => {
                f.write_str("cannot assign entities once contributions have begun")
            }
            ConfigurationError::ParticleTypesAfterCommit => {
                f.write_str("cannot change particle types once contributions have begun")
            }
            ConfigurationError::NoResponseFunctions => f.write_str("no response functions supplied"),
            ConfigurationError::NoEntities => f.write_str("no entities supplied"),
            ConfigurationError::NormalizationMismatch { ids, constants } => write!(
                f,
                "{} entity ids but {} normalization constants",
                ids, constants
            ),
            ConfigurationError::InvalidNormalization { entity, value } => write!(
                f,
                "entity {} has invalid normalization constant {}",
                entity, value
            ),
            ConfigurationError::InvalidMultiplier(value) => {
                write!(f, "estimator multiplier {} must be finite and positive", value)
            }
            ConfigurationError::NoParticleTypes => f.write_str("no particle types supplied"),
            ConfigurationError::UnknownEntity(entity) => write!(f, "entity {} is not assigned", entity),
            ConfigurationError::IncompatibleLayout => {
                f.write_str("cannot merge estimators with different layouts")
            }
            ConfigurationError::UncommittedReplica => {
                f.write_str("cannot merge a replica holding an uncommitted history")
            }
            ConfigurationError::BinCountOverflow => f.write_str("phase-space bin count overflow"),
            ConfigurationError::ResponseIndexOutOfRange { index, count } => write!(
                f,
                "response function index {} out of range ({} bound)",
                index, count
            ),
            ConfigurationError::IncompatibleResponse { name } => {
                write!(f, "response function '{}' is not spatially uniform", name)
            }
            ConfigurationError::ZeroChunkSize => f.write_str("history chunk size must be positive"),
            ConfigurationError::ThreadPool(reason) => {
                write!(f, "failed to build worker pool: {}", reason)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Returned when the unconditional bin-index path is handed a value outside
/// the discretization.
///
/// ## Context
/// Callers are expected to check `contains` / `is_in_phase_space` first; the
/// contribution path does so and never surfaces this error.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutOfRangeError {

    /// A coordinate lies outside one axis.
    Value {
        /// Axis that rejected the value.
        dimension: Dimension,
        /// Offending value.
        value: f64,
    },

    /// A coordinate required by an axis was not supplied.
    MissingCoordinate(Dimension),

    /// A flat index lies beyond the slot space.
    FlatIndex {
        /// Offending index.
        index: BinIndex,
        /// Number of slots.
        total: usize,
    },
}

impl fmt::Display for OutOfRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutOfRangeError::Value { dimension, value } => {
                write!(f, "{} value {} is outside the discretization", dimension.name(), value)
            }
            OutOfRangeError::MissingCoordinate(dimension) => {
                write!(f, "no {} coordinate supplied", dimension.name())
            }
            OutOfRangeError::FlatIndex { index, total } => {
                write!(f, "flat bin index {} out of range ({} slots)", index, total)
            }
        }
    }
}

impl std::error::Error for OutOfRangeError {}

/// Returned when a single contribution cannot be scored.
///
/// ## Notes
/// Rejecting the contribution leaves all statistics untouched. Propagating a
/// non-finite value into shared moments would poison every downstream result.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidValueError {

    /// The raw contribution was NaN or infinite.
    NonFiniteContribution(f64),

    /// A response function evaluated to NaN or infinity.
    NonFiniteResponse {
        /// Index of the response function.
        response: usize,
        /// Value it produced.
        value: f64,
    },

    /// A moment update would overflow to a non-finite value.
    NonFiniteMoment {
        /// Contribution that would have been folded.
        contribution: f64,
    },

    /// A coordinate needed by a bound axis is not available.
    MissingCoordinate(Dimension),

    /// The particle type is not accepted by this estimator.
    RejectedParticleType(ParticleType),
}

impl fmt::Display for InvalidValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidValueError::NonFiniteContribution(value) => {
                write!(f, "contribution {} is not finite", value)
            }
            InvalidValueError::NonFiniteResponse { response, value } => {
                write!(f, "response function {} evaluated to {}", response, value)
            }
            InvalidValueError::NonFiniteMoment { contribution } => {
                write!(f, "folding contribution {} would overflow the moments", contribution)
            }
            InvalidValueError::MissingCoordinate(dimension) => {
                write!(f, "no {} coordinate available for this contribution", dimension.name())
            }
            InvalidValueError::RejectedParticleType(particle_type) => {
                write!(f, "{} contributions are not accepted", particle_type.name())
            }
        }
    }
}

impl std::error::Error for InvalidValueError {}

/// Aggregate error for all tally operations.
///
/// `From<T>` conversions allow `?` from each dedicated error type.

#[derive(Debug, Clone, PartialEq)]
pub enum TallyError {

    /// Structural misuse; abort setup.
    Configuration(ConfigurationError),

    /// Unchecked bin-index request outside the phase space.
    OutOfRange(OutOfRangeError),

    /// A single contribution was rejected.
    InvalidValue(InvalidValueError),
}

impl TallyError {
    /// Returns `true` for errors that reject one contribution but leave the
    /// estimator usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TallyError::InvalidValue(_))
    }
}

impl fmt::Display for TallyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TallyError::Configuration(e) => write!(f, "configuration error: {e}"),
            TallyError::OutOfRange(e) => write!(f, "out of range: {e}"),
            TallyError::InvalidValue(e) => write!(f, "invalid value: {e}"),
        }
    }
}

impl std::error::Error for TallyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TallyError::Configuration(e) => Some(e),
            TallyError::OutOfRange(e) => Some(e),
            TallyError::InvalidValue(e) => Some(e),
        }
    }
}

impl From<ConfigurationError> for TallyError {
    fn from(e: ConfigurationError) -> Self { TallyError::Configuration(e) }
}
impl From<OutOfRangeError> for TallyError {
    fn from(e: OutOfRangeError) -> Self { TallyError::OutOfRange(e) }
}
impl From<InvalidValueError> for TallyError {
    fn from(e: InvalidValueError) -> Self { TallyError::InvalidValue(e) }
}

/// Result alias used throughout the engine.
pub type TallyResult<T> = Result<T, TallyError>;
