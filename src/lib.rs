//! # MC Tally
//!
//! Multi-dimensional Monte Carlo tally (estimator) engine: turns per-history
//! particle contributions into histogrammed moment statistics over a set of
//! cells or surfaces.
//!
//! ## Design Goals
//! - Generic phase-space binning over continuous and discrete-count axes
//! - Exactly-once, all-or-nothing commit of every particle history
//! - Additive moments, so parallel replicas reduce by plain addition
//! - Deterministic parallel batches on Rayon
//!
//! ## Typical use
//! ```ignore
//! let mut core = EstimatorConfig::new(1)
//!     .with_axis(Dimension::Energy, [0.0, 5.0, 10.0])
//!     .with_entity(7, 1.0)
//!     .build()?;
//!
//! let state = ParticleState::new(ParticleType::Neutron, 2.0);
//! core.add_partial_history_contribution(7, &state, &PhaseSpacePoint::new(), 1.0)?;
//! core.commit_history_contribution()?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(dead_code)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Estimator

pub use engine::estimator::{
    AxisConfig,
    EntityConfig,
    EstimatorConfig,
    EstimatorCore,
    EstimatorLayout,
};

pub use engine::scheduler::{
    BatchConfig,
    run_histories,
};

pub use engine::report::{
    ReportContext,
    EntitySnapshot,
    EstimatorSnapshot,
};

// Phase space

pub use engine::dimension::{Dimension, DimensionKind};
pub use engine::discretization::DimensionDiscretization;
pub use engine::indexer::{DecodedBin, PhaseSpaceIndexer, PhaseSpacePoint};

// Scoring

pub use engine::response::{
    ResponseFunction,
    SharedResponse,
    UniformResponse,
    FnResponse,
};

pub use engine::moments::{Moments, MomentArray};
pub use engine::statistics::ProcessedMoments;
pub use engine::entity::{EntityRecord, EntityRegistry};
pub use engine::history::HistoryWorkingSet;

pub use engine::error::{
    TallyResult,
    TallyError,
    ConfigurationError,
    OutOfRangeError,
    InvalidValueError,
};

pub use engine::types::{
    EntityId,
    EstimatorId,
    BinIndex,
    ParticleType,
    ParticleState,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used tally types.
///
/// Import with:
/// ```rust
/// use mc_tally::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        EstimatorConfig,
        EstimatorCore,
        BatchConfig,
        run_histories,
        ReportContext,
        Dimension,
        PhaseSpacePoint,
        ResponseFunction,
        UniformResponse,
        FnResponse,
        Moments,
        ProcessedMoments,
        TallyError,
        TallyResult,
        ParticleType,
        ParticleState,
    };
}
