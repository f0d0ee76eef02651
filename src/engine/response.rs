//! Response Function Abstractions
//!
//! A **response function** is an estimator-specific scoring transform applied
//! to a particle state. The contribution handed to the engine already carries
//! the particle weight and any problem-specific multiplier (a reaction cross
//! section, a track length); the response function only adds the final
//! scoring factor.
//!
//! ## Design Goals
//!
//! - **Polymorphic, not hierarchical**
//!   by exposing one small trait, [`ResponseFunction`], rather than a class
//!   tree.
//!
//! - **Lightweight definitions**
//!   through closure-backed responses ([`FnResponse`]) so a caller does not
//!   need a new type for every scoring transform.
//!
//! - **Explicit defaults**
//!   [`UniformResponse`] is an ordinary value constructed where needed; there
//!   is no process-wide default instance.
//!
//! ## Thread Safety
//!
//! Response functions are bound during setup and then evaluated concurrently
//! by every worker replica, so they must be `Send + Sync` and must not rely
//! on interior mutation.
//!
//! ## Slot layout
//!
//! Each bound response function owns an independent slice of the flat slot
//! space; see [`PhaseSpaceIndexer`](crate::engine::indexer::PhaseSpaceIndexer).

use std::sync::Arc;

use crate::engine::types::ParticleState;


/// A scoring transform evaluated against a particle state.
///
/// Implementations must be deterministic for a given state: replicas on
/// different threads evaluate the same function and are later summed.

pub trait ResponseFunction: Send + Sync {
    /// Human-readable name, used in reports.
    fn name(&self) -> &str;

    /// Multiplier for a contribution made by `state`.
    fn evaluate(&self, state: &ParticleState) -> f64;

    /// Whether the function is independent of position.
    ///
    /// Some estimators (track-length flux in a cell) can only score
    /// spatially uniform responses. The value must be stable for a given
    /// instance.
    fn is_spatially_uniform(&self) -> bool;
}

/// Shared handle to a bound response function.
pub type SharedResponse = Arc<dyn ResponseFunction>;

/// The identity response: every state scores `1.0`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformResponse;

impl UniformResponse {
    /// Name reported for the identity response.
    pub const NAME: &'static str = "uniform";

    /// A shared handle to a new identity response.
    pub fn shared() -> SharedResponse {
        Arc::new(UniformResponse)
    }
}

impl ResponseFunction for UniformResponse {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[inline]
    fn evaluate(&self, _state: &ParticleState) -> f64 {
        1.0
    }

    fn is_spatially_uniform(&self) -> bool {
        true
    }
}

/// A concrete [`ResponseFunction`] backed by a function or closure.
///
/// It stores:
/// - a human-readable name,
/// - the spatial-uniformity flag,
/// - and the function itself.
///
/// ```ignore
/// let inverse_velocity = FnResponse::uniform("1/v", |s: &ParticleState| 1.0 / speed(s.energy));
/// ```

pub struct FnResponse<F>
where
    F: Fn(&ParticleState) -> f64 + Send + Sync + 'static,
{
    name: String,
    spatially_uniform: bool,
    f: F,
}

impl<F> FnResponse<F>
where
    F: Fn(&ParticleState) -> f64 + Send + Sync + 'static,
{
    /// Creates a new function-backed response.
    ///
    /// # Parameters
    /// - `name`: Label used in reports.
    /// - `spatially_uniform`: Whether the function ignores position.
    /// - `f`: The function evaluated per contribution.
    pub fn new(name: impl Into<String>, spatially_uniform: bool, f: F) -> Self {
        Self { name: name.into(), spatially_uniform, f }
    }

    /// Creates a spatially uniform function-backed response.
    pub fn uniform(name: impl Into<String>, f: F) -> Self {
        Self::new(name, true, f)
    }

    /// Wraps the response in a shared handle.
    pub fn shared(self) -> SharedResponse {
        Arc::new(self)
    }
}

impl<F> ResponseFunction for FnResponse<F>
where
    F: Fn(&ParticleState) -> f64 + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn evaluate(&self, state: &ParticleState) -> f64 {
        (self.f)(state)
    }

    fn is_spatially_uniform(&self) -> bool {
        self.spatially_uniform
    }
}
