//! Estimator configuration and the contribution/commit protocol.
//!
//! This module defines the central object of the tally engine,
//! [`EstimatorCore`], responsible for:
//!
//! * binding axes, response functions, entities and accepted particle types,
//! * scoring partial contributions of the running history into its
//!   [`HistoryWorkingSet`],
//! * folding each completed history into permanent moments exactly once,
//! * replicating itself for parallel workers and merging replicas back.
//!
//! ## Shared configuration
//!
//! Everything fixed at setup lives in an [`EstimatorLayout`] behind an
//! [`Arc`]. Replicas created with [`EstimatorCore::replicate`] share the same
//! allocation, so merge compatibility is a pointer comparison and workers
//! read configuration without synchronization.
//!
//! ## Lifecycle
//!
//! ```text
//! setup (assign_*) ──▶ add_partial_history_contribution* ──▶ commit_history_contribution
//!                               ▲                                      │
//!                               └──────────────── next history ────────┘
//! ```
//!
//! Setup calls are rejected once any history has been committed or any
//! contribution is pending.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::engine::dimension::Dimension;
use crate::engine::discretization::DimensionDiscretization;
use crate::engine::entity::{EntityRecord, EntityRegistry};
use crate::engine::error::{ConfigurationError, InvalidValueError, TallyError, TallyResult};
use crate::engine::history::HistoryWorkingSet;
use crate::engine::indexer::{PhaseSpaceIndexer, PhaseSpacePoint};
use crate::engine::moments::{self, MomentArray, Moments};
use crate::engine::response::{SharedResponse, UniformResponse};
use crate::engine::types::{EntityId, EstimatorId, ParticleState, ParticleType};


/// Plain description of one axis.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisConfig {
    /// Dimension binned on.
    pub dimension: Dimension,

    /// Bin boundaries, ascending.
    pub boundaries: Vec<f64>,
}

/// Plain description of one entity.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityConfig {
    /// Cell or surface id.
    pub id: EntityId,

    /// Normalization constant (volume, area), `> 0`.
    pub normalization: f64,
}

/// Data-only description of an estimator, assembled by a front end.
///
/// ```ignore
/// let core = EstimatorConfig::new(4)
///     .with_particle_types([ParticleType::Neutron])
///     .with_axis(Dimension::Energy, [0.0, 1e-6, 1.0, 20.0])
///     .with_entity(10, 1.0)
///     .build()?;
/// ```

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EstimatorConfig {
    /// Estimator id.
    pub id: EstimatorId,

    /// Multiplier applied when processing moments.
    pub multiplier: f64,

    /// Accepted particle types; empty means every type.
    pub particle_types: Vec<ParticleType>,

    /// Axes, in significance order.
    pub axes: Vec<AxisConfig>,

    /// Entities with their normalization constants.
    pub entities: Vec<EntityConfig>,
}

impl EstimatorConfig {
    /// A configuration with unit multiplier and nothing else bound.
    pub fn new(id: EstimatorId) -> Self {
        Self {
            id,
            multiplier: 1.0,
            particle_types: Vec::new(),
            axes: Vec::new(),
            entities: Vec::new(),
        }
    }

    /// Sets the multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Restricts the accepted particle types.
    pub fn with_particle_types(mut self, types: impl IntoIterator<Item = ParticleType>) -> Self {
        self.particle_types = types.into_iter().collect();
        self
    }

    /// Appends an axis.
    pub fn with_axis(mut self, dimension: Dimension, boundaries: impl Into<Vec<f64>>) -> Self {
        self.axes.push(AxisConfig { dimension, boundaries: boundaries.into() });
        self
    }

    /// Appends an entity.
    pub fn with_entity(mut self, id: EntityId, normalization: f64) -> Self {
        self.entities.push(EntityConfig { id, normalization });
        self
    }

    /// Builds an estimator scoring the identity response.
    pub fn build(&self) -> Result<EstimatorCore, ConfigurationError> {
        self.build_with_responses(vec![UniformResponse::shared()])
    }

    /// Builds an estimator scoring the given response functions.
    ///
    /// ## Errors
    /// The first [`ConfigurationError`] raised by the equivalent sequence of
    /// setup calls.

    pub fn build_with_responses(&self, responses: Vec<SharedResponse>) -> Result<EstimatorCore, ConfigurationError> {
        let mut core = EstimatorCore::new(self.id, self.multiplier)?;
        if !self.particle_types.is_empty() {
            core.set_particle_types(self.particle_types.iter().copied())?;
        }
        for axis in &self.axes {
            core.assign_axis(axis.dimension, &axis.boundaries)?;
        }
        core.assign_response_functions(responses)?;
        if !self.entities.is_empty() {
            let ids: Vec<EntityId> = self.entities.iter().map(|e| e.id).collect();
            let norms: Vec<f64> = self.entities.iter().map(|e| e.normalization).collect();
            core.assign_entities(&ids, &norms)?;
        }
        Ok(core)
    }
}

/// Immutable configuration shared by an estimator and all of its replicas.
#[derive(Clone)]
pub struct EstimatorLayout {
    id: EstimatorId,
    multiplier: f64,
    particle_types: BTreeSet<ParticleType>,
    indexer: PhaseSpaceIndexer,
    responses: Vec<SharedResponse>,
    entities: EntityRegistry,
    require_uniform_responses: bool,
}

impl EstimatorLayout {
    fn new(id: EstimatorId, multiplier: f64) -> Self {
        Self {
            id,
            multiplier,
            particle_types: ParticleType::ALL.into_iter().collect(),
            indexer: PhaseSpaceIndexer::new(),
            responses: vec![UniformResponse::shared()],
            entities: EntityRegistry::new(),
            require_uniform_responses: false,
        }
    }

    /// Estimator id.
    #[inline]
    pub fn id(&self) -> EstimatorId {
        self.id
    }

    /// Multiplier applied when processing moments.
    #[inline]
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Accepted particle types.
    #[inline]
    pub fn particle_types(&self) -> &BTreeSet<ParticleType> {
        &self.particle_types
    }

    /// Axes and slot layout.
    #[inline]
    pub fn indexer(&self) -> &PhaseSpaceIndexer {
        &self.indexer
    }

    /// Bound response functions; index `r` owns slot slice `r`.
    #[inline]
    pub fn response_functions(&self) -> &[SharedResponse] {
        &self.responses
    }

    /// Bound entities.
    #[inline]
    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    /// Whether only spatially uniform response functions may be bound.
    #[inline]
    pub fn requires_uniform_responses(&self) -> bool {
        self.require_uniform_responses
    }
}

impl fmt::Debug for EstimatorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstimatorLayout")
            .field("id", &self.id)
            .field("multiplier", &self.multiplier)
            .field("particle_types", &self.particle_types)
            .field("indexer", &self.indexer)
            .field("responses", &self.responses.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("entities", &self.entities.ids())
            .finish()
    }
}

/// One estimator (or one worker replica of it).
///
/// ## Role
/// Owns the permanent moments of every entity, the estimator-level totals,
/// and the working set of the history currently in flight.
///
/// ## Concurrency
/// `EstimatorCore` is `Send` but is meant to be driven by a single worker.
/// Parallel runs give each worker its own [`replicate`](Self::replicate)
/// and reduce with [`merge`](Self::merge).

#[derive(Debug)]
pub struct EstimatorCore {
    layout: Arc<EstimatorLayout>,

    records: Vec<EntityRecord>,
    total_bin_moments: MomentArray,
    global_moments: MomentArray,

    working: HistoryWorkingSet,
    response_values: Vec<f64>,

    histories: u64,
    sealed: bool,
}

impl EstimatorCore {
    /// Creates an estimator with no axes, the identity response and no
    /// entities. Every particle type is accepted.
    ///
    /// ## Errors
    /// [`ConfigurationError::InvalidMultiplier`] unless `multiplier` is
    /// finite and `> 0`.

    pub fn new(id: EstimatorId, multiplier: f64) -> Result<Self, ConfigurationError> {
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(ConfigurationError::InvalidMultiplier(multiplier));
        }
        let mut core = Self {
            layout: Arc::new(EstimatorLayout::new(id, multiplier)),
            records: Vec::new(),
            total_bin_moments: Vec::new(),
            global_moments: Vec::new(),
            working: HistoryWorkingSet::new(0, 1, 1),
            response_values: Vec::new(),
            histories: 0,
            sealed: false,
        };
        core.reshape();
        Ok(core)
    }

    // ---------------------------------------------------------------------
    // Setup
    // ---------------------------------------------------------------------

    fn check_setup(&self, late: ConfigurationError) -> Result<(), ConfigurationError> {
        if self.sealed || self.working.is_dirty() {
            return Err(late);
        }
        Ok(())
    }

    /// Reallocates every accumulator to match the layout.
    fn reshape(&mut self) {
        let indexer = self.layout.indexer();
        let total_bins = indexer.total_bins();
        let responses = indexer.response_count();
        let entities = self.layout.entities().len();

        self.records = (0..entities).map(|_| EntityRecord::new(total_bins, responses)).collect();
        self.total_bin_moments = vec![Moments::ZERO; total_bins];
        self.global_moments = vec![Moments::ZERO; responses];
        self.working = HistoryWorkingSet::new(entities, indexer.bins_per_response(), responses);
        self.response_values = vec![0.0; responses];
    }

    /// Discretizes `dimension` with `boundaries` and appends it as the least
    /// significant axis so far.
    ///
    /// ## Errors
    /// * [`ConfigurationError::AxisAfterCommit`] once contributions began.
    /// * any boundary validation error of [`DimensionDiscretization::new`].
    /// * [`ConfigurationError::DuplicateDimension`] /
    ///   [`ConfigurationError::BinCountOverflow`] from the indexer.

    pub fn assign_axis(&mut self, dimension: Dimension, boundaries: &[f64]) -> Result<(), ConfigurationError> {
        let discretization = DimensionDiscretization::new(dimension, boundaries.to_vec())?;
        self.assign_discretization(discretization)
    }

    /// Appends an already built discretization as an axis.
    pub fn assign_discretization(&mut self, discretization: DimensionDiscretization) -> Result<(), ConfigurationError> {
        self.check_setup(ConfigurationError::AxisAfterCommit)?;
        debug!(estimator = self.layout.id, axis = %discretization, "assigning axis");
        Arc::make_mut(&mut self.layout).indexer.assign_axis(discretization)?;
        self.reshape();
        Ok(())
    }

    /// Replaces the bound response functions.
    ///
    /// ## Errors
    /// * [`ConfigurationError::ResponseAfterCommit`] once contributions began.
    /// * [`ConfigurationError::NoResponseFunctions`] for an empty list.
    /// * [`ConfigurationError::IncompatibleResponse`] for a non-uniform
    ///   function on an estimator that requires uniform ones.

    pub fn assign_response_functions(&mut self, responses: Vec<SharedResponse>) -> Result<(), ConfigurationError> {
        self.check_setup(ConfigurationError::ResponseAfterCommit)?;
        if responses.is_empty() {
            return Err(ConfigurationError::NoResponseFunctions);
        }
        if self.layout.require_uniform_responses {
            if let Some(bad) = responses.iter().find(|r| !r.is_spatially_uniform()) {
                return Err(ConfigurationError::IncompatibleResponse { name: bad.name().to_owned() });
            }
        }

        debug!(
            estimator = self.layout.id,
            responses = ?responses.iter().map(|r| r.name()).collect::<Vec<_>>(),
            "assigning response functions"
        );
        let layout = Arc::make_mut(&mut self.layout);
        layout.indexer.set_response_count(responses.len())?;
        layout.responses = responses;
        self.reshape();
        Ok(())
    }

    /// Binds the entities this estimator scores on, replacing any previous
    /// binding. Repeated ids keep their first normalization constant.
    ///
    /// ## Errors
    /// * [`ConfigurationError::EntitiesAfterCommit`] once contributions began.
    /// * the validation errors of [`EntityRegistry::from_lists`].

    pub fn assign_entities(&mut self, ids: &[EntityId], normalizations: &[f64]) -> Result<(), ConfigurationError> {
        self.check_setup(ConfigurationError::EntitiesAfterCommit)?;
        let registry = EntityRegistry::from_lists(ids, normalizations)?;
        debug!(estimator = self.layout.id, entities = registry.len(), "assigning entities");
        Arc::make_mut(&mut self.layout).entities = registry;
        self.reshape();
        Ok(())
    }

    /// Restricts the particle types this estimator accepts.
    pub fn set_particle_types(&mut self, types: impl IntoIterator<Item = ParticleType>) -> Result<(), ConfigurationError> {
        self.check_setup(ConfigurationError::ParticleTypesAfterCommit)?;
        let types: BTreeSet<ParticleType> = types.into_iter().collect();
        if types.is_empty() {
            return Err(ConfigurationError::NoParticleTypes);
        }
        debug!(estimator = self.layout.id, types = ?types, "setting particle types");
        Arc::make_mut(&mut self.layout).particle_types = types;
        Ok(())
    }

    /// Requires every bound response function to be spatially uniform.
    ///
    /// Already bound functions are checked immediately.
    pub fn require_uniform_responses(&mut self) -> Result<(), ConfigurationError> {
        self.check_setup(ConfigurationError::ResponseAfterCommit)?;
        if let Some(bad) = self.layout.responses.iter().find(|r| !r.is_spatially_uniform()) {
            return Err(ConfigurationError::IncompatibleResponse { name: bad.name().to_owned() });
        }
        Arc::make_mut(&mut self.layout).require_uniform_responses = true;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Runtime
    // ---------------------------------------------------------------------

    /// Scores one partial contribution of the running history.
    ///
    /// `auxiliary` supplies coordinates the state does not carry (the angle
    /// cosine) or overrides ones it does. A point outside the phase space is
    /// silently ignored and leaves the working set untouched.
    ///
    /// For every bound response function `r`, `raw * r(state)` is added to
    /// the working-set slot of `(entity, bin, r)`.
    ///
    /// ## Errors
    /// * [`ConfigurationError::UnknownEntity`] for an unbound entity.
    /// * [`InvalidValueError`] for a non-finite contribution or response
    ///   value, a rejected particle type, or a missing coordinate. Nothing is
    ///   scored in that case and the estimator stays usable.

    pub fn add_partial_history_contribution(
        &mut self,
        entity: EntityId,
        state: &ParticleState,
        auxiliary: &PhaseSpacePoint,
        raw: f64,
    ) -> TallyResult<()> {
        let result = self.score(entity, state, auxiliary, raw);
        if let Err(TallyError::InvalidValue(e)) = &result {
            warn!(estimator = self.layout.id, entity, error = %e, "contribution rejected");
        }
        result
    }

    fn score(
        &mut self,
        entity: EntityId,
        state: &ParticleState,
        auxiliary: &PhaseSpacePoint,
        raw: f64,
    ) -> TallyResult<()> {
        let layout = &*self.layout;
        let entity_index = layout
            .entities
            .index_of(entity)
            .ok_or(ConfigurationError::UnknownEntity(entity))?;

        if !raw.is_finite() {
            return Err(InvalidValueError::NonFiniteContribution(raw).into());
        }
        if !layout.particle_types.contains(&state.particle_type) {
            return Err(InvalidValueError::RejectedParticleType(state.particle_type).into());
        }

        let point = PhaseSpacePoint::of_state(state).overlay(auxiliary);
        let indexer = &layout.indexer;
        if let Some(axis) = indexer.axes().iter().find(|a| point.get(a.dimension()).is_none()) {
            return Err(InvalidValueError::MissingCoordinate(axis.dimension()).into());
        }
        if !indexer.is_in_phase_space(&point) {
            return Ok(());
        }

        for (r, response) in layout.responses.iter().enumerate() {
            let value = response.evaluate(state);
            if !value.is_finite() {
                return Err(InvalidValueError::NonFiniteResponse { response: r, value }.into());
            }
            let scored = raw * value;
            if !scored.is_finite() {
                return Err(InvalidValueError::NonFiniteContribution(scored).into());
            }
            self.response_values[r] = scored;
        }

        let base = indexer.base_index_unchecked(&point);
        let stride = indexer.bins_per_response();
        for (r, &scored) in self.response_values.iter().enumerate() {
            self.working.add(entity_index, base + r * stride, scored);
        }
        self.sealed = true;
        Ok(())
    }

    /// Completes the running history.
    ///
    /// Must be called exactly once per history, whether or not it scored.
    /// A clean working set only advances the history count.
    ///
    /// ## Errors
    /// [`InvalidValueError::NonFiniteMoment`] if folding would overflow a
    /// moment. The history still counts but none of its contributions are
    /// kept.

    pub fn commit_history_contribution(&mut self) -> TallyResult<()> {
        self.histories += 1;
        self.sealed = true;
        if !self.working.is_dirty() {
            return Ok(());
        }

        trace!(
            estimator = self.layout.id,
            history = self.histories,
            entities = self.working.touched_entities().len(),
            "committing history"
        );
        let folded = self.working.fold_into(
            &mut self.records,
            &mut self.total_bin_moments,
            &mut self.global_moments,
        );
        if let Err(e) = &folded {
            warn!(estimator = self.layout.id, history = self.histories, error = %e, "history discarded");
        }
        folded.map_err(TallyError::from)
    }

    /// Drops the running history's contributions without folding them.
    ///
    /// Used when a history is abandoned; the history is not counted.
    pub fn discard_history(&mut self) {
        if self.working.is_dirty() {
            trace!(estimator = self.layout.id, "discarding uncommitted history");
        }
        self.working.clear();
    }

    /// `true` if contributions are pending for the running history.
    #[inline]
    pub fn has_uncommitted_history_contribution(&self) -> bool {
        self.working.is_dirty()
    }

    /// Zeroes every moment and the history count, and discards pending
    /// contributions. Configuration stays locked.
    pub fn reset_data(&mut self) {
        debug!(estimator = self.layout.id, histories = self.histories, "resetting estimator data");
        for record in &mut self.records {
            record.reset();
        }
        moments::reset_all(&mut self.total_bin_moments);
        moments::reset_all(&mut self.global_moments);
        self.working.clear();
        self.histories = 0;
    }

    // ---------------------------------------------------------------------
    // Replication
    // ---------------------------------------------------------------------

    /// A zeroed estimator sharing this one's layout.
    ///
    /// The replica is sealed: its configuration cannot diverge.
    pub fn replicate(&self) -> EstimatorCore {
        let indexer = self.layout.indexer();
        let responses = indexer.response_count();
        let entities = self.layout.entities().len();
        EstimatorCore {
            layout: Arc::clone(&self.layout),
            records: self
                .records
                .iter()
                .map(|_| EntityRecord::new(indexer.total_bins(), responses))
                .collect(),
            total_bin_moments: vec![Moments::ZERO; indexer.total_bins()],
            global_moments: vec![Moments::ZERO; responses],
            working: HistoryWorkingSet::new(entities, indexer.bins_per_response(), responses),
            response_values: vec![0.0; responses],
            histories: 0,
            sealed: true,
        }
    }

    /// `true` if `other` shares this estimator's layout.
    #[inline]
    pub fn is_compatible_with(&self, other: &EstimatorCore) -> bool {
        Arc::ptr_eq(&self.layout, &other.layout)
    }

    /// Adds another replica's moments and history count into this one.
    ///
    /// ## Errors
    /// * [`ConfigurationError::IncompatibleLayout`] unless both share a
    ///   layout.
    /// * [`ConfigurationError::UncommittedReplica`] if `other` has pending
    ///   contributions.

    pub fn merge(&mut self, other: &EstimatorCore) -> Result<(), ConfigurationError> {
        if !self.is_compatible_with(other) {
            return Err(ConfigurationError::IncompatibleLayout);
        }
        if other.has_uncommitted_history_contribution() {
            return Err(ConfigurationError::UncommittedReplica);
        }

        for (mine, theirs) in self.records.iter_mut().zip(other.records.iter()) {
            mine.combine(theirs);
        }
        moments::combine_all(&mut self.total_bin_moments, &other.total_bin_moments);
        moments::combine_all(&mut self.global_moments, &other.global_moments);
        self.histories += other.histories;
        self.sealed |= other.sealed;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Read path
    // ---------------------------------------------------------------------

    /// Shared configuration.
    #[inline]
    pub fn layout(&self) -> &Arc<EstimatorLayout> {
        &self.layout
    }

    /// Estimator id.
    #[inline]
    pub fn id(&self) -> EstimatorId {
        self.layout.id
    }

    /// Multiplier applied when processing moments.
    #[inline]
    pub fn multiplier(&self) -> f64 {
        self.layout.multiplier
    }

    /// Axes and slot layout.
    #[inline]
    pub fn indexer(&self) -> &PhaseSpaceIndexer {
        &self.layout.indexer
    }

    /// Bound response functions.
    #[inline]
    pub fn response_functions(&self) -> &[SharedResponse] {
        &self.layout.responses
    }

    /// Number of completed histories.
    #[inline]
    pub fn histories(&self) -> u64 {
        self.histories
    }

    /// Bound entity ids, in assignment order.
    #[inline]
    pub fn entity_ids(&self) -> &[EntityId] {
        self.layout.entities.ids()
    }

    /// `true` if `id` is bound.
    #[inline]
    pub fn is_entity_assigned(&self, id: EntityId) -> bool {
        self.layout.entities.contains(id)
    }

    /// `true` if `particle_type` contributions are accepted.
    #[inline]
    pub fn accepts(&self, particle_type: ParticleType) -> bool {
        self.layout.particle_types.contains(&particle_type)
    }

    /// Normalization constant of `id`.
    pub fn entity_normalization(&self, id: EntityId) -> Result<f64, ConfigurationError> {
        self.layout
            .entities
            .normalization_of(id)
            .ok_or(ConfigurationError::UnknownEntity(id))
    }

    /// Sum of every entity's normalization constant.
    pub fn total_normalization(&self) -> f64 {
        self.layout.entities.total_normalization()
    }

    fn record(&self, id: EntityId) -> Result<&EntityRecord, ConfigurationError> {
        self.layout
            .entities
            .index_of(id)
            .map(|i| &self.records[i])
            .ok_or(ConfigurationError::UnknownEntity(id))
    }

    /// Per-slot moments of one entity.
    pub fn entity_bin_moments(&self, id: EntityId) -> Result<&[Moments], ConfigurationError> {
        self.record(id).map(|r| r.bin_moments.as_slice())
    }

    /// Per-response total moments of one entity.
    pub fn entity_total_moments(&self, id: EntityId) -> Result<&[Moments], ConfigurationError> {
        self.record(id).map(|r| r.total_moments.as_slice())
    }

    /// Per-slot moments of the per-history sum over all entities.
    #[inline]
    pub fn total_bin_moments(&self) -> &[Moments] {
        &self.total_bin_moments
    }

    /// Per-response moments of the per-history sum over all entities and
    /// bins.
    #[inline]
    pub fn total_moments(&self) -> &[Moments] {
        &self.global_moments
    }
}
