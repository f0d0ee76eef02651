//! Entity arena and per-entity statistics.
//!
//! Entities (cells, surfaces) arrive as opaque [`EntityId`]s. At setup they
//! are mapped once to dense [`EntityIndex`]es by [`EntityRegistry`]; every
//! hot-path access afterwards is plain slice indexing. The id map is only
//! consulted on the contribution entry point, never during commit or merge.
//!
//! [`EntityRecord`] holds the permanent moments of one entity: one
//! [`Moments`] per flat slot and one per response function.

use std::collections::HashMap;

use crate::engine::error::ConfigurationError;
use crate::engine::moments::{self, MomentArray, Moments};
use crate::engine::types::{EntityId, EntityIndex};


/// Dense id → index arena with per-entity normalization constants.
///
/// ## Invariants
/// * `ids`, `normalizations` have equal length and share indices
/// * `index_of[ids[i]] == i`
/// * every normalization is finite and `> 0`

#[derive(Clone, Debug, Default)]
pub struct EntityRegistry {
    ids: Vec<EntityId>,
    normalizations: Vec<f64>,
    index_of: HashMap<EntityId, EntityIndex>,
}

impl EntityRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from parallel id / normalization lists.
    ///
    /// A repeated id keeps its first normalization constant; later
    /// occurrences are ignored.
    ///
    /// ## Errors
    /// * [`ConfigurationError::NoEntities`] for an empty list.
    /// * [`ConfigurationError::NormalizationMismatch`] when the lists differ
    ///   in length.
    /// * [`ConfigurationError::InvalidNormalization`] for a constant that is
    ///   not finite and strictly positive.

    pub fn from_lists(ids: &[EntityId], normalizations: &[f64]) -> Result<Self, ConfigurationError> {
        if ids.is_empty() {
            return Err(ConfigurationError::NoEntities);
        }
        if ids.len() != normalizations.len() {
            return Err(ConfigurationError::NormalizationMismatch {
                ids: ids.len(),
                constants: normalizations.len(),
            });
        }

        let mut registry = Self::new();
        for (&id, &value) in ids.iter().zip(normalizations.iter()) {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigurationError::InvalidNormalization { entity: id, value });
            }
            if registry.index_of.contains_key(&id) {
                continue;
            }
            registry.index_of.insert(id, registry.ids.len());
            registry.ids.push(id);
            registry.normalizations.push(value);
        }
        Ok(registry)
    }

    /// Number of distinct entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// `true` if no entity is bound.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Dense index of `id`.
    #[inline]
    pub fn index_of(&self, id: EntityId) -> Option<EntityIndex> {
        self.index_of.get(&id).copied()
    }

    /// Id stored at `index`.
    #[inline]
    pub fn id_at(&self, index: EntityIndex) -> EntityId {
        self.ids[index]
    }

    /// All ids, in assignment order.
    #[inline]
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    /// `true` if `id` is bound.
    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.index_of.contains_key(&id)
    }

    /// Normalization constant stored at `index`.
    #[inline]
    pub fn normalization_at(&self, index: EntityIndex) -> f64 {
        self.normalizations[index]
    }

    /// Normalization constant of `id`.
    pub fn normalization_of(&self, id: EntityId) -> Option<f64> {
        self.index_of(id).map(|i| self.normalizations[i])
    }

    /// Sum of all normalization constants.
    pub fn total_normalization(&self) -> f64 {
        self.normalizations.iter().sum()
    }
}

/// Permanent statistics of one entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityRecord {
    /// One accumulator per flat slot (`bins × responses`).
    pub bin_moments: MomentArray,

    /// One accumulator per response function: the per-history sum over all
    /// bins of that response.
    pub total_moments: MomentArray,
}

impl EntityRecord {
    /// A zeroed record sized for `total_bins` slots and `responses` totals.
    pub fn new(total_bins: usize, responses: usize) -> Self {
        Self {
            bin_moments: vec![Moments::ZERO; total_bins],
            total_moments: vec![Moments::ZERO; responses],
        }
    }

    /// Adds another record of the same shape.
    pub fn combine(&mut self, other: &EntityRecord) {
        moments::combine_all(&mut self.bin_moments, &other.bin_moments);
        moments::combine_all(&mut self.total_moments, &other.total_moments);
    }

    /// Zeroes every accumulator.
    pub fn reset(&mut self) {
        moments::reset_all(&mut self.bin_moments);
        moments::reset_all(&mut self.total_moments);
    }
}
