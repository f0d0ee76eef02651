//! Multi-dimensional phase-space indexing.
//!
//! [`PhaseSpaceIndexer`] owns the ordered axes of an estimator and the number
//! of bound response functions, and maps a [`PhaseSpacePoint`] to one flat
//! slot index.
//!
//! ## Flat index layout
//!
//! Axes are combined by mixed-radix encoding in insertion order, the first
//! assigned axis being the most significant. The response-function index is
//! more significant than every axis:
//!
//! ```text
//! flat = r * B + Σ_k bin_k * stride_k
//!
//! stride_last = 1
//! stride_k    = stride_{k+1} * bins_{k+1}
//! B           = Π_k bins_k            (1 with no axes)
//! ```
//!
//! [`PhaseSpaceIndexer::decode`] inverts this for reporting.
//!
//! ## Sharing
//! An indexer is configuration: it is assembled before any contribution is
//! scored and is then read-shared, unsynchronized, by every worker.

use crate::engine::dimension::{Dimension, DIMENSION_COUNT};
use crate::engine::discretization::DimensionDiscretization;
use crate::engine::error::{ConfigurationError, OutOfRangeError, TallyResult};
use crate::engine::types::{BinIndex, ParticleState, MAX_FLAT_BINS};


/// Coordinates of one contribution, keyed by dimension.
///
/// ## Construction
/// Coordinates carried by the particle are read with
/// [`PhaseSpacePoint::of_state`]. Coordinates the particle does not carry
/// (angle cosine) or that a caller wants to override are layered on with
/// [`PhaseSpacePoint::with`] / [`PhaseSpacePoint::overlay`].
///
/// ```ignore
/// let aux = PhaseSpacePoint::new().with(Dimension::AngleCosine, mu);
/// let point = PhaseSpacePoint::of_state(&state).overlay(&aux);
/// ```

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhaseSpacePoint {
    values: [Option<f64>; DIMENSION_COUNT],
}

impl PhaseSpacePoint {
    /// A point with no coordinates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every coordinate the particle state carries.
    pub fn of_state(state: &ParticleState) -> Self {
        let mut point = Self::new();
        for dimension in Dimension::ALL {
            point.values[dimension.index()] = dimension.coordinate_of(state);
        }
        point
    }

    /// Sets one coordinate.
    pub fn with(mut self, dimension: Dimension, value: f64) -> Self {
        self.values[dimension.index()] = Some(value);
        self
    }

    /// Sets one coordinate in place.
    pub fn set(&mut self, dimension: Dimension, value: f64) {
        self.values[dimension.index()] = Some(value);
    }

    /// Copies every coordinate present in `other` over this point.
    pub fn overlay(mut self, other: &PhaseSpacePoint) -> Self {
        for (mine, theirs) in self.values.iter_mut().zip(other.values.iter()) {
            if theirs.is_some() {
                *mine = *theirs;
            }
        }
        self
    }

    /// Coordinate of `dimension`, if present.
    #[inline]
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        self.values[dimension.index()]
    }
}

/// A flat index split back into its parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedBin {
    /// Response-function index.
    pub response: usize,

    /// Per-axis bin indices, in axis insertion order.
    pub axis_bins: Vec<usize>,
}

/// Ordered collection of axes plus the response-function multiplicity.
///
/// ## Invariants
/// * no dimension appears twice
/// * `strides` and `bins_per_response` always reflect `axes`
/// * `total_bins() == bins_per_response() * response_count()` fits in
///   [`MAX_FLAT_BINS`]

#[derive(Clone, Debug)]
pub struct PhaseSpaceIndexer {
    axes: Vec<DimensionDiscretization>,
    strides: Vec<usize>,
    bins_per_response: usize,
    response_count: usize,
}

impl Default for PhaseSpaceIndexer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseSpaceIndexer {
    /// An indexer with no axes and a single response function: one slot.
    pub fn new() -> Self {
        Self {
            axes: Vec::new(),
            strides: Vec::new(),
            bins_per_response: 1,
            response_count: 1,
        }
    }

    /// Appends one axis; it becomes the least significant so far.
    ///
    /// ## Errors
    /// * [`ConfigurationError::DuplicateDimension`] if the dimension already
    ///   has an axis.
    /// * [`ConfigurationError::BinCountOverflow`] if the slot space would
    ///   exceed [`MAX_FLAT_BINS`].
    ///
    /// Whether axes may still be added at all is decided by the owning
    /// estimator, which knows if contributions have begun.

    pub fn assign_axis(&mut self, discretization: DimensionDiscretization) -> Result<(), ConfigurationError> {
        if self.axis(discretization.dimension()).is_some() {
            return Err(ConfigurationError::DuplicateDimension(discretization.dimension()));
        }

        let bins_per_response = self
            .bins_per_response
            .checked_mul(discretization.bin_count())
            .ok_or(ConfigurationError::BinCountOverflow)?;
        check_slot_space(bins_per_response, self.response_count)?;

        self.axes.push(discretization);
        self.rebuild_strides();
        Ok(())
    }

    /// Sets the number of response-function slices.
    pub fn set_response_count(&mut self, count: usize) -> Result<(), ConfigurationError> {
        if count == 0 {
            return Err(ConfigurationError::NoResponseFunctions);
        }
        check_slot_space(self.bins_per_response, count)?;
        self.response_count = count;
        Ok(())
    }

    fn rebuild_strides(&mut self) {
        self.strides = vec![1; self.axes.len()];
        let mut stride = 1usize;
        for (k, axis) in self.axes.iter().enumerate().rev() {
            self.strides[k] = stride;
            stride *= axis.bin_count();
        }
        self.bins_per_response = stride;
    }

    /// Axes in insertion order.
    #[inline]
    pub fn axes(&self) -> &[DimensionDiscretization] {
        &self.axes
    }

    /// The axis bound to `dimension`, if any.
    pub fn axis(&self, dimension: Dimension) -> Option<&DimensionDiscretization> {
        self.axes.iter().find(|a| a.dimension() == dimension)
    }

    /// Number of phase-space bins for a single response function.
    #[inline]
    pub fn bins_per_response(&self) -> usize {
        self.bins_per_response
    }

    /// Number of response-function slices.
    #[inline]
    pub fn response_count(&self) -> usize {
        self.response_count
    }

    /// Size of the whole slot space.
    #[inline]
    pub fn total_bins(&self) -> usize {
        self.bins_per_response * self.response_count
    }

    /// `true` iff every axis contains the point's coordinate.
    ///
    /// A coordinate that is missing for a bound axis counts as outside.
    pub fn is_in_phase_space(&self, point: &PhaseSpacePoint) -> bool {
        self.axes.iter().all(|axis| {
            point
                .get(axis.dimension())
                .is_some_and(|value| axis.contains(value))
        })
    }

    /// Flat index of `point` in response slice `response`.
    ///
    /// ## Errors
    /// * [`OutOfRangeError`] if the point lies outside any axis or lacks a
    ///   coordinate; check [`is_in_phase_space`](Self::is_in_phase_space)
    ///   first.
    /// * [`ConfigurationError::ResponseIndexOutOfRange`] for a bad slice.

    pub fn bin_index_of(&self, point: &PhaseSpacePoint, response: usize) -> TallyResult<BinIndex> {
        if response >= self.response_count {
            return Err(ConfigurationError::ResponseIndexOutOfRange {
                index: response,
                count: self.response_count,
            }
            .into());
        }

        let mut flat = response * self.bins_per_response;
        for (axis, stride) in self.axes.iter().zip(self.strides.iter()) {
            let value = point
                .get(axis.dimension())
                .ok_or(OutOfRangeError::MissingCoordinate(axis.dimension()))?;
            flat += axis.bin_index_of(value)? * stride;
        }
        Ok(flat)
    }

    /// Flat index of the response-0 slot for a point already known to be in
    /// the phase space. Add `r * bins_per_response()` for slice `r`.
    pub(crate) fn base_index_unchecked(&self, point: &PhaseSpacePoint) -> BinIndex {
        self.axes
            .iter()
            .zip(self.strides.iter())
            .map(|(axis, stride)| {
                let value = point.get(axis.dimension()).unwrap_or(f64::NAN);
                axis.bin_index_unchecked(value) * stride
            })
            .sum()
    }

    /// Response-function index of a flat slot.
    #[inline]
    pub fn response_index_of(&self, flat: BinIndex) -> usize {
        flat / self.bins_per_response
    }

    /// Splits a flat index into its response index and per-axis bins.
    pub fn decode(&self, flat: BinIndex) -> Result<DecodedBin, OutOfRangeError> {
        if flat >= self.total_bins() {
            return Err(OutOfRangeError::FlatIndex { index: flat, total: self.total_bins() });
        }

        let response = flat / self.bins_per_response;
        let mut rest = flat % self.bins_per_response;
        let mut axis_bins = Vec::with_capacity(self.axes.len());
        for stride in &self.strides {
            axis_bins.push(rest / stride);
            rest %= stride;
        }
        Ok(DecodedBin { response, axis_bins })
    }
}

fn check_slot_space(bins_per_response: usize, responses: usize) -> Result<(), ConfigurationError> {
    match bins_per_response.checked_mul(responses) {
        Some(total) if total <= MAX_FLAT_BINS => Ok(()),
        _ => Err(ConfigurationError::BinCountOverflow),
    }
}
