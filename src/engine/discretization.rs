//! One-dimensional bin boundaries.
//!
//! A [`DimensionDiscretization`] owns the ordered boundaries of one axis and
//! turns a raw coordinate into a bin index. Two boundary semantics exist and
//! share one contract (`contains`, `bin_index_of`, `bin_count`):
//!
//! ## Continuous
//! `n ≥ 2` finite boundaries delimit `n - 1` bins. Bin `i` covers
//! `[b[i], b[i+1])`, except the last bin which is closed on both ends:
//!
//! ```text
//!   b0        b1        b2        b3
//!   [---0----)[---1----)[---2----]
//! ```
//!
//! ## Discrete count
//! `n ≥ 1` non-negative boundaries are the **inclusive upper** edges of `n`
//! bins. Bin 0 starts at zero (counts are never negative). The last boundary
//! does not bound anything: every value above `b[n-2]` lands in the last bin.
//!
//! ```text
//!   boundaries [0, 1, inf]   ->   {0} {1} {2, 3, 4, ...}
//! ```
//!
//! ## Lookup
//! Both kinds resolve a value with a binary search over the boundaries
//! (`O(log n)`), via [`slice::partition_point`].
//!
//! Discretizations are constructed once at setup and are immutable
//! afterwards; they are freely shared between worker threads.

use std::fmt;

use crate::engine::dimension::{Dimension, DimensionKind};
use crate::engine::error::{ConfigurationError, OutOfRangeError};


/// Bin boundaries for a single phase-space axis.
///
/// ## Invariants
/// * boundaries are strictly increasing
/// * continuous: at least two boundaries, all finite
/// * discrete count: at least one boundary, all non-negative, only the last
///   may be `+inf`

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DimensionDiscretization {
    dimension: Dimension,
    kind: DimensionKind,
    boundaries: Vec<f64>,
}

impl DimensionDiscretization {
    /// Builds a discretization using the boundary semantics of `dimension`.
    ///
    /// This is the factory keyed on the dimension tag: collision counts get
    /// discrete-count semantics, everything else continuous.
    ///
    /// ## Errors
    /// Returns a [`ConfigurationError`] if the boundaries are empty, too few,
    /// unsorted, duplicated, non-finite where not allowed, or negative for a
    /// count axis.

    pub fn new(dimension: Dimension, boundaries: Vec<f64>) -> Result<Self, ConfigurationError> {
        match dimension.kind() {
            DimensionKind::Continuous => Self::continuous(dimension, boundaries),
            DimensionKind::DiscreteCount => Self::discrete_count(dimension, boundaries),
        }
    }

    /// Builds a continuous discretization regardless of the dimension's
    /// default kind.
    pub fn continuous(dimension: Dimension, boundaries: Vec<f64>) -> Result<Self, ConfigurationError> {
        if boundaries.is_empty() {
            return Err(ConfigurationError::EmptyBoundaries { dimension });
        }
        if boundaries.len() < 2 {
            return Err(ConfigurationError::TooFewBoundaries {
                dimension,
                required: 2,
                got: boundaries.len(),
            });
        }
        if let Some(position) = boundaries.iter().position(|b| !b.is_finite()) {
            return Err(ConfigurationError::NonFiniteBoundary { dimension, position });
        }
        check_strictly_increasing(dimension, &boundaries)?;

        Ok(Self { dimension, kind: DimensionKind::Continuous, boundaries })
    }

    /// Builds a discrete-count discretization regardless of the dimension's
    /// default kind.
    pub fn discrete_count(dimension: Dimension, boundaries: Vec<f64>) -> Result<Self, ConfigurationError> {
        if boundaries.is_empty() {
            return Err(ConfigurationError::EmptyBoundaries { dimension });
        }

        let last = boundaries.len() - 1;
        for (position, &b) in boundaries.iter().enumerate() {
            if b.is_nan() || (b.is_infinite() && (position != last || b < 0.0)) {
                return Err(ConfigurationError::NonFiniteBoundary { dimension, position });
            }
            if b < 0.0 {
                return Err(ConfigurationError::NegativeCountBoundary { dimension, value: b });
            }
        }
        check_strictly_increasing(dimension, &boundaries)?;

        Ok(Self { dimension, kind: DimensionKind::DiscreteCount, boundaries })
    }

    /// Axis this discretization belongs to.
    #[inline]
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Boundary semantics in use.
    #[inline]
    pub fn kind(&self) -> DimensionKind {
        self.kind
    }

    /// The boundaries, ascending.
    #[inline]
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Number of bins on this axis.
    #[inline]
    pub fn bin_count(&self) -> usize {
        match self.kind {
            DimensionKind::Continuous => self.boundaries.len() - 1,
            DimensionKind::DiscreteCount => self.boundaries.len(),
        }
    }

    /// Returns `true` if `value` falls into some bin. Never fails; NaN is
    /// never contained.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        match self.kind {
            DimensionKind::Continuous => {
                value >= self.boundaries[0] && value <= self.boundaries[self.boundaries.len() - 1]
            }
            DimensionKind::DiscreteCount => value >= 0.0,
        }
    }

    /// Bin index of `value`.
    ///
    /// ## Errors
    /// [`OutOfRangeError::Value`] if `contains(value)` is false.

    pub fn bin_index_of(&self, value: f64) -> Result<usize, OutOfRangeError> {
        if !self.contains(value) {
            return Err(OutOfRangeError::Value { dimension: self.dimension, value });
        }
        Ok(self.bin_index_unchecked(value))
    }

    /// Bin index of a value already known to be contained.
    #[inline]
    pub(crate) fn bin_index_unchecked(&self, value: f64) -> usize {
        match self.kind {
            DimensionKind::Continuous => {
                // Number of boundaries <= value, minus one; the top boundary
                // folds into the last bin.
                let above = self.boundaries.partition_point(|&b| b <= value);
                (above - 1).min(self.bin_count() - 1)
            }
            DimensionKind::DiscreteCount => {
                let edges = &self.boundaries[..self.boundaries.len() - 1];
                edges.partition_point(|&b| b < value)
            }
        }
    }

    /// Lower and upper edge of bin `bin` as printed in reports.
    ///
    /// For discrete counts, the lower edge is the previous boundary (bin 0
    /// starts at zero) and the tail bin's upper edge is `+inf`.
    pub fn bin_edges(&self, bin: usize) -> Option<(f64, f64)> {
        if bin >= self.bin_count() {
            return None;
        }
        match self.kind {
            DimensionKind::Continuous => Some((self.boundaries[bin], self.boundaries[bin + 1])),
            DimensionKind::DiscreteCount => {
                let lower = if bin == 0 { 0.0 } else { self.boundaries[bin - 1] };
                let upper = if bin + 1 == self.bin_count() {
                    f64::INFINITY
                } else {
                    self.boundaries[bin]
                };
                Some((lower, upper))
            }
        }
    }

    /// Human-readable label of one bin, e.g. `Energy Bin: [0, 5)`.
    pub fn bin_label(&self, bin: usize) -> Option<String> {
        let last = self.bin_count().checked_sub(1)?;
        if bin > last {
            return None;
        }
        let name = self.dimension.name();
        let label = match self.kind {
            DimensionKind::Continuous => {
                let close = if bin == last { ']' } else { ')' };
                format!(
                    "{} Bin: [{}, {}{}",
                    name, self.boundaries[bin], self.boundaries[bin + 1], close
                )
            }
            DimensionKind::DiscreteCount => {
                if bin == last && last > 0 {
                    format!("{} Bin: > {}", name, self.boundaries[bin - 1])
                } else if bin == last {
                    format!("{} Bin: >= 0", name)
                } else if bin == 0 {
                    format!("{} Bin: [0, {}]", name, self.boundaries[0])
                } else {
                    format!(
                        "{} Bin: ({}, {}]",
                        name, self.boundaries[bin - 1], self.boundaries[bin]
                    )
                }
            }
        };
        Some(label)
    }
}

impl fmt::Display for DimensionDiscretization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Bins: {{", self.dimension.name())?;
        for (i, b) in self.boundaries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", b)?;
        }
        f.write_str("}")
    }
}

fn check_strictly_increasing(dimension: Dimension, boundaries: &[f64]) -> Result<(), ConfigurationError> {
    match boundaries.windows(2).position(|w| w[0] >= w[1]) {
        Some(i) => Err(ConfigurationError::UnsortedBoundaries { dimension, position: i + 1 }),
        None => Ok(()),
    }
}
