//! Additive statistical moment accumulators.
//!
//! This module defines [`Moments`], the **plain, thread-local accumulator**
//! every bin, entity total and estimator total is made of.
//!
//! ## Purpose
//! A `Moments` value holds the first four power sums of the per-history
//! contributions folded into it:
//!
//! ```text
//! m1 = Σ c      m2 = Σ c²      m3 = Σ c³      m4 = Σ c⁴
//! ```
//!
//! From these, reporting derives the mean, relative error, variance of the
//! variance and figure of merit (see [`statistics`](crate::engine::statistics)).
//!
//! ## Execution model
//! Accumulation proceeds in two phases, exactly like a parallel reduction:
//!
//! 1. **Per-worker accumulation**
//!    * Each worker replica folds its own histories into its own moments.
//!
//! 2. **Deterministic combination**
//!    * Replicas are merged with [`Moments::combine`], element-wise addition.
//!    * Addition of power sums is exact algebraically, so the result matches a
//!      single-worker run up to floating-point summation order.
//!
//! ## Design principles
//! * **Plain data**: no references, no side effects.
//! * **Copy**: cheap to move between threads.
//! * **Sign agnostic**: contributions may be negative (adjoint weighting);
//!   only the even moments are guaranteed non-negative.

use std::ops::{Add, AddAssign};


/// Sums of the first four powers of committed history contributions.
///
/// ## Semantics
/// Each committed history contributes exactly one sample `c` (its summed
/// contribution to this bin). Independent sample sets combine by addition.

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Moments {
    /// Σ c
    pub m1: f64,

    /// Σ c²
    pub m2: f64,

    /// Σ c³
    pub m3: f64,

    /// Σ c⁴
    pub m4: f64,
}

impl Moments {
    /// Zeroed moments.
    pub const ZERO: Moments = Moments { m1: 0.0, m2: 0.0, m3: 0.0, m4: 0.0 };

    /// Folds one history sample.
    #[inline]
    pub fn add_sample(&mut self, c: f64) {
        let c2 = c * c;
        self.m1 += c;
        self.m2 += c2;
        self.m3 += c2 * c;
        self.m4 += c2 * c2;
    }

    /// The moments after folding `c`, or `None` if any of them would stop
    /// being finite.
    #[inline]
    pub fn with_sample(&self, c: f64) -> Option<Moments> {
        let mut next = *self;
        next.add_sample(c);
        next.is_finite().then_some(next)
    }

    /// Adds another accumulator element-wise.
    #[inline]
    pub fn combine(&mut self, other: &Moments) {
        self.m1 += other.m1;
        self.m2 += other.m2;
        self.m3 += other.m3;
        self.m4 += other.m4;
    }

    /// `true` if all four sums are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.m1.is_finite() && self.m2.is_finite() && self.m3.is_finite() && self.m4.is_finite()
    }

    /// `true` if nothing has been folded (or everything cancelled exactly).
    #[inline]
    pub fn is_zero(&self) -> bool {
        *self == Moments::ZERO
    }

    /// Resets to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Moments::ZERO;
    }
}

impl AddAssign<&Moments> for Moments {
    fn add_assign(&mut self, rhs: &Moments) {
        self.combine(rhs);
    }
}

impl Add for Moments {
    type Output = Moments;

    fn add(mut self, rhs: Moments) -> Moments {
        self.combine(&rhs);
        self
    }
}

/// One accumulator per flat slot (or per response function for totals).
pub type MomentArray = Vec<Moments>;

/// Adds `src` into `dst` slot by slot.
///
/// ## Panics
/// Debug builds assert equal lengths; callers only pair arrays of the same
/// layout.
pub fn combine_all(dst: &mut [Moments], src: &[Moments]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        d.combine(s);
    }
}

/// Zeroes every slot.
pub fn reset_all(moments: &mut [Moments]) {
    moments.iter_mut().for_each(Moments::reset);
}
