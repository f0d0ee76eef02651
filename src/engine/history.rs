//! Per-history working buffers.
//!
//! A [`HistoryWorkingSet`] holds the in-flight, uncommitted contributions of
//! the history currently being simulated by one worker. It is exclusively
//! owned by that worker's estimator replica and is never shared.
//!
//! ## State machine
//!
//! ```text
//!            add()                 add()
//!   Clean ──────────▶ Dirty ◀──────────┐
//!     ▲                 │  └───────────┘
//!     └─────────────────┘
//!       fold_into() / clear()
//! ```
//!
//! ## Layout
//! Each entity owns a dense slab of `total_bins` values, allocated the first
//! time the entity is touched and reused afterwards. Touched entities are
//! listed so that commit and clear only visit what the history reached.
//!
//! ## Folding
//! [`HistoryWorkingSet::fold_into`] is two-phase: every moment update is
//! first checked for finiteness, and only if all of them pass are they
//! applied. A failing history leaves every accumulator untouched.

use crate::engine::entity::EntityRecord;
use crate::engine::error::InvalidValueError;
use crate::engine::moments::Moments;
use crate::engine::types::{BinIndex, EntityIndex};


/// Uncommitted contributions of a single history.
#[derive(Clone, Debug)]
pub struct HistoryWorkingSet {
    bins_per_response: usize,
    total_bins: usize,

    slabs: Vec<Vec<f64>>,
    touched: Vec<EntityIndex>,
    is_touched: Vec<bool>,

    /// Per-slot sum over touched entities; scratch for the total-bin fold.
    bin_totals: Vec<f64>,

    dirty: bool,
}

impl HistoryWorkingSet {
    /// A clean working set for `entities` entities, each owning
    /// `bins_per_response * responses` slots.
    pub fn new(entities: usize, bins_per_response: usize, responses: usize) -> Self {
        let total_bins = bins_per_response * responses;
        Self {
            bins_per_response,
            total_bins,
            slabs: vec![Vec::new(); entities],
            touched: Vec::new(),
            is_touched: vec![false; entities],
            bin_totals: vec![0.0; total_bins],
            dirty: false,
        }
    }

    /// `true` once a contribution has landed since the last fold or clear.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Entities touched by the current history, in first-touch order.
    #[inline]
    pub fn touched_entities(&self) -> &[EntityIndex] {
        &self.touched
    }

    /// Accumulated value of one slot.
    pub fn value(&self, entity: EntityIndex, slot: BinIndex) -> f64 {
        self.slabs
            .get(entity)
            .and_then(|slab| slab.get(slot))
            .copied()
            .unwrap_or(0.0)
    }

    /// Adds `value` into slot `slot` of `entity` and marks the set dirty.
    ///
    /// Values accumulate; they never overwrite.
    #[inline]
    pub fn add(&mut self, entity: EntityIndex, slot: BinIndex, value: f64) {
        debug_assert!(slot < self.total_bins);
        if !self.is_touched[entity] {
            self.is_touched[entity] = true;
            self.touched.push(entity);
            let slab = &mut self.slabs[entity];
            if slab.is_empty() {
                slab.resize(self.total_bins, 0.0);
            }
        }
        self.slabs[entity][slot] += value;
        self.dirty = true;
    }

    /// Folds the current history into permanent moments and clears the set.
    ///
    /// Per touched entity, every non-zero slot is folded into its bin
    /// moments and the per-response slab sums into its totals. Slot sums
    /// across entities go into `total_bin_moments`, and their per-response
    /// sums into `global_moments`.
    ///
    /// ## Errors
    /// [`InvalidValueError::NonFiniteMoment`] if any update would leave a
    /// non-finite moment. Nothing is folded in that case and the history is
    /// discarded.

    pub fn fold_into(
        &mut self,
        records: &mut [EntityRecord],
        total_bin_moments: &mut [Moments],
        global_moments: &mut [Moments],
    ) -> Result<(), InvalidValueError> {
        if !self.dirty {
            return Ok(());
        }

        self.sum_bin_totals();
        let checked = self.check(records, total_bin_moments, global_moments);
        if checked.is_ok() {
            self.apply(records, total_bin_moments, global_moments);
        }
        self.clear();
        checked
    }

    /// Drops every uncommitted value without folding it.
    pub fn clear(&mut self) {
        for entity in self.touched.drain(..) {
            self.slabs[entity].fill(0.0);
            self.is_touched[entity] = false;
        }
        if self.dirty {
            self.bin_totals.fill(0.0);
        }
        self.dirty = false;
    }

    fn sum_bin_totals(&mut self) {
        for &entity in &self.touched {
            for (total, value) in self.bin_totals.iter_mut().zip(self.slabs[entity].iter()) {
                *total += value;
            }
        }
    }

    fn check(
        &self,
        records: &[EntityRecord],
        total_bin_moments: &[Moments],
        global_moments: &[Moments],
    ) -> Result<(), InvalidValueError> {
        for &entity in &self.touched {
            let record = &records[entity];
            let slab = &self.slabs[entity];
            check_slots(slab, &record.bin_moments)?;
            check_response_sums(slab, self.bins_per_response, &record.total_moments)?;
        }
        check_slots(&self.bin_totals, total_bin_moments)?;
        check_response_sums(&self.bin_totals, self.bins_per_response, global_moments)
    }

    fn apply(
        &self,
        records: &mut [EntityRecord],
        total_bin_moments: &mut [Moments],
        global_moments: &mut [Moments],
    ) {
        for &entity in &self.touched {
            let record = &mut records[entity];
            let slab = &self.slabs[entity];
            fold_slots(slab, &mut record.bin_moments);
            fold_response_sums(slab, self.bins_per_response, &mut record.total_moments);
        }
        fold_slots(&self.bin_totals, total_bin_moments);
        fold_response_sums(&self.bin_totals, self.bins_per_response, global_moments);
    }
}

fn check_slots(values: &[f64], moments: &[Moments]) -> Result<(), InvalidValueError> {
    for (&c, m) in values.iter().zip(moments.iter()) {
        if c != 0.0 && m.with_sample(c).is_none() {
            return Err(InvalidValueError::NonFiniteMoment { contribution: c });
        }
    }
    Ok(())
}

fn check_response_sums(values: &[f64], bins_per_response: usize, moments: &[Moments]) -> Result<(), InvalidValueError> {
    for (slice, m) in values.chunks(bins_per_response).zip(moments.iter()) {
        let c: f64 = slice.iter().sum();
        if c != 0.0 && m.with_sample(c).is_none() {
            return Err(InvalidValueError::NonFiniteMoment { contribution: c });
        }
    }
    Ok(())
}

fn fold_slots(values: &[f64], moments: &mut [Moments]) {
    for (&c, m) in values.iter().zip(moments.iter_mut()) {
        if c != 0.0 {
            m.add_sample(c);
        }
    }
}

fn fold_response_sums(values: &[f64], bins_per_response: usize, moments: &mut [Moments]) {
    for (slice, m) in values.chunks(bins_per_response).zip(moments.iter_mut()) {
        let c: f64 = slice.iter().sum();
        if c != 0.0 {
            m.add_sample(c);
        }
    }
}
