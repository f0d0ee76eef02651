//! Read path: snapshots, processed statistics and summaries.
//!
//! Nothing here mutates an estimator. Reports are built from the permanent
//! moments only; uncommitted contributions are never visible.
//!
//! Processed values need the wall time spent so far for the figure of merit.
//! The engine does not measure time itself; callers pass it in a
//! [`ReportContext`].

use std::fmt;

use tracing::info;

use crate::engine::error::{ConfigurationError, OutOfRangeError};
use crate::engine::estimator::{AxisConfig, EstimatorCore};
use crate::engine::moments::Moments;
use crate::engine::statistics::ProcessedMoments;
use crate::engine::types::{BinIndex, EntityId, EstimatorId};


/// Caller-supplied context for processing moments.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReportContext {
    /// Wall time spent on the histories so far; `<= 0` disables the FOM.
    pub elapsed_time: f64,
}

impl ReportContext {
    /// A context with the given elapsed time.
    pub fn new(elapsed_time: f64) -> Self {
        Self { elapsed_time }
    }
}

/// Permanent moments of one entity.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntitySnapshot {
    /// Entity id.
    pub id: EntityId,

    /// Normalization constant.
    pub normalization: f64,

    /// Per-slot moments.
    pub bin_moments: Vec<Moments>,

    /// Per-response total moments.
    pub total_moments: Vec<Moments>,
}

/// Owned copy of everything a report or export needs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EstimatorSnapshot {
    /// Estimator id.
    pub id: EstimatorId,

    /// Multiplier applied when processing moments.
    pub multiplier: f64,

    /// Completed histories.
    pub histories: u64,

    /// Names of the bound response functions, in slot order.
    pub response_names: Vec<String>,

    /// Axes, most significant first.
    pub axes: Vec<AxisConfig>,

    /// Per-entity moments, in assignment order.
    pub entities: Vec<EntitySnapshot>,

    /// Sum of all normalization constants.
    pub total_normalization: f64,

    /// Per-slot moments of the sum over entities.
    pub total_bin_moments: Vec<Moments>,

    /// Per-response moments of the sum over entities and bins.
    pub total_moments: Vec<Moments>,
}

impl EstimatorCore {
    /// Copies the permanent state out.
    pub fn snapshot(&self) -> EstimatorSnapshot {
        let entities = self
            .entity_ids()
            .iter()
            .map(|&id| EntitySnapshot {
                id,
                normalization: self.entity_normalization(id).unwrap_or(0.0),
                bin_moments: self.entity_bin_moments(id).map(<[_]>::to_vec).unwrap_or_default(),
                total_moments: self.entity_total_moments(id).map(<[_]>::to_vec).unwrap_or_default(),
            })
            .collect();

        EstimatorSnapshot {
            id: self.id(),
            multiplier: self.multiplier(),
            histories: self.histories(),
            response_names: self.response_functions().iter().map(|r| r.name().to_owned()).collect(),
            axes: self
                .indexer()
                .axes()
                .iter()
                .map(|a| AxisConfig { dimension: a.dimension(), boundaries: a.boundaries().to_vec() })
                .collect(),
            entities,
            total_normalization: self.total_normalization(),
            total_bin_moments: self.total_bin_moments().to_vec(),
            total_moments: self.total_moments().to_vec(),
        }
    }

    /// Human-readable name of a flat slot, e.g.
    /// `Energy Bin: [0, 5), Response: uniform`.
    pub fn bin_description(&self, flat: BinIndex) -> Result<String, OutOfRangeError> {
        let decoded = self.indexer().decode(flat)?;
        let mut parts: Vec<String> = self
            .indexer()
            .axes()
            .iter()
            .zip(decoded.axis_bins.iter())
            .filter_map(|(axis, &bin)| axis.bin_label(bin))
            .collect();
        parts.push(format!("Response: {}", self.response_functions()[decoded.response].name()));
        Ok(parts.join(", "))
    }

    fn process_all(&self, moments: &[Moments], normalization: f64, ctx: &ReportContext) -> Vec<ProcessedMoments> {
        moments
            .iter()
            .map(|m| {
                ProcessedMoments::process(m, self.histories(), normalization, self.multiplier(), ctx.elapsed_time)
            })
            .collect()
    }

    /// Normalization used for estimator-level totals. An estimator without
    /// entities never scores, so any positive value gives the zero mean.
    fn totals_normalization(&self) -> f64 {
        let total = self.total_normalization();
        if total > 0.0 { total } else { 1.0 }
    }

    /// Processed per-slot statistics of one entity.
    pub fn processed_entity_bins(&self, id: EntityId, ctx: &ReportContext) -> Result<Vec<ProcessedMoments>, ConfigurationError> {
        let norm = self.entity_normalization(id)?;
        Ok(self.process_all(self.entity_bin_moments(id)?, norm, ctx))
    }

    /// Processed per-response totals of one entity.
    pub fn processed_entity_totals(&self, id: EntityId, ctx: &ReportContext) -> Result<Vec<ProcessedMoments>, ConfigurationError> {
        let norm = self.entity_normalization(id)?;
        Ok(self.process_all(self.entity_total_moments(id)?, norm, ctx))
    }

    /// Processed per-slot statistics of the sum over entities.
    pub fn processed_total_bins(&self, ctx: &ReportContext) -> Vec<ProcessedMoments> {
        self.process_all(self.total_bin_moments(), self.totals_normalization(), ctx)
    }

    /// Processed per-response totals of the sum over entities and bins.
    pub fn processed_totals(&self, ctx: &ReportContext) -> Vec<ProcessedMoments> {
        self.process_all(self.total_moments(), self.totals_normalization(), ctx)
    }

    /// Text block describing the estimator and its results.
    pub fn summary(&self, ctx: &ReportContext) -> String {
        Summary { core: self, ctx }.to_string()
    }

    /// Emits [`summary`](Self::summary) as one `info` event.
    pub fn log_summary(&self, ctx: &ReportContext) {
        info!(estimator = self.id(), histories = self.histories(), "\n{}", self.summary(ctx));
    }
}

struct Summary<'a> {
    core: &'a EstimatorCore,
    ctx: &'a ReportContext,
}

impl Summary<'_> {
    fn write_rows(
        &self,
        f: &mut fmt::Formatter<'_>,
        bins: &[ProcessedMoments],
        totals: &[ProcessedMoments],
    ) -> fmt::Result {
        for (flat, p) in bins.iter().enumerate() {
            let label = self.core.bin_description(flat).map_err(|_| fmt::Error)?;
            write_row(f, &label, p)?;
        }
        for (r, p) in totals.iter().enumerate() {
            let label = format!("Total, Response: {}", self.core.response_functions()[r].name());
            write_row(f, &label, p)?;
        }
        Ok(())
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, label: &str, p: &ProcessedMoments) -> fmt::Result {
    writeln!(
        f,
        "  {:<48} {:>13.6e} {:>10.6} {:>10.6} {:>13.6e}",
        label, p.mean, p.relative_error, p.variance_of_variance, p.figure_of_merit
    )
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core;
        writeln!(
            f,
            "Estimator {} (multiplier {}, {} histories)",
            core.id(),
            core.multiplier(),
            core.histories()
        )?;

        let names: Vec<&str> = core.response_functions().iter().map(|r| r.name()).collect();
        writeln!(f, "Response Functions: {}", names.join(", "))?;
        for axis in core.indexer().axes() {
            writeln!(f, "{}", axis)?;
        }
        writeln!(f, "  {:<48} {:>13} {:>10} {:>10} {:>13}", "", "mean", "RE", "VOV", "FOM")?;

        for &id in core.entity_ids() {
            let norm = core.entity_normalization(id).map_err(|_| fmt::Error)?;
            writeln!(f, "Entity {} (normalization {})", id, norm)?;
            let bins = core.processed_entity_bins(id, self.ctx).map_err(|_| fmt::Error)?;
            let totals = core.processed_entity_totals(id, self.ctx).map_err(|_| fmt::Error)?;
            self.write_rows(f, &bins, &totals)?;
        }

        writeln!(f, "All Entities (normalization {})", core.total_normalization())?;
        let bins = core.processed_total_bins(self.ctx);
        let totals = core.processed_totals(self.ctx);
        self.write_rows(f, &bins, &totals)
    }
}
