//! Parallel history execution.
//!
//! This module is responsible for:
//! * splitting a batch of histories into fixed-size contiguous chunks,
//! * running chunks in waves of one chunk per Rayon worker, each against its
//!   own estimator replica,
//! * reducing the replicas into one estimator in a fixed order.
//!
//! ## Execution model
//!
//! 1. **Per-chunk accumulation**
//!    * Chunk `k` covers histories `[k * chunk_size, (k + 1) * chunk_size)`.
//!    * Each chunk gets a fresh [`EstimatorCore::replicate`], so in-flight
//!      history state is never shared between threads.
//!
//! 2. **Deterministic combination**
//!    * After each wave its replicas are merged in chunk order and dropped,
//!      so at most one wave of replicas is alive at a time.
//!    * For a fixed chunk size the result does not depend on the number of
//!      threads or on which thread ran which chunk.
//!
//! ## History closures
//!
//! The closure receives the history index and the replica. It scores any
//! number of partial contributions and returns; the runner commits. Errors
//! returned by the closure abort the batch after discarding the history, so
//! closures that tolerate rejected contributions should swallow
//! recoverable errors themselves:
//!
//! ```ignore
//! if let Err(e) = core.add_partial_history_contribution(cell, &state, &aux, score) {
//!     if !e.is_recoverable() { return Err(e); }
//! }
//! ```

use rayon::prelude::*;
use tracing::debug;

use crate::engine::error::{ConfigurationError, TallyResult};
use crate::engine::estimator::EstimatorCore;


/// Chunking and threading of a parallel batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchConfig {
    /// Histories per chunk; the unit of work handed to one worker.
    pub chunk_size: u64,

    /// Worker threads. `None` uses the global Rayon pool.
    pub threads: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { chunk_size: 1024, threads: None }
    }
}

impl BatchConfig {
    /// Chunks of `chunk_size` histories on the global pool.
    pub fn new(chunk_size: u64) -> Self {
        Self { chunk_size, threads: None }
    }

    /// Runs the batch on a dedicated pool of `threads` workers.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

/// Runs histories `0..histories` in parallel and returns the reduced
/// estimator.
///
/// The returned estimator shares `prototype`'s layout and holds only the
/// batch's statistics, so it can be merged back with
/// [`EstimatorCore::merge`].
///
/// ## Errors
/// * [`ConfigurationError::ZeroChunkSize`] / [`ConfigurationError::ThreadPool`]
///   for an unusable batch configuration.
/// * The error of the lowest-numbered failing chunk: the first error
///   `history` returned in that chunk, or a non-recoverable commit error.
///   Chunks after it in the same wave may already have run; no later wave
///   is started.

pub fn run_histories<F>(
    prototype: &EstimatorCore,
    histories: u64,
    config: &BatchConfig,
    history: F,
) -> TallyResult<EstimatorCore>
where
    F: Fn(u64, &mut EstimatorCore) -> TallyResult<()> + Sync,
{
    if config.chunk_size == 0 {
        return Err(ConfigurationError::ZeroChunkSize.into());
    }
    let chunks = histories.div_ceil(config.chunk_size);
    debug!(
        estimator = prototype.id(),
        histories,
        chunks,
        chunk_size = config.chunk_size,
        "running history batch"
    );

    let run = || -> TallyResult<EstimatorCore> {
        let wave = rayon::current_num_threads().max(1) as u64;
        let mut reduced = prototype.replicate();
        let mut first = 0;
        while first < chunks {
            let len = wave.min(chunks - first);
            let replicas: Vec<TallyResult<EstimatorCore>> = (0..len as usize)
                .into_par_iter()
                .map(|offset| {
                    let chunk = first + offset as u64;
                    let start = chunk.saturating_mul(config.chunk_size);
                    let end = start.saturating_add(config.chunk_size).min(histories);
                    run_chunk(prototype, start..end, &history)
                })
                .collect();

            for replica in replicas {
                reduced.merge(&replica?)?;
            }
            first += len;
        }
        Ok(reduced)
    };

    match config.threads {
        None => run(),
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ConfigurationError::ThreadPool(e.to_string()))?
            .install(run),
    }
}

fn run_chunk<F>(
    prototype: &EstimatorCore,
    range: std::ops::Range<u64>,
    history: &F,
) -> TallyResult<EstimatorCore>
where
    F: Fn(u64, &mut EstimatorCore) -> TallyResult<()> + Sync,
{
    let mut replica = prototype.replicate();
    for index in range {
        if let Err(e) = history(index, &mut replica) {
            replica.discard_history();
            return Err(e);
        }
        if let Err(e) = replica.commit_history_contribution() {
            if !e.is_recoverable() {
                return Err(e);
            }
        }
    }
    Ok(replica)
}
