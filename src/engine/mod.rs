//! # Engine Module
//!
//! Internal tally engine implementation.
//!
//! This module contains all core estimator building blocks such as:
//! - Phase-space dimensions and their discretizations
//! - Flat slot indexing
//! - Response functions
//! - Moment accumulation and post-processing
//! - The per-history contribution/commit protocol
//! - Parallel history batches and replica reduction
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod dimension;
pub mod discretization;
pub mod indexer;
pub mod response;
pub mod moments;
pub mod statistics;
pub mod entity;
pub mod history;
pub mod estimator;
pub mod scheduler;
pub mod report;
