//! Analysis stages and batch jobs.
//!
//! * [`covariant`]: FPS scaling, AF/FPS join, zero-signal filter, per-region
//!   variances and joint IQR outlier selection.
//! * [`correlation`]: per-region Spearman tests and Benjamini-Hochberg
//!   correction.
//! * [`pipeline`]: per-motif orchestration on a bounded worker pool.
//! * [`merge`]: union of per-motif significant tables.
//! * [`contingency`]: Fisher's exact test over per-motif 2x2 tables.

pub mod contingency;
pub mod correlation;
pub mod covariant;
pub mod merge;
pub mod pipeline;
