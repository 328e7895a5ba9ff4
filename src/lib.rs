//! # afps-covar
//!
//! `afps-covar` relates allele-frequency (AF) variation to transcription
//! factor footprint-score (FPS) variation across biological samples, one
//! motif at a time.
//!
//! Each motif comes as a wide tab-separated matrix with a `region_id` column
//! and paired `<sample>_AF` / `<sample>_fps` columns. For every motif the
//! crate:
//!
//! 1. reshapes the matrix into long `(region_id, sample_id)` form
//!    ([`WideMatrix`]);
//! 2. min-max scales every FPS sample column into `[0, 1]` and inner-joins the
//!    scaled values with AF ([`Observation`]);
//! 3. drops regions without signal, computes per-region variances of AF and
//!    scaled FPS and keeps the regions that are joint upper IQR outliers
//!    ([`CovariantSite`]);
//! 4. tests each covariant region with a Spearman rank correlation and
//!    applies Benjamini-Hochberg correction ([`AdjustedResult`]).
//!
//! Motifs are processed in parallel on a bounded worker pool, failures are
//! isolated per motif and reported at the end of the run
//! ([`PipelineReport`]). Two aggregation jobs sit next to the pipeline:
//! [`tools::merge`] unions per-motif significant tables and
//! [`tools::contingency`] runs Fisher's exact test over per-motif 2x2
//! tables.
//!
//! Number of workers can be configured with the `AFPS_NUM_THREADS`
//! environment variable.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use afps_covar::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = CovariantConfig::default()
//!         .with_fdr_scope(FdrScope::Pooled)
//!         .with_n_workers(4);
//!     let jobs = discover_motif_files(Path::new("matrices"), &config)?;
//!     let report = CovariantPipeline::new(config)
//!         .run(jobs, Path::new("output"), |_| {})?;
//!     println!("{} motifs failed", report.n_failed());
//!     Ok(())
//! }
//! ```

pub mod data_structs;
pub mod exports;
pub mod io;
pub mod prelude;
pub mod tools;
pub mod utils;

#[allow(unused_imports)]
use prelude::*;
