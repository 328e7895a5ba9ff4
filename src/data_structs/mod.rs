//! Core data types of the AF/FPS analysis.
//!
//! * [`WideMatrix`] is one motif's input matrix, one row per region and one
//!   column per (sample, value kind) pair. It reshapes into long
//!   [`LongRecord`]s and back.
//! * [`Observation`] is a joined `(region, sample)` row carrying AF, raw FPS
//!   and scaled FPS.
//! * [`VarianceRecord`], [`CovariantSite`], [`CorrelationResult`] and
//!   [`AdjustedResult`] are the per-stage results, the last three of which
//!   are written to disk as TSV rows.

mod matrix;
mod records;

pub use matrix::{
    LongRecord,
    SampleColumn,
    ValueKind,
    WideMatrix,
    REGION_ID_COL,
};
pub use records::{
    AdjustedResult,
    CorrelationResult,
    CovariantSite,
    MotifId,
    Observation,
    VarianceRecord,
};
