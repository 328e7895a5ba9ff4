//! Utility functions and helper macros shared by the I/O layer and the
//! analysis tools.
//!
//! Key functionalities include:
//!
//! - Statistical primitives ([`stats`]): variance, quantiles, ranking,
//!   Spearman correlation, Fisher's exact test and Benjamini-Hochberg
//!   adjustment.
//! - Natural (numeric-aware) ordering of region and motif identifiers.
//! - The crate error type [`AfpsError`] for data errors with a fixed shape.
//! - Builder-style `with_*` setter generation for configuration structs.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use once_cell::sync::Lazy;

pub mod stats;

pub use stats::*;

/// Worker count used when nothing else is configured.
pub const FALLBACK_WORKERS: usize = 8;

pub static DEFAULT_WORKERS: Lazy<usize> = Lazy::new(|| {
    std::env::var("AFPS_NUM_THREADS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(FALLBACK_WORKERS)
});

/// Data errors which abort processing of a single input file.
#[derive(Debug)]
pub enum AfpsError {
    /// The matrix has no `region_id` column.
    MissingIdColumn(PathBuf),
    /// A sample column name could not be split into sample and value type.
    MalformedColumn { column: String, reason: String },
    /// The same region appears twice in one matrix.
    DuplicateRegion(String),
    /// Too few samples for a per-region statistic.
    InsufficientSamples { region_id: String, n: usize },
    /// A contingency table is not a labelled 2x2 table of counts.
    MalformedContingency { path: PathBuf, reason: String },
}

impl fmt::Display for AfpsError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::MissingIdColumn(path) => {
                write!(f, "{} has no `region_id` column", path.display())
            },
            Self::MalformedColumn { column, reason } => {
                write!(f, "malformed column name `{}`: {}", column, reason)
            },
            Self::DuplicateRegion(region_id) => {
                write!(f, "region `{}` occurs more than once", region_id)
            },
            Self::InsufficientSamples { region_id, n } => {
                write!(
                    f,
                    "insufficient samples for region `{}`: {} (at least 2 required)",
                    region_id, n
                )
            },
            Self::MalformedContingency { path, reason } => {
                write!(
                    f,
                    "malformed contingency table {}: {}",
                    path.display(),
                    reason
                )
            },
        }
    }
}

impl std::error::Error for AfpsError {}

#[macro_export]
macro_rules! with_field_fn {
    ($field_name: ident, $field_type: ty) => {
        paste::paste! {
            pub fn [<with_$field_name>](mut self, value: $field_type) -> Self {
                self.$field_name = value;
                self
            }
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
enum NatChunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

impl<'a> NatChunk<'a> {
    fn new(
        value: &'a str,
        digits: bool,
    ) -> Self {
        if digits {
            Self::Digits(value)
        }
        else {
            Self::Text(value)
        }
    }
}

fn natural_chunks(value: &str) -> Vec<NatChunk<'_>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;

    for (idx, ch) in value.char_indices() {
        let is_digit = ch.is_ascii_digit();
        if let Some(prev) = in_digits {
            if prev != is_digit {
                chunks.push(NatChunk::new(&value[start..idx], prev));
                start = idx;
            }
        }
        in_digits = Some(is_digit);
    }
    if let Some(prev) = in_digits {
        chunks.push(NatChunk::new(&value[start..], prev));
    }
    chunks
}

fn cmp_digits(
    left: &str,
    right: &str,
) -> Ordering {
    let left_trim = left.trim_start_matches('0');
    let right_trim = right.trim_start_matches('0');
    left_trim
        .len()
        .cmp(&right_trim.len())
        .then_with(|| left_trim.cmp(right_trim))
        .then_with(|| left.len().cmp(&right.len()))
}

/// Compares two identifiers the way a human would order them: runs of
/// digits are compared by numeric value, everything else lexicographically.
///
/// `chr2:100-120` sorts before `chr10:5-25`, and `chr1:900-920` before
/// `chr1:1000-1020`.
pub fn natural_cmp(
    left: &str,
    right: &str,
) -> Ordering {
    let left_chunks = natural_chunks(left);
    let right_chunks = natural_chunks(right);

    for (l, r) in left_chunks.iter().zip(right_chunks.iter()) {
        let ord = match (l, r) {
            (NatChunk::Digits(a), NatChunk::Digits(b)) => cmp_digits(a, b),
            (NatChunk::Text(a), NatChunk::Text(b)) => a.cmp(b),
            (NatChunk::Digits(_), NatChunk::Text(_)) => Ordering::Less,
            (NatChunk::Text(_), NatChunk::Digits(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left_chunks
        .len()
        .cmp(&right_chunks.len())
        .then_with(|| left.cmp(right))
}
