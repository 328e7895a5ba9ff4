/// ***********************************************************************
/// *****
/// * Copyright (c) 2025
/// The MIT License
///
/// Contributors: afps-covar contributors
/// ***********************************************************************
/// ****

use std::path::Path;

use anyhow::{
    Context,
    Result,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::data_structs::{
    AdjustedResult,
    CorrelationResult,
    CovariantSite,
};

/// A row type of a tab-separated result table.
pub trait TsvRow: Serialize {
    /// Column names, written even when the table has no rows.
    const HEADER: &'static [&'static str];
}

impl TsvRow for CovariantSite {
    const HEADER: &'static [&'static str] = &[
        "region_id",
        "sample_id",
        "AF",
        "FPS_scaled",
        "AF_var",
        "FPS_scaled_var",
    ];
}

impl TsvRow for CorrelationResult {
    const HEADER: &'static [&'static str] = &["region_id", "corr_coeff", "pvalue"];
}

impl TsvRow for AdjustedResult {
    const HEADER: &'static [&'static str] =
        &["region_id", "corr_coeff", "pvalue", "adj_pvalues"];
}

fn writer_builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::default();
    builder.delimiter(b'\t').has_headers(false);
    builder
}

/// Writes `rows` as a TSV table with the row type's header.
pub fn write_table<R: TsvRow>(
    path: &Path,
    rows: &[R],
) -> Result<()> {
    let mut writer = writer_builder()
        .from_path(path)
        .with_context(|| format!("Could not create {}", path.display()))?;
    writer.write_record(R::HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Writes `rows` as a TSV table without a header line.
pub fn write_headerless<S: Serialize>(
    path: &Path,
    rows: &[S],
) -> Result<()> {
    let mut writer = writer_builder()
        .from_path(path)
        .with_context(|| format!("Could not create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Reads a TSV table with a header line into rows. An empty file yields no
/// rows.
pub fn read_table<D: DeserializeOwned>(path: &Path) -> Result<Vec<D>> {
    csv::ReaderBuilder::default()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Could not open {}", path.display()))?
        .deserialize::<D>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse {}", path.display()))
}
