use std::path::Path;

use anyhow::{
    anyhow,
    bail,
    Context,
    Result,
};
use itertools::Itertools;
use log::*;
use polars::prelude::*;

use crate::data_structs::{
    SampleColumn,
    ValueKind,
    WideMatrix,
    REGION_ID_COL,
};
use crate::utils::AfpsError;

/// Tokens read as a missing value in matrix cells. Empty cells are
/// missing as well.
pub const NULL_TOKENS: [&str; 3] = ["NA", "NaN", "nan"];

fn csv_reader(path: &Path) -> LazyCsvReader {
    LazyCsvReader::new(path)
        .with_separator(b'\t')
        .with_has_header(true)
        .with_null_values(Some(NullValues::AllColumns(
            NULL_TOKENS.iter().map(|token| PlSmallStr::from(*token)).collect_vec(),
        )))
}

/// Schema with every sample column typed `Float64` and every other
/// column, `region_id` included, typed `String`.
fn matrix_schema(
    names: &[PlSmallStr],
    sample_cols: &[(String, String, ValueKind)],
) -> Schema {
    names
        .iter()
        .map(|name| {
            let dtype = if sample_cols.iter().any(|(column, _, _)| column == name.as_str()) {
                DataType::Float64
            }
            else {
                DataType::String
            };
            (name.clone(), dtype)
        })
        .collect()
}

/// Reads a wide motif matrix.
///
/// Only `region_id`, `<sample>_AF` and `<sample>_fps` columns are kept,
/// everything else is ignored. Sample columns are split on their last
/// underscore. Cells which do not parse as numbers fail the whole file,
/// non-finite values are read as missing.
///
/// Returns `Ok(None)` when the file is empty or holds a header only.
pub fn read_wide_matrix(path: &Path) -> Result<Option<WideMatrix>> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Could not stat {}", path.display()))?
        .len();
    if size == 0 {
        return Ok(None);
    }

    // Header pass, column types are fixed below
    let names = csv_reader(path)
        .with_infer_schema_length(Some(0))
        .finish()
        .with_context(|| format!("Could not open {}", path.display()))?
        .collect_schema()
        .with_context(|| format!("Could not read header of {}", path.display()))?
        .iter_names()
        .cloned()
        .collect_vec();

    if !names.iter().any(|name| name.as_str() == REGION_ID_COL) {
        return Err(AfpsError::MissingIdColumn(path.to_path_buf()).into());
    }

    let sample_cols = names
        .iter()
        .filter_map(|name| {
            ValueKind::split_column(name.as_str())
                .map(|res| res.map(|(sample, kind)| (name.to_string(), sample, kind)))
        })
        .collect::<Result<Vec<_>, AfpsError>>()?;
    debug!(
        "{}: {} sample columns of {} in header",
        path.display(),
        sample_cols.len(),
        names.len()
    );

    for kind in [ValueKind::Af, ValueKind::Fps] {
        if !sample_cols.iter().any(|(_, _, k)| *k == kind) {
            bail!("{} has no `<sample>_{}` columns", path.display(), kind);
        }
    }

    let schema = matrix_schema(&names, &sample_cols);
    let exprs = std::iter::once(col(REGION_ID_COL))
        .chain(sample_cols.iter().map(|(name, _, _)| col(name.as_str())))
        .collect_vec();

    let data_frame = csv_reader(path)
        .with_schema(Some(SchemaRef::new(schema)))
        .finish()
        .with_context(|| format!("Could not open {}", path.display()))?
        .select(exprs)
        .collect()
        .with_context(|| format!("Could not parse values of {}", path.display()))?;

    if data_frame.height() == 0 {
        return Ok(None);
    }

    let region_ids = data_frame
        .column(REGION_ID_COL)?
        .as_materialized_series()
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(str::to_owned)
                .ok_or_else(|| anyhow!("row {} of {} has no region_id", row + 1, path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut af = Vec::new();
    let mut fps = Vec::new();
    for (name, sample, kind) in sample_cols {
        let values = data_frame
            .column(name.as_str())?
            .as_materialized_series()
            .f64()?
            .into_iter()
            .map(|value| value.filter(|v| v.is_finite()))
            .collect_vec();
        let column = SampleColumn::new(sample, values);
        match kind {
            ValueKind::Af => af.push(column),
            ValueKind::Fps => fps.push(column),
        }
    }

    WideMatrix::try_new(region_ids, af, fps)
        .with_context(|| format!("Invalid matrix {}", path.display()))
        .map(Some)
}
