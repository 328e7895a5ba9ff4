//! File discovery and tab-separated I/O.
//!
//! Wide motif matrices are read with polars ([`read_wide_matrix`]); result
//! tables are written and read back through serde row types
//! ([`write_table`], [`read_table`]).

mod matrix;
mod table;

use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    anyhow,
    bail,
    Context,
    Result,
};
use itertools::Itertools;
pub use matrix::{
    read_wide_matrix,
    NULL_TOKENS,
};
pub use table::{
    read_table,
    write_headerless,
    write_table,
    TsvRow,
};

use crate::data_structs::MotifId;
use crate::tools::pipeline::CovariantConfig;
use crate::utils::natural_cmp;

/// A motif matrix scheduled for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotifJob {
    pub motif_id: MotifId,
    pub path:     PathBuf,
}

/// Fails unless `dir` exists and is a directory.
pub fn validate_input_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        bail!("Input directory {} does not exist", dir.display());
    }
    if !dir.is_dir() {
        bail!("Input path {} is not a directory", dir.display());
    }
    Ok(())
}

/// Lists files of `dir` matching a glob `pattern`, naturally sorted by path.
pub fn discover_files(
    dir: &Path,
    pattern: &str,
) -> Result<Vec<PathBuf>> {
    validate_input_dir(dir)?;
    let dir_str = dir
        .to_str()
        .ok_or_else(|| anyhow!("Path {} is not valid UTF-8", dir.display()))?;
    let full_pattern = format!("{}/{}", glob::Pattern::escape(dir_str), pattern);

    let paths = glob::glob(&full_pattern)
        .with_context(|| format!("Invalid pattern {}", full_pattern))?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|path| path.is_file())
        .sorted_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()))
        .collect_vec();
    Ok(paths)
}

/// Strips `suffix` from the file name of `path`, falling back to the file
/// stem when the name does not end with it.
pub fn motif_id_from_path(
    path: &Path,
    suffix: &str,
) -> MotifId {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    match file_name.strip_suffix(suffix) {
        Some(motif) if !motif.is_empty() => motif.to_owned(),
        _ => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or(file_name),
    }
}

/// Lists the motif matrices (`*.tsv`) of `dir`.
pub fn discover_motif_files(
    dir: &Path,
    config: &CovariantConfig,
) -> Result<Vec<MotifJob>> {
    let jobs = discover_files(dir, "*.tsv")?
        .into_iter()
        .map(|path| MotifJob {
            motif_id: motif_id_from_path(&path, config.input_suffix()),
            path,
        })
        .collect_vec();

    let duplicates = jobs
        .iter()
        .map(|job| job.motif_id.as_str())
        .duplicates()
        .collect_vec();
    if !duplicates.is_empty() {
        bail!("Motif ids derived from more than one file: {:?}", duplicates);
    }
    Ok(jobs)
}
