use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    Context,
    Result,
};
use itertools::Itertools;
use log::*;
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::{
    AdjustedResult,
    MotifId,
};
use crate::io::{
    discover_files,
    read_table,
    write_table,
    TsvRow,
};
use crate::utils::natural_cmp;

/// Glob matching per-motif significant tables.
pub const SIGNIFICANT_PATTERN: &str = "*significant.tsv";
/// Motif ids are the part of the file name before this marker.
pub const MOTIF_ID_MARKER: &str = "_correlation_test";
pub const COMBINED_FILE: &str = "AF_FPS-covariant_sites-significant.combined.tsv";

/// A significant region tagged with its motif.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRow {
    /// Row position in the motif's significant table.
    pub orig_index:  usize,
    pub motif_id:    MotifId,
    pub region_id:   String,
    pub corr_coeff:  f64,
    pub pvalues:     f64,
    pub adj_pvalues: f64,
}

impl TsvRow for CombinedRow {
    const HEADER: &'static [&'static str] = &[
        "orig_index",
        "motif_id",
        "region_id",
        "corr_coeff",
        "pvalues",
        "adj_pvalues",
    ];
}

/// Motif id of a significant table, `CTCF` for
/// `CTCF_correlation_test_results_significant.tsv`.
pub fn significant_motif_id(path: &Path) -> MotifId {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    match file_name.find(MOTIF_ID_MARKER) {
        Some(end) => file_name[..end].to_owned(),
        None => file_name,
    }
}

/// Reads the rows of one significant table. Empty tables give no rows.
pub fn read_significant(path: &Path) -> Result<Vec<CombinedRow>> {
    let motif_id = significant_motif_id(path);
    let rows: Vec<AdjustedResult> =
        read_table(path).with_context(|| format!("Could not read {}", path.display()))?;
    if rows.is_empty() {
        info!("{} has no significant regions, skipping", path.display());
    }

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(orig_index, row)| CombinedRow {
            orig_index,
            motif_id: motif_id.clone(),
            region_id: row.region_id,
            corr_coeff: row.corr_coeff,
            pvalues: row.pvalue,
            adj_pvalues: row.adj_pvalues,
        })
        .collect_vec())
}

/// Unions the given significant tables, ordered by motif id and then
/// naturally by region id.
pub fn merge_significant(paths: &[PathBuf]) -> Result<Vec<CombinedRow>> {
    let tables = paths
        .par_iter()
        .map(|path| read_significant(path))
        .collect::<Result<Vec<_>>>()?;

    Ok(tables
        .into_iter()
        .flatten()
        .sorted_by(|a, b| {
            a.motif_id
                .cmp(&b.motif_id)
                .then_with(|| natural_cmp(&a.region_id, &b.region_id))
        })
        .collect_vec())
}

/// Merges every significant table of `input_dir` into
/// [`COMBINED_FILE`] under `output_dir`. Returns the number of rows
/// written.
pub fn run_merge(
    input_dir: &Path,
    output_dir: &Path,
) -> Result<usize> {
    let paths = discover_files(input_dir, SIGNIFICANT_PATTERN)?;
    info!(
        "Merging {} significant table(s) from {}",
        paths.len(),
        input_dir.display()
    );

    let rows = merge_significant(&paths)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Could not create {}", output_dir.display()))?;
    let out_path = output_dir.join(COMBINED_FILE);
    write_table(&out_path, &rows)?;
    info!("Wrote {} rows to {}", rows.len(), out_path.display());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motif_id_from_file_name() {
        assert_eq!(
            significant_motif_id(Path::new(
                "/x/MA0139.1_CTCF_correlation_test_results_significant.tsv"
            )),
            "MA0139.1_CTCF"
        );
        assert_eq!(significant_motif_id(Path::new("other.tsv")), "other.tsv");
    }

    #[test]
    fn merges_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("B_correlation_test_results_significant.tsv"),
            "region_id\tcorr_coeff\tpvalue\tadj_pvalues\n\
             chr1:100-120\t0.9\t0.001\t0.01\n\
             chr1:20-40\t-0.8\t0.002\t0.02\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("A_correlation_test_results_significant.tsv"),
            "region_id\tcorr_coeff\tpvalue\tadj_pvalues\n\
             chr2:5-9\t1.0\t0.0\t0.0\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("C_correlation_test_results_significant.tsv"),
            "",
        )
        .unwrap();

        let paths = discover_files(dir.path(), SIGNIFICANT_PATTERN).unwrap();
        let rows = merge_significant(&paths).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].motif_id, "A");
        assert_eq!(rows[1].region_id, "chr1:20-40");
        assert_eq!(rows[1].orig_index, 1);
        assert_eq!(rows[1].pvalues, 0.002);
        assert_eq!(rows[2].region_id, "chr1:100-120");
        assert_eq!(rows[2].orig_index, 0);
    }
}
