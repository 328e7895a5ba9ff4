use std::path::Path;

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

use crate::data_structs::MotifId;
use crate::io::{
    discover_files,
    motif_id_from_path,
    write_headerless,
    write_table,
    MotifJob,
    TsvRow,
};
use crate::utils::{
    bh_adjust,
    fisher_exact,
    natural_cmp,
    AfpsError,
};

pub const CONTINGENCY_SUFFIX: &str = "_AF-FPS_region_contingency_table.tsv";
pub const RESULTS_FILE: &str = "AF-FPS_fisher_exact_results.tsv";
pub const ALL_FILE: &str = "AF-FPS_adjusted_pvalues_dictionary_ALL.tsv";
pub const SIG_FILE: &str = "AF-FPS_adjusted_pvalues_dictionary_SIG.tsv";

/// A labelled 2x2 table of counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContingencyTable {
    pub row_labels: [String; 2],
    pub col_labels: [String; 2],
    pub counts:     [[u64; 2]; 2],
}

fn parse_count(
    value: &str,
    path: &Path,
) -> Result<u64, AfpsError> {
    let value = value.trim();
    if let Ok(count) = value.parse::<u64>() {
        return Ok(count);
    }
    match value.parse::<f64>() {
        Ok(count) if count.is_finite() && count >= 0.0 && count.fract() == 0.0 => {
            Ok(count as u64)
        },
        _ => Err(AfpsError::MalformedContingency {
            path:   path.to_path_buf(),
            reason: format!("`{}` is not a non-negative integer count", value),
        }),
    }
}

/// Reads a contingency table: a header line with the two column labels
/// (optionally preceded by an empty index cell) and two rows of a label
/// followed by two counts.
pub fn read_contingency_table(path: &Path) -> Result<ContingencyTable> {
    let malformed = |reason: String| AfpsError::MalformedContingency {
        path: path.to_path_buf(),
        reason,
    };

    let records = csv::ReaderBuilder::default()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Could not open {}", path.display()))?
        .records()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if records.len() != 3 {
        return Err(malformed(format!(
            "expected a header and 2 rows, found {} line(s)",
            records.len()
        ))
        .into());
    }

    let header = records[0].iter().collect_vec();
    let col_labels = match header.as_slice() {
        [first, second] | [_, first, second] => [first.to_string(), second.to_string()],
        _ => {
            return Err(malformed(format!(
                "header has {} fields, expected 2 column labels",
                header.len()
            ))
            .into())
        },
    };

    let mut row_labels: [String; 2] = Default::default();
    let mut counts = [[0u64; 2]; 2];
    for (i, record) in records[1..].iter().enumerate() {
        if record.len() != 3 {
            return Err(malformed(format!(
                "row {} has {} fields, expected a label and 2 counts",
                i + 1,
                record.len()
            ))
            .into());
        }
        row_labels[i] = record[0].to_string();
        counts[i] = [parse_count(&record[1], path)?, parse_count(&record[2], path)?];
    }

    Ok(ContingencyTable {
        row_labels,
        col_labels,
        counts,
    })
}

/// Fisher's exact test result of one motif.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FisherResult {
    pub motif_id:   MotifId,
    pub odds_ratio: f64,
    pub pvalue:     f64,
    pub adj_pvalue: f64,
}

impl TsvRow for FisherResult {
    const HEADER: &'static [&'static str] = &["motif_id", "odds_ratio", "pvalue", "adj_pvalue"];
}

/// Results of a contingency run.
#[derive(Debug, Clone, Default)]
pub struct ContingencyReport {
    /// Naturally ordered by motif id.
    pub results: Vec<FisherResult>,
    /// Motifs whose table could not be read or tested, with the reason.
    pub failed:  Vec<(MotifId, String)>,
}

impl ContingencyReport {
    pub fn significant(
        &self,
        alpha: f64,
    ) -> impl Iterator<Item = &FisherResult> {
        self.results
            .iter()
            .filter(move |r| r.adj_pvalue < alpha)
    }
}

/// Lists the contingency tables of `dir`.
pub fn discover_contingency_tables(dir: &Path) -> Result<Vec<MotifJob>> {
    Ok(discover_files(dir, &format!("*{}", CONTINGENCY_SUFFIX))?
        .into_iter()
        .map(|path| MotifJob {
            motif_id: motif_id_from_path(&path, CONTINGENCY_SUFFIX),
            path,
        })
        .collect_vec())
}

fn test_table(job: &MotifJob) -> Result<(f64, f64)> {
    let table = read_contingency_table(&job.path)?;
    debug!(
        "{}: rows {:?}, columns {:?}, counts {:?}",
        job.motif_id, table.row_labels, table.col_labels, table.counts
    );
    fisher_exact(table.counts)
}

/// Tests every table and applies a Benjamini-Hochberg correction over the
/// p-values of all motifs tested successfully. A failing motif is reported
/// and excluded from the correction.
pub fn test_contingency_tables(jobs: &[MotifJob]) -> ContingencyReport {
    let outcomes = jobs
        .par_iter()
        .map(|job| (job, test_table(job)))
        .collect::<Vec<_>>();

    let mut report = ContingencyReport::default();
    let mut tested = Vec::new();
    for (job, outcome) in outcomes {
        match outcome {
            Ok((odds_ratio, pvalue)) => tested.push((job.motif_id.clone(), odds_ratio, pvalue)),
            Err(e) => {
                let message = format!("{:#}", e);
                error!("{}: {}", job.motif_id, message);
                report.failed.push((job.motif_id.clone(), message));
            },
        }
    }

    let pvalues = tested.iter().map(|(_, _, p)| *p).collect_vec();
    report.results = tested
        .into_iter()
        .zip(bh_adjust(&pvalues))
        .map(|((motif_id, odds_ratio, pvalue), adj_pvalue)| FisherResult {
            motif_id,
            odds_ratio,
            pvalue,
            adj_pvalue,
        })
        .sorted_by(|a, b| natural_cmp(&a.motif_id, &b.motif_id))
        .collect_vec();
    report
}

/// Writes the results table and the ALL/SIG adjusted p-value lists.
pub fn write_contingency_outputs(
    report: &ContingencyReport,
    output_dir: &Path,
    alpha: f64,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Could not create {}", output_dir.display()))?;

    write_table(&output_dir.join(RESULTS_FILE), &report.results)?;
    let all = report
        .results
        .iter()
        .map(|r| (r.motif_id.as_str(), r.adj_pvalue))
        .collect_vec();
    write_headerless(&output_dir.join(ALL_FILE), &all)?;
    let significant = report
        .significant(alpha)
        .map(|r| (r.motif_id.as_str(), r.adj_pvalue))
        .collect_vec();
    write_headerless(&output_dir.join(SIG_FILE), &significant)?;
    Ok(())
}

/// Tests every contingency table of `input_dir` and writes the outputs to
/// `output_dir`.
pub fn run_contingency(
    input_dir: &Path,
    output_dir: &Path,
    alpha: f64,
) -> Result<ContingencyReport> {
    let jobs = discover_contingency_tables(input_dir)?;
    info!(
        "Testing {} contingency table(s) from {}",
        jobs.len(),
        input_dir.display()
    );

    let report = test_contingency_tables(&jobs);
    write_contingency_outputs(&report, output_dir, alpha)?;
    info!(
        "{} motif(s) tested, {} significant at alpha = {}, {} failed",
        report.results.len(),
        report.significant(alpha).count(),
        alpha,
        report.failed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn write_table_file(
        dir: &Path,
        motif: &str,
        content: &str,
    ) {
        std::fs::write(dir.join(format!("{}{}", motif, CONTINGENCY_SUFFIX)), content).unwrap();
    }

    #[test]
    fn reads_labelled_table() {
        let dir = tempfile::tempdir().unwrap();
        write_table_file(
            dir.path(),
            "CTCF",
            "\tFPS_high\tFPS_low\nAF_high\t8\t2\nAF_low\t1.0\t5\n",
        );
        let table =
            read_contingency_table(&dir.path().join(format!("CTCF{}", CONTINGENCY_SUFFIX)))
                .unwrap();
        assert_eq!(table.counts, [[8, 2], [1, 5]]);
        assert_eq!(table.col_labels, ["FPS_high".to_string(), "FPS_low".to_string()]);
        assert_eq!(table.row_labels[1], "AF_low");
    }

    #[test]
    fn malformed_tables_fail() {
        let dir = tempfile::tempdir().unwrap();
        write_table_file(dir.path(), "short", "\ta\tb\nx\t1\t2\n");
        write_table_file(dir.path(), "negative", "\ta\tb\nx\t1\t2\ny\t-1\t3\n");
        for motif in ["short", "negative"] {
            let err = read_contingency_table(
                &dir.path().join(format!("{}{}", motif, CONTINGENCY_SUFFIX)),
            )
            .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<AfpsError>(),
                Some(AfpsError::MalformedContingency { .. })
            ));
        }
    }

    #[test]
    fn pooled_correction_with_failure_isolated() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_table_file(input.path(), "m10", "\ta\tb\nx\t8\t2\ny\t1\t5\n");
        write_table_file(input.path(), "m2", "\ta\tb\nx\t3\t1\ny\t1\t3\n");
        write_table_file(input.path(), "bad", "\ta\tb\nx\tfoo\t2\ny\t1\t5\n");

        let report = run_contingency(input.path(), output.path(), 0.05).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
        assert_eq!(
            report.results.iter().map(|r| r.motif_id.as_str()).collect_vec(),
            vec!["m2", "m10"]
        );

        let m2 = &report.results[0];
        let m10 = &report.results[1];
        assert_approx_eq!(m2.pvalue, 0.4857142857, 1e-8);
        assert_approx_eq!(m2.odds_ratio, 9.0);
        assert_approx_eq!(m10.pvalue, 0.034965035, 1e-8);
        assert_approx_eq!(m10.adj_pvalue, 0.06993007, 1e-7);
        assert_approx_eq!(m2.adj_pvalue, 0.4857142857, 1e-8);

        let all = std::fs::read_to_string(output.path().join(ALL_FILE)).unwrap();
        assert_eq!(all.lines().count(), 2);
        assert!(all.starts_with("m2\t"));
        let sig = std::fs::read_to_string(output.path().join(SIG_FILE)).unwrap();
        assert!(sig.is_empty());
        let results = std::fs::read_to_string(output.path().join(RESULTS_FILE)).unwrap();
        assert!(results.starts_with("motif_id\todds_ratio\tpvalue\tadj_pvalue\n"));
    }

    #[test]
    fn oversized_counts_fail_only_their_motif() {
        let input = tempfile::tempdir().unwrap();
        write_table_file(input.path(), "ok", "\ta\tb\nx\t8\t2\ny\t1\t5\n");
        write_table_file(
            input.path(),
            "huge",
            &format!("\ta\tb\nx\t{}\t1\ny\t1\t0\n", u64::MAX),
        );

        let jobs = discover_contingency_tables(input.path()).unwrap();
        let report = test_contingency_tables(&jobs);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].motif_id, "ok");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "huge");
        assert!(report.failed[0].1.contains("overflows"));
    }
}
