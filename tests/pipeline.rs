mod common;

use afps_covar::io::read_table;
use afps_covar::prelude::*;
use assert_approx_eq::assert_approx_eq;
use common::{
    write_motif,
    DISCORDANT_MATRIX,
    MATRIX,
    OUTLIER_REGION,
};
use itertools::Itertools;
use rstest::rstest;

fn config() -> CovariantConfig {
    CovariantConfig::default().with_n_workers(2)
}

#[test]
fn single_motif_end_to_end() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_motif(input.path(), "MA0148.4_FOXA1", MATRIX);

    let config = config();
    let jobs = discover_motif_files(input.path(), &config).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].motif_id, "MA0148.4_FOXA1");

    let report = CovariantPipeline::new(config)
        .run(jobs, output.path(), |_| {})
        .unwrap();
    assert_eq!(report.n_completed(), 1);
    let summary = &report.motifs[0];
    assert_eq!(summary.n_regions, 5);
    assert_eq!(summary.n_retained_regions, 4);
    assert_eq!(summary.n_covariant_regions, 1);
    assert_eq!(summary.n_tested, 1);
    assert_eq!(summary.n_significant, Some(1));

    let layout = OutputLayout::new(output.path());
    let sites: Vec<CovariantSite> =
        read_table(&layout.covariant_sites("MA0148.4_FOXA1")).unwrap();
    assert_eq!(sites.len(), 3);
    assert!(sites.iter().all(|s| s.region_id == OUTLIER_REGION));
    assert_eq!(
        sites.iter().map(|s| s.sample_id.as_str()).collect_vec(),
        vec!["s1", "s2", "s3"]
    );
    assert_eq!(
        sites.iter().map(|s| s.fps_scaled).collect_vec(),
        vec![0.0, 1.0, 1.0]
    );
    assert_approx_eq!(sites[0].af_var, 0.213333333, 1e-8);
    assert_approx_eq!(sites[0].fps_scaled_var, 0.333333333, 1e-8);

    let significant: Vec<AdjustedResult> =
        read_table(&layout.significant("MA0148.4_FOXA1")).unwrap();
    assert_eq!(significant.len(), 1);
    assert_eq!(significant[0].region_id, OUTLIER_REGION);
    assert_approx_eq!(significant[0].corr_coeff, 1.0);
    assert!(significant[0].adj_pvalues < 0.05);

    let json = std::fs::read_to_string(layout.summary()).unwrap();
    let restored: PipelineReport = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, report);
}

#[test]
fn weak_correlation_is_not_significant() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_motif(input.path(), "GATA3", DISCORDANT_MATRIX);

    let config = config();
    let jobs = discover_motif_files(input.path(), &config).unwrap();
    let report = CovariantPipeline::new(config)
        .run(jobs, output.path(), |_| {})
        .unwrap();
    let summary = &report.motifs[0];
    assert_eq!(summary.status, MotifStatus::Completed);
    assert_eq!(summary.n_covariant_regions, 1);
    assert_eq!(summary.n_tested, 1);
    assert_eq!(summary.n_significant, Some(0));

    let layout = OutputLayout::new(output.path());
    let adjusted: Vec<AdjustedResult> = read_table(&layout.adjusted("GATA3")).unwrap();
    assert_eq!(adjusted.len(), 1);
    assert_eq!(adjusted[0].region_id, OUTLIER_REGION);
    assert_approx_eq!(adjusted[0].corr_coeff, 0.5);
    assert!(adjusted[0].adj_pvalues > 0.05);

    let significant = std::fs::read_to_string(layout.significant("GATA3")).unwrap();
    assert_eq!(significant, "region_id\tcorr_coeff\tpvalue\tadj_pvalues\n");
}

#[test]
fn nan_cell_is_read_as_missing() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let matrix = MATRIX.replace("chr1:1000-1020\t0.5\t5\t", "chr1:1000-1020\t0.5\tNaN\t");
    assert_ne!(matrix, MATRIX);
    write_motif(input.path(), "NFE2L2", &matrix);

    let config = config();
    let jobs = discover_motif_files(input.path(), &config).unwrap();
    let report = CovariantPipeline::new(config)
        .run(jobs, output.path(), |_| {})
        .unwrap();
    let summary = &report.motifs[0];
    assert_eq!(summary.status, MotifStatus::Completed);
    assert_eq!(summary.n_retained_regions, 4);
    assert_eq!(summary.n_covariant_regions, 1);

    let layout = OutputLayout::new(output.path());
    let sites: Vec<CovariantSite> = read_table(&layout.covariant_sites("NFE2L2")).unwrap();
    assert_eq!(sites.len(), 3);
    assert!(sites.iter().all(|s| s.region_id == OUTLIER_REGION && s.fps_scaled.is_finite()));
}

#[rstest]
#[case(1.5, 1)]
#[case(100.0, 0)]
fn iqr_multiplier_controls_selection(
    #[case] multiplier: f64,
    #[case] n_covariant: usize,
) {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_motif(input.path(), "CTCF", MATRIX);

    let config = config().with_iqr_multiplier(multiplier);
    let jobs = discover_motif_files(input.path(), &config).unwrap();
    let report = CovariantPipeline::new(config)
        .run(jobs, output.path(), |_| {})
        .unwrap();
    assert_eq!(report.motifs[0].n_covariant_regions, n_covariant);

    let layout = OutputLayout::new(output.path());
    let adjusted = std::fs::read_to_string(layout.adjusted("CTCF")).unwrap();
    assert!(adjusted.starts_with("region_id\tcorr_coeff\tpvalue\tadj_pvalues\n"));
    assert_eq!(adjusted.lines().count(), 1 + n_covariant);
}

#[test]
fn failures_are_isolated() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_motif(input.path(), "good", MATRIX);
    write_motif(input.path(), "no_id", "name\ts1_AF\ts1_fps\nr1\t0.1\t2\n");
    write_motif(input.path(), "empty", "");

    let config = config();
    let jobs = discover_motif_files(input.path(), &config).unwrap();
    let done = std::sync::atomic::AtomicUsize::new(0);
    let report = CovariantPipeline::new(config)
        .run(jobs, output.path(), |_| {
            done.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
        .unwrap();

    assert_eq!(done.into_inner(), 3);
    assert_eq!(report.n_completed(), 1);
    assert_eq!(report.n_skipped(), 1);
    assert_eq!(report.n_failed(), 1);

    let by_id = |id: &str| {
        report
            .motifs
            .iter()
            .find(|m| m.motif_id == id)
            .unwrap()
            .clone()
    };
    assert_eq!(by_id("good").status, MotifStatus::Completed);
    assert_eq!(by_id("empty").status, MotifStatus::Skipped);
    let failed = by_id("no_id");
    assert_eq!(failed.status, MotifStatus::Failed);
    assert!(failed.message.unwrap().contains("region_id"));

    let layout = OutputLayout::new(output.path());
    assert!(layout.significant("good").exists());
    assert!(!layout.covariant_sites("no_id").exists());
}

#[test]
fn pooled_correction_covers_all_motifs() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_motif(input.path(), "m1", MATRIX);
    write_motif(input.path(), "m2", MATRIX);

    let config = config().with_fdr_scope(FdrScope::Pooled);
    let jobs = discover_motif_files(input.path(), &config).unwrap();
    let report = CovariantPipeline::new(config)
        .run(jobs, output.path(), |summary| {
            assert_eq!(summary.n_significant, None);
        })
        .unwrap();

    assert_eq!(report.fdr_scope, FdrScope::Pooled);
    assert!(report.motifs.iter().all(|m| m.n_significant == Some(1)));

    let layout = OutputLayout::new(output.path());
    for motif in ["m1", "m2"] {
        let adjusted: Vec<AdjustedResult> = read_table(&layout.adjusted(motif)).unwrap();
        assert_eq!(adjusted.len(), 1);
        assert!(adjusted[0].adj_pvalues >= adjusted[0].pvalue);
    }
}

#[test]
fn merge_after_pipeline() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let merged = tempfile::tempdir().unwrap();
    write_motif(input.path(), "m2", MATRIX);
    write_motif(input.path(), "m1", MATRIX);

    let config = config();
    let jobs = discover_motif_files(input.path(), &config).unwrap();
    CovariantPipeline::new(config)
        .run(jobs, output.path(), |_| {})
        .unwrap();

    let layout = OutputLayout::new(output.path());
    let n_rows = run_merge(&layout.correlation_dir(), merged.path()).unwrap();
    assert_eq!(n_rows, 2);

    let rows: Vec<CombinedRow> = read_table(
        &merged
            .path()
            .join(afps_covar::tools::merge::COMBINED_FILE),
    )
    .unwrap();
    assert_eq!(
        rows.iter().map(|r| r.motif_id.as_str()).collect_vec(),
        vec!["m1", "m2"]
    );
    assert!(rows.iter().all(|r| r.orig_index == 0 && r.region_id == OUTLIER_REGION));
}

#[test]
fn missing_input_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(discover_motif_files(&dir.path().join("absent"), &config()).is_err());
}
