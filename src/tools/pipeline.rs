use std::any::Any;
use std::fmt;
use std::fs;
use std::panic::{
    self,
    AssertUnwindSafe,
};
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
use rayon::ThreadPoolBuilder;
use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::{
    AdjustedResult,
    CorrelationResult,
    MotifId,
};
use crate::io::{
    read_wide_matrix,
    write_table,
    MotifJob,
};
use crate::tools::correlation::{
    adjust_correlations,
    correlate_sites,
    significant_results,
    DEFAULT_ALPHA,
};
use crate::tools::covariant::{
    filter_zero_signal,
    join_observations,
    region_variances,
    scale_fps_columns,
    select_covariant_sites,
    DEFAULT_IQR_MULTIPLIER,
};
use crate::utils::{
    bh_adjust,
    DEFAULT_WORKERS,
};
use crate::with_field_fn;

/// File name suffix of per-motif input matrices.
pub const DEFAULT_INPUT_SUFFIX: &str = "_fpscore-af-varsites-combined-matrix-wide.tsv";
pub const COVARIANT_DIR: &str = "covariant-sites";
pub const CORRELATION_DIR: &str = "correlation-tests";
pub const SUMMARY_FILE: &str = "pipeline_summary.json";

/// Set of p-values a Benjamini-Hochberg correction runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FdrScope {
    /// Each motif's regions are corrected on their own.
    #[default]
    PerMotif,
    /// Regions of all completed motifs are corrected together.
    Pooled,
}

impl fmt::Display for FdrScope {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::PerMotif => f.write_str("per-motif"),
            Self::Pooled => f.write_str("pooled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovariantConfig {
    /// Multiplier of the IQR for the upper outlier fence.
    pub iqr_multiplier: f64,
    /// Adjusted p-values strictly below this are significant.
    pub alpha:          f64,
    pub fdr_scope:      FdrScope,
    /// Number of motifs processed concurrently.
    pub n_workers:      usize,
    /// Stripped from input file names to get motif ids.
    pub input_suffix:   String,
}

impl Default for CovariantConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            alpha:          DEFAULT_ALPHA,
            fdr_scope:      FdrScope::default(),
            n_workers:      *DEFAULT_WORKERS,
            input_suffix:   DEFAULT_INPUT_SUFFIX.to_owned(),
        }
    }
}

impl CovariantConfig {
    with_field_fn!(iqr_multiplier, f64);

    with_field_fn!(alpha, f64);

    with_field_fn!(fdr_scope, FdrScope);

    with_field_fn!(n_workers, usize);

    with_field_fn!(input_suffix, String);

    pub fn input_suffix(&self) -> &str {
        &self.input_suffix
    }

    pub fn finish(self) -> CovariantPipeline {
        CovariantPipeline::new(self)
    }
}

/// Output paths under the pipeline's output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the output root and its subdirectories.
    pub fn prepare(&self) -> Result<()> {
        for dir in [self.covariant_dir(), self.correlation_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Could not create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn covariant_dir(&self) -> PathBuf {
        self.root.join(COVARIANT_DIR)
    }

    pub fn correlation_dir(&self) -> PathBuf {
        self.root.join(CORRELATION_DIR)
    }

    pub fn covariant_sites(
        &self,
        motif_id: &str,
    ) -> PathBuf {
        self.covariant_dir()
            .join(format!("{}_covariant_sites.tsv", motif_id))
    }

    pub fn correlations(
        &self,
        motif_id: &str,
    ) -> PathBuf {
        self.correlation_dir()
            .join(format!("{}_correlation_test_results.tsv", motif_id))
    }

    pub fn adjusted(
        &self,
        motif_id: &str,
    ) -> PathBuf {
        self.correlation_dir()
            .join(format!("{}_correlation_test_results_fdr-corrected.tsv", motif_id))
    }

    pub fn significant(
        &self,
        motif_id: &str,
    ) -> PathBuf {
        self.correlation_dir()
            .join(format!("{}_correlation_test_results_significant.tsv", motif_id))
    }

    pub fn summary(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotifStatus {
    Completed,
    Skipped,
    Failed,
}

/// Outcome of one motif.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifSummary {
    pub motif_id:            MotifId,
    pub status:              MotifStatus,
    pub n_regions:           usize,
    pub n_retained_regions:  usize,
    pub n_covariant_regions: usize,
    pub n_tested:            usize,
    /// Set once the FDR correction for the motif has been written.
    pub n_significant:       Option<usize>,
    pub message:             Option<String>,
}

impl MotifSummary {
    fn new(
        motif_id: &str,
        status: MotifStatus,
    ) -> Self {
        Self {
            motif_id: motif_id.to_owned(),
            status,
            n_regions: 0,
            n_retained_regions: 0,
            n_covariant_regions: 0,
            n_tested: 0,
            n_significant: None,
            message: None,
        }
    }

    fn with_message(
        mut self,
        message: impl Into<String>,
    ) -> Self {
        self.message = Some(message.into());
        self
    }

    fn fail(
        &mut self,
        message: String,
    ) {
        self.status = MotifStatus::Failed;
        self.n_significant = None;
        self.message = Some(message);
    }
}

/// Per-motif outcomes of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub fdr_scope: FdrScope,
    pub alpha:     f64,
    pub motifs:    Vec<MotifSummary>,
}

impl PipelineReport {
    fn count(
        &self,
        status: MotifStatus,
    ) -> usize {
        self.motifs
            .iter()
            .filter(|m| m.status == status)
            .count()
    }

    pub fn n_completed(&self) -> usize {
        self.count(MotifStatus::Completed)
    }

    pub fn n_skipped(&self) -> usize {
        self.count(MotifStatus::Skipped)
    }

    pub fn n_failed(&self) -> usize {
        self.count(MotifStatus::Failed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &MotifSummary> {
        self.motifs
            .iter()
            .filter(|m| m.status == MotifStatus::Failed)
    }

    pub fn write_json(
        &self,
        path: &Path,
    ) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("Could not create {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

struct MotifAnalysis {
    summary:      MotifSummary,
    /// Unadjusted results kept for pooled correction.
    correlations: Vec<CorrelationResult>,
}

impl MotifAnalysis {
    fn failed(
        motif_id: &str,
        message: String,
    ) -> Self {
        Self {
            summary:      MotifSummary::new(motif_id, MotifStatus::Failed).with_message(message),
            correlations: Vec::new(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    }
    else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    }
    else {
        "unknown panic".to_owned()
    }
}

/// Runs the covariant-site analysis for a batch of motifs.
///
/// Motifs are processed independently on a pool of `n_workers` threads. An
/// error or panic while processing one motif marks it as failed and does
/// not affect the others.
pub struct CovariantPipeline {
    config: CovariantConfig,
}

impl CovariantPipeline {
    pub fn new(config: CovariantConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CovariantConfig {
        &self.config
    }

    /// Processes `jobs`, writing results under `output_dir`.
    ///
    /// `on_motif_done` is called from the worker threads as soon as the
    /// per-motif stages of a motif have finished. With [`FdrScope::Pooled`]
    /// the correction runs after every motif has been processed, so
    /// `n_significant` is not yet set at that point.
    ///
    /// Only errors which concern the whole run (output directories, thread
    /// pool, summary file) are returned as `Err`.
    pub fn run<F>(
        &self,
        jobs: Vec<MotifJob>,
        output_dir: &Path,
        on_motif_done: F,
    ) -> Result<PipelineReport>
    where
        F: Fn(&MotifSummary) + Send + Sync, {
        let layout = OutputLayout::new(output_dir);
        layout.prepare()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.n_workers.max(1))
            .build()
            .context("Failed to create thread pool")?;
        info!(
            "Processing {} motif(s) with {} worker(s), FDR scope: {}",
            jobs.len(),
            pool.current_num_threads(),
            self.config.fdr_scope
        );

        let mut analyses = pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let analysis = self.run_isolated(job, &layout);
                    on_motif_done(&analysis.summary);
                    analysis
                })
                .collect::<Vec<_>>()
        });

        if self.config.fdr_scope == FdrScope::Pooled {
            self.adjust_pooled(&mut analyses, &layout);
        }

        let report = PipelineReport {
            fdr_scope: self.config.fdr_scope,
            alpha:     self.config.alpha,
            motifs:    analyses
                .into_iter()
                .map(|analysis| analysis.summary)
                .collect_vec(),
        };
        report.write_json(&layout.summary())?;
        info!(
            "Done: {} completed, {} skipped, {} failed",
            report.n_completed(),
            report.n_skipped(),
            report.n_failed()
        );
        Ok(report)
    }

    fn run_isolated(
        &self,
        job: &MotifJob,
        layout: &OutputLayout,
    ) -> MotifAnalysis {
        match panic::catch_unwind(AssertUnwindSafe(|| self.analyse_motif(job, layout))) {
            Ok(Ok(analysis)) => analysis,
            Ok(Err(e)) => {
                let message = format!("{:#}", e);
                error!("{}: {}", job.motif_id, message);
                MotifAnalysis::failed(&job.motif_id, message)
            },
            Err(payload) => {
                let message = format!("panicked: {}", panic_message(payload.as_ref()));
                error!("{}: {}", job.motif_id, message);
                MotifAnalysis::failed(&job.motif_id, message)
            },
        }
    }

    fn analyse_motif(
        &self,
        job: &MotifJob,
        layout: &OutputLayout,
    ) -> Result<MotifAnalysis> {
        let motif = job.motif_id.as_str();
        info!("{}: reading {}", motif, job.path.display());

        let Some(matrix) = read_wide_matrix(&job.path)?
        else {
            warn!("{}: input has no data rows, skipping", motif);
            return Ok(MotifAnalysis {
                summary:      MotifSummary::new(motif, MotifStatus::Skipped)
                    .with_message("input has no data rows"),
                correlations: Vec::new(),
            });
        };
        let mut summary = MotifSummary::new(motif, MotifStatus::Completed);
        summary.n_regions = matrix.n_regions();

        let scaled = scale_fps_columns(&matrix);
        let observations = join_observations(&matrix, &scaled);
        debug!("{}: {} observations after join", motif, observations.len());

        let retained = filter_zero_signal(observations);
        summary.n_retained_regions = retained
            .iter()
            .map(|obs| obs.region_id.as_str())
            .unique()
            .count();
        info!(
            "{}: {} of {} regions have non-zero AF and FPS",
            motif, summary.n_retained_regions, summary.n_regions
        );

        let variances = region_variances(&retained);
        let sites = select_covariant_sites(&retained, &variances, self.config.iqr_multiplier);
        summary.n_covariant_regions = sites
            .iter()
            .map(|site| site.region_id.as_str())
            .unique()
            .count();
        write_table(&layout.covariant_sites(motif), &sites)?;
        info!(
            "{}: {} covariant regions ({} rows)",
            motif,
            summary.n_covariant_regions,
            sites.len()
        );

        let correlations = correlate_sites(&sites)?;
        write_table(&layout.correlations(motif), &correlations)?;
        summary.n_tested = correlations.len();

        match self.config.fdr_scope {
            FdrScope::PerMotif => {
                let adjusted = adjust_correlations(correlations);
                summary.n_significant = Some(self.write_adjusted(layout, motif, &adjusted)?);
                Ok(MotifAnalysis {
                    summary,
                    correlations: Vec::new(),
                })
            },
            FdrScope::Pooled => Ok(MotifAnalysis {
                summary,
                correlations,
            }),
        }
    }

    fn adjust_pooled(
        &self,
        analyses: &mut [MotifAnalysis],
        layout: &OutputLayout,
    ) {
        let completed = analyses
            .iter_mut()
            .filter(|a| a.summary.status == MotifStatus::Completed)
            .collect_vec();
        let pvalues = completed
            .iter()
            .flat_map(|a| a.correlations.iter().map(|c| c.pvalue))
            .collect_vec();
        info!(
            "Pooled FDR correction over {} tests from {} motif(s)",
            pvalues.len(),
            completed.len()
        );

        let mut adjusted = bh_adjust(&pvalues).into_iter();
        for analysis in completed {
            let rows = analysis
                .correlations
                .drain(..)
                .zip(adjusted.by_ref())
                .map(|(result, adj)| AdjustedResult::new(result, adj))
                .collect_vec();
            let motif = analysis.summary.motif_id.clone();
            match self.write_adjusted(layout, &motif, &rows) {
                Ok(n) => analysis.summary.n_significant = Some(n),
                Err(e) => {
                    let message = format!("{:#}", e);
                    error!("{}: {}", motif, message);
                    analysis.summary.fail(message);
                },
            }
        }
    }

    /// Writes the corrected and significant tables of a motif and returns
    /// the number of significant regions.
    fn write_adjusted(
        &self,
        layout: &OutputLayout,
        motif: &str,
        adjusted: &[AdjustedResult],
    ) -> Result<usize> {
        write_table(&layout.adjusted(motif), adjusted)?;
        let significant = significant_results(adjusted, self.config.alpha);
        write_table(&layout.significant(motif), &significant)?;
        info!(
            "{}: {} of {} regions significant at alpha = {}",
            motif,
            significant.len(),
            adjusted.len(),
            self.config.alpha
        );
        Ok(significant.len())
    }
}
