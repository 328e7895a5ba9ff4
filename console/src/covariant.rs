use std::path::PathBuf;

use afps_covar::prelude::*;
use afps_covar::tools::correlation::DEFAULT_ALPHA;
use afps_covar::tools::covariant::DEFAULT_IQR_MULTIPLIER;
use afps_covar::tools::pipeline::DEFAULT_INPUT_SUFFIX;
use anyhow::bail;
use clap::{
    Args,
    ValueEnum,
};
use console::style;

use crate::utils::{
    pbar_or_hidden,
    report_output,
    UtilsArgs,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum CliFdrScope {
    /// Correct each motif on its own.
    PerMotif,
    /// Correct all motifs' tests together.
    Pooled,
}

impl From<CliFdrScope> for FdrScope {
    fn from(value: CliFdrScope) -> Self {
        match value {
            CliFdrScope::PerMotif => FdrScope::PerMotif,
            CliFdrScope::Pooled => FdrScope::Pooled,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct CovariantArgs {
    #[arg(help = "Directory with per-motif wide AF/FPS matrices.")]
    input_dir:  PathBuf,
    #[arg(help = "Directory for covariant sites and correlation tests.")]
    output_dir: PathBuf,

    #[arg(
        long,
        value_enum,
        default_value_t = CliFdrScope::PerMotif,
        help_heading = "TEST ARGS",
        help = "Set of tests the Benjamini-Hochberg correction runs over."
    )]
    fdr_scope: CliFdrScope,

    #[arg(
        long,
        default_value_t = DEFAULT_IQR_MULTIPLIER,
        help_heading = "FILTER ARGS",
        help = "IQR multiplier of the upper outlier fence. Regions whose AF and \
                FPS variances both exceed Q3 + k * IQR are covariant."
    )]
    iqr_multiplier: f64,

    #[arg(
        short = 'p',
        long,
        default_value_t = DEFAULT_ALPHA,
        help_heading = "TEST ARGS",
        help = "Adjusted p-value threshold. Regions strictly below it are significant."
    )]
    alpha: f64,

    #[arg(
        long,
        default_value_t = DEFAULT_INPUT_SUFFIX.to_string(),
        help = "File name suffix stripped from input files to get motif ids."
    )]
    suffix: String,
}

impl CovariantArgs {
    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let config = CovariantConfig::default()
            .with_iqr_multiplier(self.iqr_multiplier)
            .with_alpha(self.alpha)
            .with_fdr_scope(self.fdr_scope.into())
            .with_n_workers(utils.n_threads())
            .with_input_suffix(self.suffix.clone());

        let jobs = discover_motif_files(&self.input_dir, &config)?;
        if jobs.is_empty() {
            eprintln!(
                "No motif matrices found in {}",
                style(self.input_dir.display()).red()
            );
        }

        let progress_bar = pbar_or_hidden(utils, jobs.len())?;
        let report = config.finish().run(jobs, &self.output_dir, |summary| {
            progress_bar.set_message(summary.motif_id.clone());
            progress_bar.inc(1);
        })?;
        progress_bar.finish();

        println!(
            "{}",
            style(format!(
                "{} motif(s) completed, {} skipped.",
                report.n_completed(),
                report.n_skipped()
            ))
            .green()
            .bold()
        );
        report_output(&self.output_dir);

        if report.n_failed() > 0 {
            for summary in report.failed() {
                eprintln!(
                    "{} {}",
                    style(format!("{}:", summary.motif_id)).red(),
                    summary.message.as_deref().unwrap_or("unknown error")
                );
            }
            bail!("{} motif(s) failed", report.n_failed());
        }
        Ok(())
    }
}
