use std::path::PathBuf;

use afps_covar::prelude::*;
use afps_covar::tools::correlation::DEFAULT_ALPHA;
use anyhow::bail;
use clap::Args;
use console::style;

use crate::utils::{
    report_output,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct ContingencyArgs {
    #[arg(help = "Directory with per-motif `*_AF-FPS_region_contingency_table.tsv` files.")]
    input_dir:  PathBuf,
    #[arg(help = "Directory for Fisher's exact test results.")]
    output_dir: PathBuf,

    #[arg(
        short = 'p',
        long,
        default_value_t = DEFAULT_ALPHA,
        help = "Adjusted p-value threshold for the SIG table."
    )]
    alpha: f64,
}

impl ContingencyArgs {
    pub fn run(
        &self,
        _utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let report = run_contingency(&self.input_dir, &self.output_dir, self.alpha)?;
        println!(
            "{}",
            style(format!(
                "Tested {} motif(s), {} significant.",
                report.results.len(),
                report.significant(self.alpha).count()
            ))
            .green()
            .bold()
        );
        report_output(&self.output_dir);

        if !report.failed.is_empty() {
            for (motif_id, message) in report.failed.iter() {
                eprintln!("{} {}", style(format!("{}:", motif_id)).red(), message);
            }
            bail!("{} contingency table(s) failed", report.failed.len());
        }
        Ok(())
    }
}
