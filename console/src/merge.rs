use std::path::PathBuf;

use afps_covar::prelude::*;
use clap::Args;
use console::style;

use crate::utils::{
    report_output,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct MergeArgs {
    #[arg(help = "Directory with per-motif `*significant.tsv` tables.")]
    input_dir:  PathBuf,
    #[arg(help = "Directory for the combined table.")]
    output_dir: PathBuf,
}

impl MergeArgs {
    pub fn run(
        &self,
        _utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let n_rows = run_merge(&self.input_dir, &self.output_dir)?;
        println!(
            "{}",
            style(format!("Merged {} significant region(s).", n_rows))
                .green()
                .bold()
        );
        report_output(&self.output_dir);
        Ok(())
    }
}
