use std::path::Path;

use afps_covar::exports::pretty_env_logger;
use afps_covar::utils::DEFAULT_WORKERS;
use clap::{
    ArgAction,
    Args,
};
use console::style;
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use log::LevelFilter;

#[derive(Args, Debug, Clone)]
pub(crate) struct UtilsArgs {
    #[arg(
        short = 't',
        long,
        help_heading = "RUNTIME ARGS",
        help = "Number of worker threads. Defaults to AFPS_NUM_THREADS, or 8 if unset."
    )]
    pub threads:  Option<usize>,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help_heading = "RUNTIME ARGS",
        help = "Increase logging verbosity (-v debug, -vv trace)."
    )]
    pub verbose:  u8,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "RUNTIME ARGS",
        help = "Display a progress bar."
    )]
    pub progress: bool,
}

impl UtilsArgs {
    pub fn setup(&self) -> anyhow::Result<()> {
        let level = match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        let mut builder = pretty_env_logger::formatted_builder();
        builder.filter_level(level);
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        builder.try_init()?;

        rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_threads())
            .build_global()?;
        Ok(())
    }

    pub fn n_threads(&self) -> usize {
        self.threads
            .filter(|n| *n > 0)
            .unwrap_or(*DEFAULT_WORKERS)
    }
}

pub fn init_pbar(total: usize) -> anyhow::Result<ProgressBar> {
    let progress_bar = ProgressBar::new(total as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}, ETA: {eta}] [{bar:40.cyan/blue}] {pos:>5.green}/{len:5} {msg}")?
            .progress_chars("#>-"),
    );
    progress_bar.set_message("Processing...");
    Ok(progress_bar)
}

pub(crate) fn pbar_or_hidden(
    utils: &UtilsArgs,
    total: usize,
) -> anyhow::Result<ProgressBar> {
    if utils.progress {
        init_pbar(total)
    }
    else {
        Ok(ProgressBar::hidden())
    }
}

/// Prints the output location of a finished command.
pub(crate) fn report_output(path: &Path) {
    println!(
        "Results written to {}",
        style(path.display()).green()
    );
}
