mod contingency;
mod covariant;
mod merge;
mod utils;

use std::process::exit;

use clap::error::ErrorKind;
use clap::{
    Parser,
    Subcommand,
};
use console::style;
use contingency::ContingencyArgs;
use covariant::CovariantArgs;
use merge::MergeArgs;
use utils::UtilsArgs;

#[derive(Parser, Debug)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,)]
struct Cli {
    #[command(subcommand)]
    command: MainMenu,
}

#[derive(Subcommand, Debug)]
enum MainMenu {
    /// Find AF/FPS covariant sites and test them for correlation, per motif.
    Covariant {
        #[clap(flatten)]
        args:  CovariantArgs,
        #[clap(flatten)]
        utils: UtilsArgs,
    },

    /// Combine per-motif significant tables into one table.
    Merge {
        #[clap(flatten)]
        args:  MergeArgs,
        #[clap(flatten)]
        utils: UtilsArgs,
    },

    /// Fisher's exact test over per-motif AF/FPS contingency tables.
    Contingency {
        #[clap(flatten)]
        args:  ContingencyArgs,
        #[clap(flatten)]
        utils: UtilsArgs,
    },
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        MainMenu::Covariant { args, utils } => {
            utils.setup()?;
            args.run(&utils)
        },
        MainMenu::Merge { args, utils } => {
            utils.setup()?;
            args.run(&utils)
        },
        MainMenu::Contingency { args, utils } => {
            utils.setup()?;
            args.run(&utils)
        },
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::MissingRequiredArgument
                    | ErrorKind::MissingSubcommand
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) =>
        {
            println!("{}", e.render());
            exit(2);
        },
        Err(e) => e.exit(),
    };

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        exit(1);
    }
}
