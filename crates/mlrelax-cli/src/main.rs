mod cli;
mod commands;
mod error;
mod logging;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("\nError: {e}");
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    info!("mlrelax v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let result = match cli.command {
        Commands::Relax(args) => {
            info!("Dispatching to 'relax' command.");
            commands::relax::run(args)
        }
        Commands::Phonon(args) => {
            info!("Dispatching to 'phonon' command.");
            commands::phonon::run(args)
        }
        Commands::Gap(args) => {
            info!("Dispatching to 'gap' command.");
            commands::gap::run(args)
        }
    };

    match &result {
        Ok(_) => info!("Command completed successfully."),
        Err(e) => error!("Command failed: {e}"),
    }
    result
}
