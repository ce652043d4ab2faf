//! spikewatch -- command-line entry point
//!
//! Loads the effective configuration, initializes logging, and dispatches to
//! a subcommand. Errors are printed to stderr and mapped to exit codes by
//! [`CliError::exit_code`].

mod cli;
mod commands;
mod error;
mod logging;
mod output;
mod settings;

use clap::Parser;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let loaded = settings::load(cli.config.as_deref()).await;

    let mut general = match &loaded {
        Ok((config, _)) => config.general.clone(),
        Err(_) => Default::default(),
    };
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    logging::init_tracing(&general).map_err(|e| CliError::Config(e.to_string()))?;
    spikewatch_core::metrics::describe_all();

    if let Ok((_, source)) = &loaded {
        tracing::debug!(source = %source.describe(), "configuration loaded");
    }

    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Scan(args) => {
            let (config, _) = loaded?;
            commands::scan::execute(args, config, &writer).await
        }
        Commands::Rules(args) => {
            let (config, _) = loaded?;
            commands::rules::execute(args, config, &writer)
        }
        Commands::Config(args) => commands::config::execute(args, loaded, &writer),
    }
}
