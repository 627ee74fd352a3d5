//! dbaction CLI
//!
//! Runs queries and batches of statements through the deferred action framework.

use clap::Parser;
use dbaction::cli::{
    args::{Cli, Commands},
    commands::{batch, check, query},
};
use dbaction::models::config::{self, Config};
use dbaction::preflight;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    // Run the appropriate command
    match cli.command {
        Commands::Check => {
            check::check(&config).await?;
        }

        Commands::Query { sql, args, json } => {
            if !cli.skip_preflight {
                run_preflight_checks(&config)?;
            }
            query::run_query(&config, &sql, &args, json).await?;
        }

        Commands::Batch { file, pool } => {
            if !cli.skip_preflight {
                run_preflight_checks(&config)?;
            }
            batch::run_batch(&config, &file, pool).await?;
        }
    }

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("dbaction=debug")
    } else {
        EnvFilter::new("dbaction=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

/// Load the file given with `--config`, or the user configuration.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    match &cli.config {
        Some(path) => {
            let mut config = Config::load(path)?;
            config.apply_env();
            Ok(config)
        }
        None => Ok(config::load_config()),
    }
}

/// Run preflight checks and exit if any fail.
fn run_preflight_checks(config: &Config) -> anyhow::Result<()> {
    use colored::Colorize;

    println!("{}", "Running preflight checks...".bold());
    println!();

    let results = preflight::run_preflight_checks(config);
    preflight::print_results(&results);

    println!();

    if !preflight::all_passed(&results) {
        anyhow::bail!("Preflight checks failed. Fix the issues above and try again.");
    }

    Ok(())
}
