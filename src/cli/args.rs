//! Command line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dbaction - Run deferred database actions from the command line
#[derive(Parser, Debug)]
#[command(name = "dbaction")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/dbaction/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip preflight checks
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the configuration and open a test connection
    Check,

    /// Run a single query and print its result
    Query {
        /// SQL text, with `?` placeholders for arguments
        #[arg(value_name = "SQL")]
        sql: String,

        /// Positional argument (repeatable); NULL, numbers and text are recognised
        #[arg(short, long = "arg", value_name = "VALUE")]
        args: Vec<String>,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run every statement of a script as one batch on a shared connection
    Batch {
        /// Path to the SQL script
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Number of workers (overrides pool.size)
        #[arg(short, long)]
        pool: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_with_args() {
        let cli = Cli::parse_from([
            "dbaction", "query", "SELECT ?, ?", "--arg", "12", "-a", "NULL", "--json",
        ]);
        match cli.command {
            Commands::Query { sql, args, json } => {
                assert_eq!(sql, "SELECT ?, ?");
                assert_eq!(args, vec!["12", "NULL"]);
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_batch_global_flags() {
        let cli = Cli::parse_from(["dbaction", "batch", "setup.sql", "--pool", "4", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Batch { pool: Some(4), .. }));
    }
}
