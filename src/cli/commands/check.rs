//! Check command implementation.

use crate::models::config::Config;
use crate::preflight;
use crate::{Error, Result};
use colored::Colorize;

/// Run the preflight checks and report them.
pub async fn check(config: &Config) -> Result<()> {
    println!("{}", "Checking database connection...".bold().cyan());
    println!();

    let results = preflight::run_preflight_checks(config);
    preflight::print_results(&results);
    println!();

    if !preflight::all_passed(&results) {
        return Err(Error::other("One or more checks failed"));
    }

    println!("{}", "All checks passed.".green());
    Ok(())
}
