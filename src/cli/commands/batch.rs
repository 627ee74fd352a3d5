//! Batch command implementation.
//!
//! Every statement of a script becomes one child of a single composite action,
//! so the whole script runs on one connection.

use crate::core::database::Database;
use crate::core::executor::PoolFactory;
use crate::models::config::Config;
use crate::utils::sql;
use crate::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Run the statements in `file` as one batch.
pub async fn run_batch(config: &Config, file: &Path, pool: Option<usize>) -> Result<()> {
    println!("{} {}", "Running batch:".bold().cyan(), file.display());
    println!();

    let statements = sql::read_script(file)?;
    if statements.is_empty() {
        println!("No statements found.");
        return Ok(());
    }

    let mut db = Database::from_config(config)?;
    if let Some(size) = pool {
        db = db.with_pool(PoolFactory::fixed(size));
    }

    let pb = ProgressBar::new(statements.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| crate::Error::other(e.to_string()))?
            .progress_chars("█▓░"),
    );

    let children = statements
        .iter()
        .map(|statement| {
            let pb = pb.clone();
            db.of(statement.as_str()).map(move |table| {
                pb.inc(1);
                table.row_count()
            })
        })
        .collect();

    let outcome = db.all_of(children).query().into_future().await;
    pb.finish_and_clear();
    let counts = outcome?;

    for (statement, rows) in statements.iter().zip(&counts) {
        println!("{} {} ({} rows)", "[OK]".green(), first_line(statement), rows);
    }
    println!();
    println!(
        "{}",
        format!("Batch of {} statements completed.", counts.len()).green()
    );

    Ok(())
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or(statement)
}
