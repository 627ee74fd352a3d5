//! Query command implementation.

use crate::core::database::Database;
use crate::models::config::Config;
use crate::models::query::Value;
use crate::Result;
use colored::Colorize;

/// Run `sql` with `args` and print the resulting table.
pub async fn run_query(config: &Config, sql: &str, args: &[String], json: bool) -> Result<()> {
    let db = Database::from_config(config)?;
    let args: Vec<Value> = args.iter().map(|a| Value::parse_literal(a)).collect();

    tracing::debug!("Query: {} with {} arguments", sql, args.len());
    let table = db.statement(sql, args).query().into_future().await?;

    if json {
        let output = serde_json::to_string_pretty(&table)
            .map_err(|e| crate::Error::other(format!("Failed to serialize result: {}", e)))?;
        println!("{}", output);
        return Ok(());
    }

    if table.column_count() == 0 {
        println!("{}", "Statement executed.".green());
        return Ok(());
    }

    println!("{}", table.columns().join(", ").bold());
    for row in &table {
        println!("{}", row);
    }
    println!();
    println!("{} row(s)", table.row_count());

    Ok(())
}
