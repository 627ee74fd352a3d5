//! Preflight checks module.

mod config;
mod connection;

use crate::models::config::Config;
use colored::Colorize;

/// Result of a preflight check.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub success: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl CheckResult {
    pub fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            success: true,
            message: message.to_string(),
            hint: None,
        }
    }

    pub fn fail(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }
}

/// Run all preflight checks.
///
/// The connection is only tried when the configuration is valid.
pub fn run_preflight_checks(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    // Check configuration
    results.push(config::check(config));

    // Check connection
    if results[0].success {
        results.push(connection::check(config));
    }

    results
}

/// Print preflight check results.
pub fn print_results(results: &[CheckResult]) {
    for result in results {
        if result.success {
            println!(
                "{} {}: {}",
                "[OK]".green(),
                result.name.bold(),
                result.message
            );
        } else {
            println!(
                "{} {}: {}",
                "[FAIL]".red(),
                result.name.bold(),
                result.message
            );
            if let Some(ref hint) = result.hint {
                println!("  {} {}", "->".yellow(), hint);
            }
        }
    }
}

/// Check if all preflight checks passed.
pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_skips_connection() {
        let mut config = Config::default();
        config.pool.size = 0;

        let results = run_preflight_checks(&config);
        assert_eq!(results.len(), 1);
        assert!(!all_passed(&results));
    }

    #[test]
    fn test_passes_with_temp_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.connection.url = format!("sqlite://{}", dir.path().join("check.db").display());

        let results = run_preflight_checks(&config);
        assert_eq!(results.len(), 2);
        assert!(all_passed(&results));
    }
}
