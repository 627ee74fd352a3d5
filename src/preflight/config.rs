//! Configuration preflight check.

use super::CheckResult;
use crate::models::config::Config;

/// Check that the configuration is usable.
pub fn check(config: &Config) -> CheckResult {
    match config.validate() {
        Ok(()) => CheckResult::ok(
            "config",
            &format!(
                "{} (pool of {})",
                config.connection.url, config.pool.size
            ),
        ),
        Err(e) => CheckResult::fail(
            "config",
            &e.to_string(),
            "Fix ~/.config/dbaction/config.toml or the DBACTION_* environment variables",
        ),
    }
}
