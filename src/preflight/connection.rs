//! Connection preflight check.

use super::CheckResult;
use crate::core::database::Database;
use crate::models::config::Config;

/// Open a test connection and close it again.
pub fn check(config: &Config) -> CheckResult {
    let result = Database::from_config(config).and_then(|db| db.check_connection());
    match result {
        Ok(()) => CheckResult::ok("connection", "opened and closed a test connection"),
        Err(e) => CheckResult::fail(
            "connection",
            &e.to_string(),
            "Check that the database url points to a reachable location",
        ),
    }
}
