//! Configuration model.
//!
//! Connection settings are an explicit value handed to whatever opens
//! connections; nothing here is global.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_URL: &str = "sqlite://dbaction.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_POOL_SIZE: usize = 1;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection configuration.
    pub connection: ConnectionConfig,
    /// Worker pool configuration for composite actions.
    pub pool: PoolConfig,
}

/// Connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Database location.
    pub url: String,
    /// User name, for connectors that authenticate.
    pub username: Option<String>,
    /// Password, for connectors that authenticate.
    pub password: Option<String>,
    /// Commit after every statement instead of once per action.
    pub auto_commit: bool,
    /// How long to wait on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of workers a composite action fans out on.
    pub size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: None,
            password: None,
            auto_commit: true,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
        }
    }
}

impl Config {
    /// Parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no connector can work with.
    pub fn validate(&self) -> Result<()> {
        if self.connection.url.trim().is_empty() {
            return Err(Error::InvalidConfig("connection.url is empty".to_string()));
        }
        if self.pool.size == 0 {
            return Err(Error::InvalidConfig("pool.size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Apply `DBACTION_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DBACTION_URL") {
            self.connection.url = url;
        }
        if let Some(username) = lookup("DBACTION_USERNAME") {
            self.connection.username = Some(username);
        }
        if let Some(password) = lookup("DBACTION_PASSWORD") {
            self.connection.password = Some(password);
        }
        if let Some(size) = lookup("DBACTION_POOL_SIZE").and_then(|s| s.parse().ok()) {
            self.pool.size = size;
        }
    }
}

/// Get the configuration directory path.
fn dirs_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dbaction")
}

/// Load configuration from the user config directory, falling back to defaults,
/// then apply environment overrides.
pub fn load_config() -> Config {
    let config_path = dirs_config_path().join("config.toml");

    let mut config = if config_path.exists() {
        match Config::load(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring {}: {}", config_path.display(), e);
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    config.apply_env();
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.connection.auto_commit);
        assert_eq!(config.pool.size, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[connection]\nurl = \"sqlite://test.db\"\nauto_commit = false\n\n[pool]\nsize = 4\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.connection.url, "sqlite://test.db");
        assert!(!config.connection.auto_commit);
        assert_eq!(config.connection.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert_eq!(config.pool.size, 4);
    }

    #[test]
    fn test_load_rejects_zero_pool() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pool]\nsize = 0\n").unwrap();

        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DBACTION_URL", "sqlite://other.db"),
            ("DBACTION_USERNAME", "alice"),
            ("DBACTION_POOL_SIZE", "3"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.connection.url, "sqlite://other.db");
        assert_eq!(config.connection.username.as_deref(), Some("alice"));
        assert_eq!(config.connection.password, None);
        assert_eq!(config.pool.size, 3);
    }
}
