//! Error types for database actions.

use crate::core::decode::DecodeError;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Shared handle to an underlying failure.
///
/// Errors are cloned whenever a staged result hands the same failure to several
/// consumers, so foreign causes are kept behind an `Arc`.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for database actions.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // Connector errors
    #[error("Connection failed: {source}")]
    Connection {
        #[source]
        source: Cause,
    },

    #[error("Statement failed: {statement}: {source}")]
    Statement {
        statement: String,
        #[source]
        source: Cause,
    },

    // Mapping errors
    #[error("Failed to decode column '{column}': {source}")]
    Decode {
        column: String,
        #[source]
        source: DecodeError,
    },

    #[error("Mapping failed: {0}")]
    Mapping(String),

    #[error("{0} does not declare any column bindings")]
    NoBindings(&'static str),

    #[error("Malformed table: {0}")]
    MalformedTable(String),

    // Programmer misuse
    #[error("Deferred result is already staged")]
    AlreadyStaged,

    // Worker errors
    #[error("Worker pool has been shut down")]
    PoolShutdown,

    #[error("Worker dropped the task before it completed")]
    WorkerLost,

    #[error("Batch aborted after an earlier action failed")]
    BatchAborted,

    #[error("Task panicked: {0}")]
    Panicked(String),

    // Configuration errors
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Wrap a failure to open, commit, or close a connection.
    pub fn connection<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Connection {
            source: Arc::new(err),
        }
    }

    /// Wrap a failure raised while running `statement`.
    pub fn statement<S, E>(statement: S, err: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Statement {
            statement: statement.into(),
            source: Arc::new(err),
        }
    }

    /// Whether this failure came from the Connector boundary.
    pub fn is_database(&self) -> bool {
        matches!(self, Error::Connection { .. } | Error::Statement { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParse(err.to_string())
    }
}
