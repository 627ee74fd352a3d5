//! SQLite connector.
//!
//! The url is either `sqlite://<path>`, a bare `<path>`, or `:memory:`. Every
//! connection to `:memory:` is a separate, empty database. User name and
//! password are ignored.

use crate::models::config::ConnectionConfig;
use crate::models::query::{Query, Value};
use crate::models::table::Table;
use crate::services::connector::{Connection, Connector};
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use std::sync::Arc;
use std::time::Duration;

const URL_SCHEME: &str = "sqlite://";
const IN_MEMORY: &str = ":memory:";

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        let value = match self {
            Value::Null => Sql::Null,
            Value::Text(s) => return Ok(ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes()))),
            Value::Int(n) => Sql::Integer(i64::from(*n)),
            Value::Long(n) => Sql::Integer(*n),
            Value::Short(n) => Sql::Integer(i64::from(*n)),
            Value::Byte(n) => Sql::Integer(i64::from(*n)),
            Value::Double(n) => Sql::Real(*n),
            Value::Float(n) => Sql::Real(f64::from(*n)),
            Value::Bool(b) => Sql::Integer(i64::from(*b)),
            Value::Char(c) => Sql::Text(c.to_string()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

/// Render one SQLite value as cell text.
fn cell_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Some(bytes.iter().map(|b| format!("{:02x}", b)).collect()),
    }
}

/// Opens SQLite connections described by a [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    config: ConnectionConfig,
}

impl SqliteConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Connector for a database file at `path`, auto-commit on.
    pub fn with_path(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(ConnectionConfig {
            url: format!("{}{}", URL_SCHEME, path.as_ref().display()),
            ..ConnectionConfig::default()
        })
    }

    /// File path (or `:memory:`) named by the configured url.
    pub fn path(&self) -> &str {
        let url = self.config.url.as_str();
        url.strip_prefix(URL_SCHEME).unwrap_or(url)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Connector for SqliteConnector {
    fn open(&self) -> Result<Arc<dyn Connection>> {
        let path = self.path();
        let conn = if path == IN_MEMORY {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(path)
        }
        .map_err(Error::connection)?;

        conn.busy_timeout(Duration::from_millis(self.config.busy_timeout_ms))
            .map_err(Error::connection)?;
        if !self.config.auto_commit {
            conn.execute_batch("BEGIN").map_err(Error::connection)?;
        }

        tracing::debug!("Opened SQLite connection to {}", path);
        Ok(Arc::new(SqliteConnection {
            inner: Mutex::new(Some(conn)),
            auto_commit: self.config.auto_commit,
        }))
    }
}

/// One SQLite connection, usable from several workers at a time.
pub struct SqliteConnection {
    inner: Mutex<Option<rusqlite::Connection>>,
    auto_commit: bool,
}

impl SqliteConnection {
    fn with_open<R>(&self, f: impl FnOnce(&rusqlite::Connection) -> Result<R>) -> Result<R> {
        let guard = self.inner.lock();
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(Error::connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection is closed",
            ))),
        }
    }

    /// End the open transaction with `verb` and start the next one.
    fn end_transaction(&self, verb: &str) -> Result<()> {
        if self.auto_commit {
            return Ok(());
        }
        self.with_open(|conn| {
            if !conn.is_autocommit() {
                conn.execute_batch(verb).map_err(Error::connection)?;
            }
            conn.execute_batch("BEGIN").map_err(Error::connection)
        })
    }
}

impl Connection for SqliteConnection {
    fn query(&self, query: &Query) -> Result<Table> {
        self.with_open(|conn| {
            let fail = |e: rusqlite::Error| Error::statement(query.text(), e);

            let mut stmt = conn.prepare(query.text()).map_err(fail)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let width = columns.len();

            let mut rows = stmt
                .query(rusqlite::params_from_iter(query.args().iter()))
                .map_err(fail)?;
            let mut cells = Vec::new();
            while let Some(row) = rows.next().map_err(fail)? {
                let mut tuple = Vec::with_capacity(width);
                for i in 0..width {
                    tuple.push(cell_text(row.get_ref(i).map_err(fail)?));
                }
                cells.push(tuple);
            }

            Table::new(columns, cells)
        })
    }

    fn execute(&self, query: &Query) -> Result<()> {
        self.with_open(|conn| {
            let fail = |e: rusqlite::Error| Error::statement(query.text(), e);

            let mut stmt = conn.prepare(query.text()).map_err(fail)?;
            let mut rows = stmt
                .query(rusqlite::params_from_iter(query.args().iter()))
                .map_err(fail)?;
            // Step through any returned rows so the statement runs to completion.
            while rows.next().map_err(fail)?.is_some() {}
            Ok(())
        })
    }

    fn commit(&self) -> Result<()> {
        self.end_transaction("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.end_transaction("ROLLBACK")
    }

    fn close(&self) -> Result<()> {
        let conn = self.inner.lock().take().ok_or_else(|| {
            Error::connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection already closed",
            ))
        })?;
        conn.close().map_err(|(_, e)| Error::connection(e))?;
        tracing::debug!("Closed SQLite connection");
        Ok(())
    }
}
