//! Connector boundary.
//!
//! The framework never talks to a database directly. It asks a [`Connector`]
//! for a [`Connection`], runs statements through it, and closes it.

use crate::models::query::Query;
use crate::models::table::Table;
use crate::Result;
use std::sync::Arc;

/// Opens connections.
pub trait Connector: Send + Sync {
    fn open(&self) -> Result<Arc<dyn Connection>>;
}

/// One open connection.
///
/// A composite action shares a single connection between all of its children,
/// which may run on different workers at once, so implementations synchronise
/// internally.
pub trait Connection: Send + Sync {
    /// Run a statement that produces rows.
    fn query(&self, query: &Query) -> Result<Table>;

    /// Run a statement for its side effects.
    fn execute(&self, query: &Query) -> Result<()>;

    /// Make pending changes permanent. A no-op in auto-commit mode.
    fn commit(&self) -> Result<()>;

    /// Discard pending changes. A no-op in auto-commit mode.
    fn rollback(&self) -> Result<()>;

    /// Release the connection. Closing twice is an error.
    fn close(&self) -> Result<()>;
}

impl<C: Connector + ?Sized> Connector for Arc<C> {
    fn open(&self) -> Result<Arc<dyn Connection>> {
        (**self).open()
    }
}

/// Commit or roll back according to `outcome`, then close.
///
/// A failure to finish the connection is reported only when `outcome`
/// succeeded; otherwise the original failure wins and the cleanup failure is
/// logged.
pub fn finish<T>(connection: &dyn Connection, outcome: Result<T>) -> Result<T> {
    let settled = match &outcome {
        Ok(_) => connection.commit(),
        Err(_) => connection.rollback(),
    };
    let closed = connection.close();

    match outcome {
        Ok(value) => {
            settled?;
            closed?;
            Ok(value)
        }
        Err(e) => {
            if let Err(cleanup) = settled.and(closed) {
                tracing::warn!("Cleanup after failed action also failed: {}", cleanup);
            }
            Err(e)
        }
    }
}
