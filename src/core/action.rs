//! Actions: deferred, reusable descriptions of database work.
//!
//! A leaf action is one statement plus a [`Mapper`]. A composite action is a
//! list of child actions plus a function over their results. Neither runs
//! anything until the [`Deferred`] returned by [`Action::query`] or
//! [`Action::execute`] is driven.
//!
//! Each dispatch of a composite opens exactly one connection, creates a fresh
//! worker pool from its [`PoolFactory`], runs every child against that shared
//! connection on the pool, and collects the results in submission order. The
//! pool is shut down and the connection closed on every exit path.

use crate::core::deferred::{settle, ColdDeferred, Deferred, StagedDeferred};
use crate::core::executor::{Executor, PoolFactory, WorkerPool};
use crate::core::mapper::Mapper;
use crate::models::query::Query;
use crate::models::table::Table;
use crate::services::connector::{finish, Connection, Connector};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Combine<B, T> = dyn Fn(Vec<B>) -> Result<T> + Send + Sync;
type Then<T, U> = dyn Fn(T) -> Result<U> + Send + Sync;

/// Work that runs against a connection it does not own.
trait Batch<T>: Send + Sync {
    fn query_on(&self, connection: &Arc<dyn Connection>) -> Result<T>;

    fn execute_on(&self, connection: &Arc<dyn Connection>) -> Result<()>;

    fn len(&self) -> usize;
}

struct Leaf<T> {
    query: Query,
    mapper: Mapper<T>,
}

impl<T> Clone for Leaf<T> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            mapper: self.mapper.clone(),
        }
    }
}

enum Kind<T> {
    Leaf(Leaf<T>),
    Composite(Arc<dyn Batch<T>>),
}

impl<T> Clone for Kind<T> {
    fn clone(&self) -> Self {
        match self {
            Kind::Leaf(leaf) => Kind::Leaf(leaf.clone()),
            Kind::Composite(batch) => Kind::Composite(Arc::clone(batch)),
        }
    }
}

/// A unit of deferred database work producing a `T`.
///
/// Actions are immutable. Every combinator returns a new action, and an
/// action can be dispatched any number of times; each dispatch gets its own
/// connection and, for composites, its own worker pool.
pub struct Action<T> {
    kind: Kind<T>,
    connector: Arc<dyn Connector>,
    executor: Arc<dyn Executor>,
}

impl<T> Clone for Action<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            connector: Arc::clone(&self.connector),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<T> std::fmt::Debug for Action<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Kind::Leaf(leaf) => f.debug_struct("Action").field("query", &leaf.query).finish(),
            Kind::Composite(batch) => f
                .debug_struct("Action")
                .field("children", &batch.len())
                .finish(),
        }
    }
}

impl<T: Clone + Send + 'static> Action<T> {
    pub(crate) fn leaf(
        query: Query,
        mapper: Mapper<T>,
        connector: Arc<dyn Connector>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            kind: Kind::Leaf(Leaf { query, mapper }),
            connector,
            executor,
        }
    }

    /// Combine `children` with `combine`. The children's own connectors and
    /// executors are ignored: inside a batch they run on the batch's
    /// connection and pool.
    pub(crate) fn composite<B, F>(
        children: Vec<Action<B>>,
        combine: F,
        pool: PoolFactory,
        connector: Arc<dyn Connector>,
        executor: Arc<dyn Executor>,
    ) -> Self
    where
        B: Clone + Send + 'static,
        F: Fn(Vec<B>) -> Result<T> + Send + Sync + 'static,
    {
        let batch = Composite {
            children,
            combine: Arc::new(combine),
            pool,
        };
        Self {
            kind: Kind::Composite(Arc::new(batch)),
            connector,
            executor,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, Kind::Composite(_))
    }

    /// The statement of a leaf action.
    pub fn statement(&self) -> Option<&Query> {
        match &self.kind {
            Kind::Leaf(leaf) => Some(&leaf.query),
            Kind::Composite(_) => None,
        }
    }

    /// Same action, with its outer computation dispatched on `executor`.
    pub fn with_executor(&self, executor: Arc<dyn Executor>) -> Self {
        Self {
            kind: self.kind.clone(),
            connector: Arc::clone(&self.connector),
            executor,
        }
    }

    /// Post-process the result.
    pub fn map<U, F>(&self, f: F) -> Action<U>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.and_then(move |value| Ok(f(value)))
    }

    /// Post-process the result with a step that can fail.
    pub fn and_then<U, F>(&self, f: F) -> Action<U>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        let kind = match &self.kind {
            Kind::Leaf(leaf) => Kind::Leaf(Leaf {
                query: leaf.query.clone(),
                mapper: leaf.mapper.clone().and_then(f),
            }),
            Kind::Composite(batch) => Kind::Composite(Arc::new(Mapped {
                inner: Arc::clone(batch),
                then: Arc::new(f) as Arc<Then<T, U>>,
            })),
        };
        Action {
            kind,
            connector: Arc::clone(&self.connector),
            executor: Arc::clone(&self.executor),
        }
    }

    /// Dispatch the action, producing its mapped result.
    ///
    /// Nothing happens until the returned result is driven.
    pub fn query(&self) -> Deferred<T> {
        let this = self.clone();
        Deferred::with_executor(
            move || this.with_connection(|conn| this.run_on(conn)),
            Arc::clone(&self.executor),
        )
    }

    /// Dispatch the action for its side effects only.
    pub fn execute(&self) -> Deferred<()> {
        let this = self.clone();
        Deferred::with_executor(
            move || this.with_connection(|conn| this.execute_on(conn)),
            Arc::clone(&self.executor),
        )
    }

    /// Open a connection, run `body` on it and finish the connection whatever
    /// the outcome. A panic in `body` counts as a failure.
    fn with_connection<R>(&self, body: impl FnOnce(&Arc<dyn Connection>) -> Result<R>) -> Result<R> {
        let conn = self.connector.open()?;
        let outcome = settle(|| body(&conn));
        finish(conn.as_ref(), outcome)
    }

    /// Run against a connection owned by the caller.
    fn run_on(&self, conn: &Arc<dyn Connection>) -> Result<T> {
        match &self.kind {
            Kind::Leaf(leaf) => {
                tracing::debug!("Running query: {}", leaf.query);
                let table = conn.query(&leaf.query)?;
                leaf.mapper.apply(&table)
            }
            Kind::Composite(batch) => batch.query_on(conn),
        }
    }

    fn execute_on(&self, conn: &Arc<dyn Connection>) -> Result<()> {
        match &self.kind {
            Kind::Leaf(leaf) => {
                tracing::debug!("Executing statement: {}", leaf.query);
                conn.execute(&leaf.query)
            }
            Kind::Composite(batch) => batch.execute_on(conn),
        }
    }
}

impl Action<Table> {
    /// Map the raw table with `mapper`.
    pub fn mapping<U>(&self, mapper: Mapper<U>) -> Action<U>
    where
        U: Clone + Send + 'static,
    {
        self.and_then(move |table| mapper.apply(&table))
    }
}

// ========== COMPOSITE ==========

struct Composite<B, T> {
    children: Vec<Action<B>>,
    combine: Arc<Combine<B, T>>,
    pool: PoolFactory,
}

/// Shuts the pool down when the batch is left, including by unwinding.
struct PoolGuard(Arc<WorkerPool>);

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

impl<B: Clone + Send + 'static, T> Composite<B, T> {
    /// Stage `step` for every child on a fresh pool, then collect the results
    /// in submission order. The first failure stops collection.
    ///
    /// A failing child raises the batch's abort flag before its job returns,
    /// so children that start afterwards fail with [`Error::BatchAborted`]
    /// without touching the connection.
    fn fan_out<R, S>(&self, conn: &Arc<dyn Connection>, step: S) -> Result<Vec<R>>
    where
        R: Clone + Send + 'static,
        S: Fn(&Action<B>, &Arc<dyn Connection>) -> Result<R> + Copy + Send + Sync + 'static,
    {
        let pool = Arc::new(self.pool.create()?);
        let _guard = PoolGuard(Arc::clone(&pool));
        let executor: Arc<dyn Executor> = pool;
        let aborted = Arc::new(AtomicBool::new(false));

        tracing::debug!("Running batch of {} actions", self.children.len());

        let pending: Vec<StagedDeferred<R>> = self
            .children
            .iter()
            .enumerate()
            .map(|(index, child)| {
                let child = child.clone();
                let conn = Arc::clone(conn);
                let aborted = Arc::clone(&aborted);
                let job = move || {
                    if aborted.load(Ordering::SeqCst) {
                        tracing::debug!("Skipping batch action {}", index);
                        return Err(Error::BatchAborted);
                    }
                    let outcome = settle(|| step(&child, &conn));
                    if outcome.is_err() {
                        aborted.store(true, Ordering::SeqCst);
                    }
                    outcome
                };
                ColdDeferred::new(job, Arc::clone(&executor)).stage()
            })
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        for (index, handle) in pending.iter().enumerate() {
            match handle.wait() {
                Ok(value) => results.push(value),
                Err(e) => {
                    tracing::debug!("Batch action {} failed, abandoning the rest", index);
                    return Err(e);
                }
            }
        }

        tracing::info!("Batch of {} actions completed", results.len());
        Ok(results)
    }
}

impl<B, T> Batch<T> for Composite<B, T>
where
    B: Clone + Send + 'static,
{
    fn query_on(&self, conn: &Arc<dyn Connection>) -> Result<T> {
        let values = self.fan_out(conn, |child, conn| child.run_on(conn))?;
        (self.combine)(values)
    }

    fn execute_on(&self, conn: &Arc<dyn Connection>) -> Result<()> {
        self.fan_out(conn, |child, conn| child.execute_on(conn))?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.children.len()
    }
}

/// A composite whose result is post-processed.
struct Mapped<T, U> {
    inner: Arc<dyn Batch<T>>,
    then: Arc<Then<T, U>>,
}

impl<T, U> Batch<U> for Mapped<T, U> {
    fn query_on(&self, conn: &Arc<dyn Connection>) -> Result<U> {
        self.inner.query_on(conn).and_then(|value| (self.then)(value))
    }

    fn execute_on(&self, conn: &Arc<dyn Connection>) -> Result<()> {
        self.inner.execute_on(conn)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::Inline;
    use crate::models::config::ConnectionConfig;
    use crate::services::sqlite::SqliteConnector;
    use crate::Error;

    fn memory() -> Arc<dyn Connector> {
        Arc::new(SqliteConnector::new(ConnectionConfig {
            url: ":memory:".to_string(),
            ..ConnectionConfig::default()
        }))
    }

    fn leaf(text: &str) -> Action<Table> {
        Action::leaf(
            Query::text_only(text),
            Mapper::identity(),
            memory(),
            Arc::new(Inline),
        )
    }

    #[test]
    fn test_leaf_query_maps_result() {
        let action = leaf("SELECT 41 AS n").mapping(Mapper::<Option<i64>>::value());
        assert_eq!(action.map(|n| n.map(|n| n + 1)).query().wait().unwrap(), Some(42));
        assert!(!action.is_composite());
    }

    #[test]
    fn test_composite_shares_one_connection() {
        // Each open of ":memory:" is a fresh database, so the select only sees
        // the table if all three children ran on the same connection.
        let children = vec![
            leaf("CREATE TABLE t (n INTEGER)"),
            leaf("INSERT INTO t VALUES (5)"),
            leaf("SELECT n FROM t"),
        ];
        let batch: Action<Vec<Table>> = Action::composite(
            children,
            Ok,
            PoolFactory::single(),
            memory(),
            Arc::new(Inline),
        );

        let tables = batch.query().wait().unwrap();
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[2].to_string(), "n\n5");
        assert!(batch.is_composite());
    }

    #[test]
    fn test_composite_map_runs_after_combine() {
        let batch: Action<Vec<Table>> = Action::composite(
            vec![leaf("SELECT 1"), leaf("SELECT 2")],
            Ok,
            PoolFactory::fixed(2),
            memory(),
            Arc::new(Inline),
        );
        let count = batch.map(|tables| tables.len());
        assert_eq!(count.query().wait().unwrap(), 2);
    }

    #[test]
    fn test_failing_child_fails_batch() {
        let batch: Action<Vec<Table>> = Action::composite(
            vec![leaf("SELECT 1"), leaf("SELECT * FROM missing")],
            Ok,
            PoolFactory::single(),
            memory(),
            Arc::new(Inline),
        );
        let err = batch.execute().wait().unwrap_err();
        assert!(matches!(err, Error::Statement { .. }));
    }
}
