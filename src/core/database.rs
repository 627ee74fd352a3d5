//! Entry point for building actions.

use crate::core::action::Action;
use crate::core::executor::{default_executor, Executor, PoolFactory};
use crate::core::mapper::Mapper;
use crate::models::config::Config;
use crate::models::query::{Query, Value};
use crate::models::table::Table;
use crate::services::connector::{Connection, Connector};
use crate::services::sqlite::SqliteConnector;
use crate::Result;
use std::sync::Arc;

/// Builds actions that share a connector, an executor and a pool factory.
///
/// A `Database` is an explicit configuration value: create as many as needed
/// and pass them around. Cloning is cheap.
#[derive(Clone)]
pub struct Database {
    connector: Arc<dyn Connector>,
    executor: Arc<dyn Executor>,
    pool: PoolFactory,
}

impl Database {
    /// Actions dispatched on a new thread each, composites on a single worker.
    pub fn new<C: Connector + 'static>(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            executor: default_executor(),
            pool: PoolFactory::default(),
        }
    }

    /// SQLite database described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(SqliteConnector::new(config.connection.clone()))
            .with_pool(PoolFactory::fixed(config.pool.size)))
    }

    pub fn with_executor(&self, executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            ..self.clone()
        }
    }

    pub fn with_pool(&self, pool: PoolFactory) -> Self {
        Self {
            pool,
            ..self.clone()
        }
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// An action returning the raw result table of `query`.
    pub fn of(&self, query: impl Into<Query>) -> Action<Table> {
        self.action(query, Mapper::identity())
    }

    pub fn statement(&self, text: impl Into<String>, args: Vec<Value>) -> Action<Table> {
        self.of(Query::new(text, args))
    }

    pub fn action<T>(&self, query: impl Into<Query>, mapper: Mapper<T>) -> Action<T>
    where
        T: Clone + Send + 'static,
    {
        Action::leaf(
            query.into(),
            mapper,
            Arc::clone(&self.connector),
            Arc::clone(&self.executor),
        )
    }

    /// All `actions` in one batch; results come back in the order given.
    pub fn all_of<T>(&self, actions: Vec<Action<T>>) -> Action<Vec<T>>
    where
        T: Clone + Send + 'static,
    {
        self.combine(actions, Ok)
    }

    /// Like [`Database::all_of`], passing every result through `f`.
    pub fn all_of_mapped<U, T, F>(&self, actions: Vec<Action<U>>, f: F) -> Action<Vec<T>>
    where
        U: Clone + Send + 'static,
        T: Clone + Send + 'static,
        F: Fn(U) -> T + Send + Sync + 'static,
    {
        self.combine(actions, move |values| Ok(values.into_iter().map(&f).collect()))
    }

    /// All `actions` in one batch, folded into one value by `combine`.
    pub fn combine<B, T, F>(&self, actions: Vec<Action<B>>, combine: F) -> Action<T>
    where
        B: Clone + Send + 'static,
        T: Clone + Send + 'static,
        F: Fn(Vec<B>) -> Result<T> + Send + Sync + 'static,
    {
        Action::composite(
            actions,
            combine,
            self.pool.clone(),
            Arc::clone(&self.connector),
            Arc::clone(&self.executor),
        )
    }

    /// Open a connection and close it again.
    pub fn check_connection(&self) -> Result<()> {
        let conn: Arc<dyn Connection> = self.connector.open()?;
        conn.close()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("pool", &self.pool).finish()
    }
}
