//! Shared fixtures for integration tests.

#![allow(dead_code)]

use dbaction::models::query::{Query, Value};
use dbaction::models::table::Table;
use dbaction::services::connector::{Connection, Connector};
use dbaction::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters shared by a mock connector and every connection it opens.
#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    /// `(connection id, statement text)` in the order statements ran.
    pub statements: Mutex<Vec<(usize, String)>>,
}

impl Counters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Distinct connection ids statements ran on.
    pub fn connections_used(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.statements.lock().iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn statement_texts(&self) -> Vec<String> {
        self.statements.lock().iter().map(|(_, s)| s.clone()).collect()
    }
}

/// A connector whose connections answer every statement with a one-cell table
/// (column `value`) holding the statement text.
///
/// - text starting with `FAIL` fails with a statement error;
/// - an integer first argument makes the statement sleep that many ms first.
#[derive(Debug, Default, Clone)]
pub struct MockConnector {
    pub counters: Arc<Counters>,
    pub fail_open: bool,
    pub fail_close: bool,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Connector for MockConnector {
    fn open(&self) -> Result<Arc<dyn Connection>> {
        if self.fail_open {
            return Err(Error::connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )));
        }
        let id = self.counters.opens.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(MockConnection {
            id,
            counters: Arc::clone(&self.counters),
            fail_close: self.fail_close,
            closed: Mutex::new(false),
        }))
    }
}

pub struct MockConnection {
    id: usize,
    counters: Arc<Counters>,
    fail_close: bool,
    closed: Mutex<bool>,
}

impl MockConnection {
    fn run(&self, query: &Query) -> Result<Table> {
        if *self.closed.lock() {
            return Err(Error::other("connection is closed"));
        }
        if let Some(Value::Int(ms)) = query.args().first() {
            std::thread::sleep(Duration::from_millis(*ms as u64));
        }

        self.counters
            .statements
            .lock()
            .push((self.id, query.text().to_string()));

        if query.text().starts_with("FAIL") {
            return Err(Error::statement(
                query.text(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, "type mismatch"),
            ));
        }

        Table::new(
            vec!["value".to_string()],
            vec![vec![Some(query.text().to_string())]],
        )
    }
}

impl Connection for MockConnection {
    fn query(&self, query: &Query) -> Result<Table> {
        self.run(query)
    }

    fn execute(&self, query: &Query) -> Result<()> {
        self.run(query).map(|_| ())
    }

    fn commit(&self) -> Result<()> {
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut closed = self.closed.lock();
        if *closed {
            return Err(Error::other("already closed"));
        }
        *closed = true;
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(Error::connection(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "close failed",
            )));
        }
        Ok(())
    }
}
