//! Shared test support: a scripted in-memory database.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use sqlbridge_core::error::{ConnectorError, ConnectorResult};
use sqlbridge_core::value::{Row, SqlValue};
use sqlbridge_engine::{Database, DbEngine, PreparedQuery};

/// A [`Database`] fake driven by a queue of canned row sets.
///
/// Each `fetch` pops the next response and records the prepared query it
/// received. Mutations are recorded in a committed-statement log;
/// `fail_on` makes any statement containing the given substring fail,
/// which (under a transaction) leaves the log untouched.
pub struct FakeDatabase {
    engine: DbEngine,
    responses: Mutex<VecDeque<Vec<Row>>>,
    fetched: Mutex<Vec<PreparedQuery>>,
    committed: Mutex<Vec<PreparedQuery>>,
    fail_on: Mutex<Option<String>>,
}

impl FakeDatabase {
    pub fn new(engine: DbEngine) -> Self {
        Self {
            engine,
            responses: Mutex::new(VecDeque::new()),
            fetched: Mutex::new(Vec::new()),
            committed: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
        }
    }

    /// Queue a canned response for the next `fetch`.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.responses.lock().unwrap().push_back(rows);
    }

    /// Fail any mutation whose SQL contains `needle`.
    pub fn fail_on(&self, needle: &str) {
        *self.fail_on.lock().unwrap() = Some(needle.to_string());
    }

    /// Queries received by `fetch`, in order.
    pub fn fetched(&self) -> Vec<PreparedQuery> {
        self.fetched.lock().unwrap().clone()
    }

    /// Successfully committed mutation statements, in order.
    pub fn committed(&self) -> Vec<PreparedQuery> {
        self.committed.lock().unwrap().clone()
    }

    fn check_failure(&self, query: &PreparedQuery) -> ConnectorResult<()> {
        if let Some(needle) = self.fail_on.lock().unwrap().as_deref() {
            if query.sql.contains(needle) {
                return Err(ConnectorError::driver(format!(
                    "simulated failure on '{needle}'"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Database for FakeDatabase {
    fn engine(&self) -> DbEngine {
        self.engine
    }

    async fn fetch(&self, query: &PreparedQuery) -> ConnectorResult<Vec<Row>> {
        self.fetched.lock().unwrap().push(query.clone());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn execute(&self, query: &PreparedQuery) -> ConnectorResult<u64> {
        self.check_failure(query)?;
        self.committed.lock().unwrap().push(query.clone());
        Ok(1)
    }

    async fn execute_all(
        &self,
        queries: &[PreparedQuery],
        transactional: bool,
    ) -> ConnectorResult<()> {
        if transactional {
            // Stage everything; nothing lands unless every statement
            // succeeds.
            let mut staged = Vec::with_capacity(queries.len());
            for query in queries {
                self.check_failure(query)?;
                staged.push(query.clone());
            }
            self.committed.lock().unwrap().extend(staged);
        } else {
            for query in queries {
                self.check_failure(query)?;
                self.committed.lock().unwrap().push(query.clone());
            }
        }
        Ok(())
    }
}

/// Build a row from `(column, value)` pairs.
pub fn row(pairs: &[(&str, SqlValue)]) -> Row {
    Row::new(
        pairs.iter().map(|(c, _)| (*c).to_string()).collect(),
        pairs.iter().map(|(_, v)| v.clone()).collect(),
    )
}
