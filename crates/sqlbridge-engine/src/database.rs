//! The database seam.
//!
//! The engine is generic over a [`Database`] implementation: the bundled
//! sqlx-backed pool (see [`crate::any_db`]) or a caller-supplied driver
//! for engines the bundle does not cover. Implementations own connection
//! pooling and the transaction envelope so sqlx lifetimes never cross the
//! trait boundary.

use async_trait::async_trait;

use sqlbridge_core::error::ConnectorResult;
use sqlbridge_core::value::{Row, SqlValue};

use crate::dsn::DbEngine;

/// A rendered SQL statement with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    /// SQL text with dialect placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<SqlValue>,
}

impl PreparedQuery {
    /// A statement with no parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// A statement with parameters.
    #[must_use]
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Access to a relational backend.
///
/// Callers must not assume serial execution; one handle is shared by all
/// syncers and the underlying driver governs pooling.
#[async_trait]
pub trait Database: Send + Sync {
    /// The engine this handle talks to (drives placeholder dialect).
    fn engine(&self) -> DbEngine;

    /// Execute a statement and materialize its rows in result order.
    async fn fetch(&self, query: &PreparedQuery) -> ConnectorResult<Vec<Row>>;

    /// Execute a mutating statement, returning the affected-row count.
    async fn execute(&self, query: &PreparedQuery) -> ConnectorResult<u64>;

    /// Execute statements in order. With `transactional`, all of them run
    /// inside one transaction that commits only if every statement
    /// succeeds; on failure the transaction is rolled back and the error
    /// propagates. Without it, each statement runs on the raw connection.
    async fn execute_all(
        &self,
        queries: &[PreparedQuery],
        transactional: bool,
    ) -> ConnectorResult<()>;
}
