//! Bundled sqlx-backed [`Database`] implementation.
//!
//! Uses the sqlx `Any` driver, which covers MySQL, PostgreSQL, and
//! SQLite. MSSQL and Oracle are recognized for dialect rendering but have
//! no bundled driver; connecting to them returns a driver error directing
//! the caller to supply its own [`Database`] implementation.

use async_trait::async_trait;
use sqlx::any::{install_default_drivers, AnyPoolOptions, AnyRow};
use sqlx_core::any::AnyTypeInfoKind;
use sqlx::{AnyPool, Column, Row as SqlxRow};
use tracing::{debug, instrument, warn};

use sqlbridge_core::config::Connection;
use sqlbridge_core::error::{ConnectorError, ConnectorResult};
use sqlbridge_core::value::{Row, SqlValue};

use crate::database::{Database, PreparedQuery};
use crate::dsn::{self, DbEngine};

/// A pooled connection to one of the bundled engines.
pub struct AnyDatabase {
    pool: AnyPool,
    engine: DbEngine,
}

impl AnyDatabase {
    /// Connect using a configuration connection descriptor.
    ///
    /// Expands `${ENV_VAR}` tokens, selects the engine from the DSN
    /// scheme, and overlays configured credentials.
    pub async fn connect(connection: &Connection) -> ConnectorResult<Self> {
        let (url, engine) = dsn::resolve(connection)?;

        match engine {
            DbEngine::MySql | DbEngine::PostgreSql | DbEngine::Sqlite => {}
            DbEngine::Mssql | DbEngine::Oracle => {
                return Err(ConnectorError::driver(format!(
                    "no bundled driver for {engine}; supply a Database implementation"
                )));
            }
        }

        install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(8)
            .connect(url.as_str())
            .await
            .map_err(|e| ConnectorError::driver_with_source("failed to connect", e))?;

        debug!(engine = %engine, "database connection established");

        Ok(Self { pool, engine })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: AnyPool, engine: DbEngine) -> Self {
        Self { pool, engine }
    }
}

fn bind_query<'q>(
    query: &'q PreparedQuery,
) -> ConnectorResult<sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>> {
    let mut q = sqlx::query(query.sql.as_str());
    for param in &query.params {
        q = match param {
            SqlValue::Null => q.bind(Option::<String>::None),
            SqlValue::Bool(b) => q.bind(*b),
            SqlValue::Int(i) => q.bind(*i),
            SqlValue::Float(f) => q.bind(*f),
            SqlValue::Text(s) => q.bind(s.clone()),
            SqlValue::Bytes(_) => {
                return Err(ConnectorError::driver(
                    "binary parameters are not supported by the bundled driver",
                ))
            }
        };
    }
    Ok(q)
}

fn decode_row(row: &AnyRow) -> ConnectorResult<Row> {
    let mut columns = Vec::with_capacity(row.columns().len());
    let mut values = Vec::with_capacity(row.columns().len());

    for (i, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());

        let value = match column.type_info().kind() {
            AnyTypeInfoKind::Null => SqlValue::Null,
            AnyTypeInfoKind::Bool => row
                .try_get::<Option<bool>, _>(i)
                .map_err(|e| ConnectorError::driver_with_source("failed to decode column", e))?
                .map_or(SqlValue::Null, SqlValue::Bool),
            AnyTypeInfoKind::SmallInt => row
                .try_get::<Option<i16>, _>(i)
                .map_err(|e| ConnectorError::driver_with_source("failed to decode column", e))?
                .map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
            AnyTypeInfoKind::Integer => row
                .try_get::<Option<i32>, _>(i)
                .map_err(|e| ConnectorError::driver_with_source("failed to decode column", e))?
                .map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
            AnyTypeInfoKind::BigInt => row
                .try_get::<Option<i64>, _>(i)
                .map_err(|e| ConnectorError::driver_with_source("failed to decode column", e))?
                .map_or(SqlValue::Null, SqlValue::Int),
            AnyTypeInfoKind::Real => row
                .try_get::<Option<f32>, _>(i)
                .map_err(|e| ConnectorError::driver_with_source("failed to decode column", e))?
                .map_or(SqlValue::Null, |v| SqlValue::Float(f64::from(v))),
            AnyTypeInfoKind::Double => row
                .try_get::<Option<f64>, _>(i)
                .map_err(|e| ConnectorError::driver_with_source("failed to decode column", e))?
                .map_or(SqlValue::Null, SqlValue::Float),
            AnyTypeInfoKind::Blob => row
                .try_get::<Option<Vec<u8>>, _>(i)
                .map_err(|e| ConnectorError::driver_with_source("failed to decode column", e))?
                .map_or(SqlValue::Null, SqlValue::Bytes),
            _ => row
                .try_get::<Option<String>, _>(i)
                .map_err(|e| ConnectorError::driver_with_source("failed to decode column", e))?
                .map_or(SqlValue::Null, SqlValue::Text),
        };
        values.push(value);
    }

    Ok(Row::new(columns, values))
}

#[async_trait]
impl Database for AnyDatabase {
    fn engine(&self) -> DbEngine {
        self.engine
    }

    async fn fetch(&self, query: &PreparedQuery) -> ConnectorResult<Vec<Row>> {
        let rows = bind_query(query)?
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ConnectorError::driver_with_source("query failed", e))?;

        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, query: &PreparedQuery) -> ConnectorResult<u64> {
        let result = bind_query(query)?
            .execute(&self.pool)
            .await
            .map_err(|e| ConnectorError::driver_with_source("statement failed", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, queries), fields(count = queries.len(), transactional))]
    async fn execute_all(
        &self,
        queries: &[PreparedQuery],
        transactional: bool,
    ) -> ConnectorResult<()> {
        if !transactional {
            for query in queries {
                self.execute(query).await?;
            }
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ConnectorError::driver_with_source("failed to begin transaction", e))?;

        for query in queries {
            let result = bind_query(query)?.execute(&mut *tx).await;
            if let Err(e) = result {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                return Err(ConnectorError::driver_with_source("statement failed", e));
            }
        }

        tx.commit()
            .await
            .map_err(|e| ConnectorError::driver_with_source("failed to commit transaction", e))?;

        debug!("provisioning transaction committed");
        Ok(())
    }
}
