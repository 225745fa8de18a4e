//! DSN handling and engine selection.
//!
//! The leading URL scheme of the configured DSN selects the database
//! engine. DSN values may contain `${ENV_VAR}` tokens resolved from the
//! process environment before connecting.

use std::fmt;

use regex::Regex;
use url::Url;

use sqlbridge_core::config::Connection;
use sqlbridge_core::error::{ConnectorError, ConnectorResult};

const ENV_VAR_PATTERN: &str = r"\$\{([A-Za-z0-9_]+)\}";

/// Supported database engines.
///
/// Every engine participates in dialect rendering; the bundled driver
/// (see [`crate::any_db`]) covers MySQL, PostgreSQL, and SQLite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbEngine {
    MySql,
    PostgreSql,
    Sqlite,
    Mssql,
    Oracle,
}

impl DbEngine {
    /// Select an engine from a DSN scheme.
    #[must_use]
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_lowercase().as_str() {
            "mysql" => Some(DbEngine::MySql),
            "postgres" | "postgresql" => Some(DbEngine::PostgreSql),
            "sqlite" => Some(DbEngine::Sqlite),
            "mssql" => Some(DbEngine::Mssql),
            "oracle" => Some(DbEngine::Oracle),
            _ => None,
        }
    }

    /// Get the canonical scheme string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DbEngine::MySql => "mysql",
            DbEngine::PostgreSql => "postgres",
            DbEngine::Sqlite => "sqlite",
            DbEngine::Mssql => "mssql",
            DbEngine::Oracle => "oracle",
        }
    }
}

impl fmt::Display for DbEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Expand `${ENV_VAR}` tokens in a DSN from the process environment.
///
/// An unset variable is a configuration error; all missing variables are
/// reported together.
pub fn expand_env(dsn: &str) -> ConnectorResult<String> {
    let re = Regex::new(ENV_VAR_PATTERN)
        .map_err(|e| ConnectorError::config(format!("invalid env pattern: {e}")))?;

    let mut missing = Vec::new();
    let expanded = re.replace_all(dsn, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.push(name.to_string());
                caps[0].to_string()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConnectorError::config(format!(
            "environment variable(s) not set: {}",
            missing.join(", ")
        )));
    }

    Ok(expanded.into_owned())
}

/// Resolve a connection descriptor into a connect URL and its engine.
///
/// Expands environment tokens, selects the engine from the scheme, and
/// overlays the `user`/`password` fields when set.
pub fn resolve(connection: &Connection) -> ConnectorResult<(Url, DbEngine)> {
    let dsn = expand_env(&connection.dsn)?;

    let mut url = Url::parse(&dsn)
        .map_err(|e| ConnectorError::config(format!("invalid dsn: {e}")))?;

    let engine = DbEngine::from_scheme(url.scheme()).ok_or_else(|| {
        ConnectorError::config(format!("unsupported database scheme: {}", url.scheme()))
    })?;

    if !connection.user.is_empty() {
        url.set_username(&connection.user)
            .map_err(|()| ConnectorError::config("dsn does not accept a username"))?;
    }
    if !connection.password.is_empty() {
        url.set_password(Some(&connection.password))
            .map_err(|()| ConnectorError::config("dsn does not accept a password"))?;
    }

    Ok((url, engine))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(dsn: &str) -> Connection {
        Connection {
            dsn: dsn.to_string(),
            user: String::new(),
            password: String::new(),
        }
    }

    #[test]
    fn test_engine_from_scheme() {
        assert_eq!(DbEngine::from_scheme("mysql"), Some(DbEngine::MySql));
        assert_eq!(DbEngine::from_scheme("postgres"), Some(DbEngine::PostgreSql));
        assert_eq!(
            DbEngine::from_scheme("postgresql"),
            Some(DbEngine::PostgreSql)
        );
        assert_eq!(DbEngine::from_scheme("SQLITE"), Some(DbEngine::Sqlite));
        assert_eq!(DbEngine::from_scheme("mssql"), Some(DbEngine::Mssql));
        assert_eq!(DbEngine::from_scheme("oracle"), Some(DbEngine::Oracle));
        assert_eq!(DbEngine::from_scheme("mongodb"), None);
    }

    #[test]
    fn test_expand_env() {
        std::env::set_var("SQLBRIDGE_TEST_HOST", "db.internal");
        let out = expand_env("mysql://${SQLBRIDGE_TEST_HOST}:3306/hr").unwrap();
        assert_eq!(out, "mysql://db.internal:3306/hr");
    }

    #[test]
    fn test_expand_env_missing() {
        let err = expand_env("mysql://${SQLBRIDGE_TEST_UNSET_VAR}/hr").unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("SQLBRIDGE_TEST_UNSET_VAR"));
    }

    #[test]
    fn test_expand_env_no_tokens() {
        assert_eq!(
            expand_env("sqlite://app.db").unwrap(),
            "sqlite://app.db".to_string()
        );
    }

    #[test]
    fn test_resolve_unknown_scheme() {
        let err = resolve(&connection("mongodb://localhost/db")).unwrap_err();
        assert!(err.to_string().contains("unsupported database scheme"));
    }

    #[test]
    fn test_resolve_credential_overlay() {
        let conn = Connection {
            dsn: "postgres://host:5432/ident".to_string(),
            user: "sync".to_string(),
            password: "p@ss".to_string(),
        };
        let (url, engine) = resolve(&conn).unwrap();
        assert_eq!(engine, DbEngine::PostgreSql);
        assert_eq!(url.username(), "sync");
        assert_eq!(url.password(), Some("p%40ss"));
    }
}
