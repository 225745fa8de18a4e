//! SQL query templating.
//!
//! Configured SQL is opaque to the engine except for tokens of the form
//! `?<key>` or `?<key|unquoted>`. Each recognized token either binds a
//! parameter using the engine's placeholder dialect or, with `unquoted`,
//! substitutes the value literally into the SQL text (for positions where
//! binding is not possible, e.g. `LIMIT` on some configurations).

use std::collections::HashMap;

use regex::Regex;

use sqlbridge_core::error::{ConnectorError, ConnectorResult};
use sqlbridge_core::value::SqlValue;

use crate::dsn::DbEngine;

const TOKEN_PATTERN: &str = r"\?<([A-Za-z0-9_|]*)>";

/// Result of rendering a templated query.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    /// SQL with tokens replaced by placeholders or literals.
    pub sql: String,
    /// Bound parameters in placeholder order.
    pub params: Vec<SqlValue>,
    /// Whether any token was recognized. A paginated call whose query
    /// binds nothing downgrades to an unpaginated traversal.
    pub bound: bool,
}

#[derive(Debug, PartialEq)]
struct Token {
    key: String,
    unquoted: bool,
}

fn parse_token(inner: &str) -> ConnectorResult<Token> {
    let mut parts = inner.split('|');
    let key = parts.next().unwrap_or_default().to_lowercase();
    if key.is_empty() {
        return Err(ConnectorError::template(format!(
            "invalid token ?<{inner}>"
        )));
    }

    let mut unquoted = false;
    for opt in parts {
        match opt.to_lowercase().as_str() {
            "unquoted" => unquoted = true,
            _ => {
                return Err(ConnectorError::template(format!(
                    "unknown option '{opt}' in token ?<{inner}>"
                )))
            }
        }
    }

    Ok(Token { key, unquoted })
}

/// Get the next positional placeholder for an engine.
fn placeholder(engine: DbEngine, index: usize) -> String {
    match engine {
        DbEngine::MySql | DbEngine::Sqlite => "?".to_string(),
        DbEngine::PostgreSql => format!("${index}"),
        DbEngine::Mssql => format!("@p{index}"),
        DbEngine::Oracle => format!(":{index}"),
    }
}

/// Render a templated query against a binding map.
///
/// Token keys are case-insensitive and looked up in `values` (lowercase
/// keys). A token whose key is absent from the map is a template error.
pub fn render(
    engine: DbEngine,
    query: &str,
    values: &HashMap<String, SqlValue>,
) -> ConnectorResult<RenderedQuery> {
    let re = Regex::new(TOKEN_PATTERN)
        .map_err(|e| ConnectorError::template(format!("invalid token pattern: {e}")))?;

    let mut sql = String::with_capacity(query.len());
    let mut params = Vec::new();
    let mut bound = false;
    let mut cursor = 0;

    for caps in re.captures_iter(query) {
        let m = caps
            .get(0)
            .ok_or_else(|| ConnectorError::template("token match without range"))?;
        sql.push_str(&query[cursor..m.start()]);
        cursor = m.end();

        let token = parse_token(&caps[1])?;
        let value = values.get(&token.key).ok_or_else(|| {
            ConnectorError::template(format!("unknown token ?<{}>", &caps[1]))
        })?;

        if token.unquoted {
            sql.push_str(&value.to_string());
        } else {
            params.push(value.clone());
            sql.push_str(&placeholder(engine, params.len()));
        }
        bound = true;
    }
    sql.push_str(&query[cursor..]);

    Ok(RenderedQuery { sql, params, bound })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> HashMap<String, SqlValue> {
        HashMap::from([
            ("limit".to_string(), SqlValue::Int(11)),
            ("offset".to_string(), SqlValue::Int(123)),
            ("cursor".to_string(), SqlValue::Text("abc123".into())),
        ])
    }

    #[test]
    fn test_no_tokens_unchanged() {
        let out = render(DbEngine::MySql, "SELECT * FROM table", &bindings()).unwrap();
        assert_eq!(out.sql, "SELECT * FROM table");
        assert!(out.params.is_empty());
        assert!(!out.bound);
    }

    #[test]
    fn test_mysql_limit() {
        let out = render(
            DbEngine::MySql,
            "SELECT * FROM table LIMIT ?<limit>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table LIMIT ?");
        assert_eq!(out.params, vec![SqlValue::Int(11)]);
        assert!(out.bound);
    }

    #[test]
    fn test_uppercase_key() {
        let out = render(
            DbEngine::MySql,
            "SELECT * FROM table LIMIT ?<LIMIT>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table LIMIT ?");
        assert_eq!(out.params, vec![SqlValue::Int(11)]);
    }

    #[test]
    fn test_mysql_limit_offset() {
        let out = render(
            DbEngine::MySql,
            "SELECT * FROM table LIMIT ?<LIMIT> OFFSET ?<OFFSET>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table LIMIT ? OFFSET ?");
        assert_eq!(out.params, vec![SqlValue::Int(11), SqlValue::Int(123)]);
    }

    #[test]
    fn test_postgres_placeholders() {
        let out = render(
            DbEngine::PostgreSql,
            "SELECT * FROM table LIMIT ?<LIMIT> OFFSET ?<OFFSET>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table LIMIT $1 OFFSET $2");
        assert_eq!(out.params, vec![SqlValue::Int(11), SqlValue::Int(123)]);
    }

    #[test]
    fn test_sqlite_placeholders() {
        let out = render(
            DbEngine::Sqlite,
            "SELECT * FROM table LIMIT ?<LIMIT> OFFSET ?<OFFSET>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table LIMIT ? OFFSET ?");
    }

    #[test]
    fn test_mssql_placeholders() {
        let out = render(
            DbEngine::Mssql,
            "SELECT * FROM table LIMIT ?<LIMIT> OFFSET ?<OFFSET>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table LIMIT @p1 OFFSET @p2");
    }

    #[test]
    fn test_oracle_placeholders() {
        let out = render(
            DbEngine::Oracle,
            "SELECT * FROM table LIMIT ?<LIMIT> OFFSET ?<OFFSET>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table LIMIT :1 OFFSET :2");
    }

    #[test]
    fn test_unknown_token() {
        let err = render(
            DbEngine::MySql,
            "SELECT * FROM ?<badToken> LIMIT ?<LIMIT>",
            &bindings(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "TEMPLATE_ERROR");
        assert!(err.to_string().contains("badToken"));
    }

    #[test]
    fn test_unquoted_limit() {
        let out = render(
            DbEngine::MySql,
            "SELECT * FROM table LIMIT ?<limit|unquoted>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table LIMIT 11");
        assert!(out.params.is_empty());
        assert!(out.bound);
    }

    #[test]
    fn test_unquoted_offset() {
        let out = render(
            DbEngine::MySql,
            "SELECT * FROM table OFFSET ?<offset|unquoted>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table OFFSET 123");
        assert!(out.params.is_empty());
    }

    #[test]
    fn test_unquoted_cursor() {
        let out = render(
            DbEngine::MySql,
            "SELECT * FROM table WHERE id > ?<cursor|unquoted>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table WHERE id > abc123");
    }

    #[test]
    fn test_mixed_quoted_and_unquoted() {
        let out = render(
            DbEngine::MySql,
            "SELECT * FROM table WHERE id > ?<cursor> LIMIT ?<limit|unquoted>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table WHERE id > ? LIMIT 11");
        assert_eq!(out.params, vec![SqlValue::Text("abc123".into())]);
    }

    #[test]
    fn test_uppercase_unquoted_option() {
        let out = render(
            DbEngine::MySql,
            "SELECT * FROM table LIMIT ?<LIMIT|UNQUOTED>",
            &bindings(),
        )
        .unwrap();
        assert_eq!(out.sql, "SELECT * FROM table LIMIT 11");
    }

    #[test]
    fn test_invalid_option() {
        let err = render(
            DbEngine::MySql,
            "SELECT * FROM table LIMIT ?<limit|invalid>",
            &bindings(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "TEMPLATE_ERROR");
    }

    #[test]
    fn test_empty_option() {
        let err = render(
            DbEngine::MySql,
            "SELECT * FROM table LIMIT ?<limit|>",
            &bindings(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "TEMPLATE_ERROR");
    }

    #[test]
    fn test_empty_token() {
        let err = render(DbEngine::MySql, "SELECT ?<>", &bindings()).unwrap_err();
        assert_eq!(err.error_code(), "TEMPLATE_ERROR");
    }

    #[test]
    fn test_provisioning_vars() {
        let vars = HashMap::from([
            ("user_id".to_string(), SqlValue::Text("42".into())),
            ("role_id".to_string(), SqlValue::Int(7)),
        ]);
        let out = render(
            DbEngine::PostgreSql,
            "INSERT INTO user_roles (user_id, role_id) VALUES (?<user_id>, ?<role_id>)",
            &vars,
        )
        .unwrap();
        assert_eq!(
            out.sql,
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)"
        );
        assert_eq!(
            out.params,
            vec![SqlValue::Text("42".into()), SqlValue::Int(7)]
        );
    }
}
