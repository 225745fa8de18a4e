//! Connector error types.
//!
//! Every failure surfaced by the runtime carries a machine-readable kind
//! (see [`ConnectorError::error_code`]) plus a human message. Row-level
//! failures abort the current call; partial results are never returned
//! alongside an error.

use thiserror::Error;

/// Error that can occur during connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Configuration is missing required fields or is otherwise invalid.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// A `?<...>` token in a SQL template was not recognized.
    #[error("template error: {message}")]
    Template { message: String },

    /// A mapping expression failed to compile.
    #[error("expression compile error: {message}")]
    Compile { message: String },

    /// A mapping expression failed during evaluation.
    #[error("expression evaluation error: {message}")]
    Eval { message: String },

    /// A value could not be coerced to the required output type.
    #[error("type error: expected {expected}, got {actual}")]
    Type { expected: String, actual: String },

    /// Pagination expected a column that the query did not return.
    #[error("primary key column '{column}' not found in query results")]
    MissingPrimaryKey { column: String },

    /// Error surfaced from the database layer.
    #[error("database error: {message}")]
    Driver {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Grant or revoke was invoked but provisioning is not configured.
    #[error("provisioning is not enabled for this entitlement")]
    ProvisioningDisabled,

    /// Provisioning is configured but has no queries for this operation.
    #[error("no {operation} queries configured for entitlement")]
    NoQueries { operation: String },

    /// The call was cancelled cooperatively.
    #[error("operation cancelled")]
    Cancelled,
}

impl ConnectorError {
    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::Config { .. } => "CONFIG_ERROR",
            ConnectorError::Template { .. } => "TEMPLATE_ERROR",
            ConnectorError::Compile { .. } => "COMPILE_ERROR",
            ConnectorError::Eval { .. } => "EVAL_ERROR",
            ConnectorError::Type { .. } => "TYPE_ERROR",
            ConnectorError::MissingPrimaryKey { .. } => "MISSING_PRIMARY_KEY",
            ConnectorError::Driver { .. } => "DRIVER_ERROR",
            ConnectorError::ProvisioningDisabled => "PROVISIONING_DISABLED",
            ConnectorError::NoQueries { .. } => "NO_QUERIES",
            ConnectorError::Cancelled => "CANCELLED",
        }
    }

    // Convenience constructors

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        ConnectorError::Config {
            message: message.into(),
        }
    }

    /// Create a template error.
    pub fn template(message: impl Into<String>) -> Self {
        ConnectorError::Template {
            message: message.into(),
        }
    }

    /// Create an expression compile error.
    pub fn compile(message: impl Into<String>) -> Self {
        ConnectorError::Compile {
            message: message.into(),
        }
    }

    /// Create an expression evaluation error.
    pub fn eval(message: impl Into<String>) -> Self {
        ConnectorError::Eval {
            message: message.into(),
        }
    }

    /// Create a type coercion error.
    pub fn type_error(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        ConnectorError::Type {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a database error.
    pub fn driver(message: impl Into<String>) -> Self {
        ConnectorError::Driver {
            message: message.into(),
            source: None,
        }
    }

    /// Create a database error with source.
    pub fn driver_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::Driver {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a missing-queries error for a provisioning operation.
    pub fn no_queries(operation: impl Into<String>) -> Self {
        ConnectorError::NoQueries {
            operation: operation.into(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ConnectorError::config("x").error_code(), "CONFIG_ERROR");
        assert_eq!(ConnectorError::template("x").error_code(), "TEMPLATE_ERROR");
        assert_eq!(ConnectorError::compile("x").error_code(), "COMPILE_ERROR");
        assert_eq!(ConnectorError::eval("x").error_code(), "EVAL_ERROR");
        assert_eq!(
            ConnectorError::type_error("bool", "map").error_code(),
            "TYPE_ERROR"
        );
        assert_eq!(
            ConnectorError::MissingPrimaryKey {
                column: "id".to_string()
            }
            .error_code(),
            "MISSING_PRIMARY_KEY"
        );
        assert_eq!(ConnectorError::driver("x").error_code(), "DRIVER_ERROR");
        assert_eq!(
            ConnectorError::ProvisioningDisabled.error_code(),
            "PROVISIONING_DISABLED"
        );
        assert_eq!(ConnectorError::no_queries("grant").error_code(), "NO_QUERIES");
        assert_eq!(ConnectorError::Cancelled.error_code(), "CANCELLED");
    }

    #[test]
    fn test_error_display() {
        let err = ConnectorError::MissingPrimaryKey {
            column: "row_id".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "primary key column 'row_id' not found in query results"
        );

        let err = ConnectorError::type_error("bool", "float");
        assert_eq!(err.to_string(), "type error: expected bool, got float");

        let err = ConnectorError::no_queries("revoke");
        assert_eq!(
            err.to_string(),
            "no revoke queries configured for entitlement"
        );
    }

    #[test]
    fn test_error_with_source() {
        let source_err = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err = ConnectorError::driver_with_source("query failed", source_err);

        if let ConnectorError::Driver { source, .. } = &err {
            assert!(source.is_some());
        } else {
            panic!("expected Driver variant");
        }
    }
}
