//! Expression environment.
//!
//! Wraps a sandboxed rhai engine with the connector's variables and
//! domain functions pre-registered. The environment is built once per
//! process, is immutable afterwards, and is safe for concurrent
//! evaluation; each call compiles against a fresh scope built from its
//! inputs.

use rhai::{Blob, Dynamic, Engine, Map, Scope};

use sqlbridge_core::error::{ConnectorError, ConnectorResult};
use sqlbridge_core::types::{Entitlement, ResourceId};
use sqlbridge_core::value::{Row, SqlValue};

use crate::functions;
use crate::preprocess::preprocess;

const MAX_OPERATIONS: u64 = 100_000;
const MAX_CALL_DEPTH: usize = 64;
const MAX_STRING_SIZE: usize = 65_536;
const MAX_ARRAY_SIZE: usize = 10_000;
const MAX_MAP_SIZE: usize = 10_000;

/// Variable bindings for a single evaluation.
///
/// Always carries a `cols` map (possibly empty) so dotted-column
/// references never fail to resolve the variable itself. Resource,
/// principal, and entitlement maps are added per call site.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    cols: Map,
    resource: Option<Map>,
    principal: Option<Map>,
    entitlement: Option<Map>,
}

impl Inputs {
    /// Inputs with an empty `cols` map.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Inputs bound to a result row.
    #[must_use]
    pub fn from_row(row: &Row) -> Self {
        let mut cols = Map::new();
        for (name, value) in row.iter() {
            cols.insert(name.into(), sql_value_to_dynamic(value));
        }
        Self {
            cols,
            ..Self::default()
        }
    }

    /// Add the `resource` binding (`ID`, `ResourceTypeID`, `DisplayName`).
    #[must_use]
    pub fn with_resource(mut self, id: &ResourceId, display_name: &str) -> Self {
        self.resource = Some(identity_map(id, display_name));
        self
    }

    /// Add the `principal` binding (`ID`, `ResourceTypeID`, `DisplayName`).
    #[must_use]
    pub fn with_principal(mut self, id: &ResourceId, display_name: &str) -> Self {
        self.principal = Some(identity_map(id, display_name));
        self
    }

    /// Add the `entitlement` binding (`ID`, `DisplayName`, `Slug`,
    /// `ResourceID`, `ResourceTypeID`).
    #[must_use]
    pub fn with_entitlement(mut self, entitlement: &Entitlement) -> Self {
        let mut map = Map::new();
        map.insert("ID".into(), entitlement.id.clone().into());
        map.insert(
            "DisplayName".into(),
            entitlement.display_name.clone().into(),
        );
        map.insert("Slug".into(), entitlement.slug.clone().into());
        map.insert(
            "ResourceID".into(),
            entitlement.resource.resource.clone().into(),
        );
        map.insert(
            "ResourceTypeID".into(),
            entitlement.resource.resource_type.clone().into(),
        );
        self.entitlement = Some(map);
        self
    }

    fn to_scope(&self) -> Scope<'static> {
        let mut scope = Scope::new();
        scope.push_constant("cols", self.cols.clone());
        if let Some(resource) = &self.resource {
            scope.push_constant("resource", resource.clone());
        }
        if let Some(principal) = &self.principal {
            scope.push_constant("principal", principal.clone());
        }
        if let Some(entitlement) = &self.entitlement {
            scope.push_constant("entitlement", entitlement.clone());
        }
        scope
    }
}

fn identity_map(id: &ResourceId, display_name: &str) -> Map {
    let mut map = Map::new();
    map.insert("ID".into(), id.resource.clone().into());
    map.insert("ResourceTypeID".into(), id.resource_type.clone().into());
    map.insert("DisplayName".into(), display_name.to_string().into());
    map
}

/// The compiled-in expression environment.
pub struct ExprEnv {
    engine: Engine,
}

impl ExprEnv {
    /// Create the environment with sandbox limits and domain functions.
    #[must_use]
    pub fn new() -> Self {
        let mut engine = Engine::new();

        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_call_levels(MAX_CALL_DEPTH);
        engine.set_max_string_size(MAX_STRING_SIZE);
        engine.set_max_array_size(MAX_ARRAY_SIZE);
        engine.set_max_map_size(MAX_MAP_SIZE);
        engine.set_strict_variables(true);

        functions::register(&mut engine);

        Self { engine }
    }

    /// Compile and evaluate an expression against the given inputs.
    pub fn evaluate(&self, expr: &str, inputs: &Inputs) -> ConnectorResult<Dynamic> {
        let expr = preprocess(expr);
        let mut scope = inputs.to_scope();

        // Compile with the scope visible so strict-variables mode can
        // resolve the bound constants.
        let ast = self
            .engine
            .compile_with_scope(&scope, &expr)
            .map_err(|e| ConnectorError::compile(e.to_string()))?;

        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|e| ConnectorError::eval(e.to_string()))
    }

    /// Evaluate an expression and coerce the result to a string.
    ///
    /// Integers are decimal-formatted; a unit result (e.g. a missing
    /// column) is an evaluation error; anything else uses its default
    /// textual form.
    pub fn evaluate_string(&self, expr: &str, inputs: &Inputs) -> ConnectorResult<String> {
        let out = self.evaluate(expr, inputs)?;

        if out.is_unit() {
            return Err(ConnectorError::eval(format!(
                "expression '{expr}' produced no value"
            )));
        }
        if out.is_int() {
            if let Ok(i) = out.as_int() {
                return Ok(i.to_string());
            }
        }
        if out.is_string() {
            return out
                .into_string()
                .map_err(|t| ConnectorError::eval(format!("unexpected value type {t}")));
        }
        Ok(out.to_string())
    }

    /// Evaluate an expression and coerce the result to a boolean.
    ///
    /// Integers coerce to `x != 0`; strings parse the standard truth
    /// literals (`1/t/true`, `0/f/false`, case-insensitive).
    pub fn evaluate_bool(&self, expr: &str, inputs: &Inputs) -> ConnectorResult<bool> {
        let out = self.evaluate(expr, inputs)?;

        if let Ok(b) = out.as_bool() {
            return Ok(b);
        }
        if let Ok(i) = out.as_int() {
            return Ok(i != 0);
        }
        if out.is_string() {
            let s = out
                .into_string()
                .map_err(|t| ConnectorError::eval(format!("unexpected value type {t}")))?;
            return parse_bool_literal(&s)
                .ok_or_else(|| ConnectorError::type_error("bool", format!("string '{s}'")));
        }
        Err(ConnectorError::type_error("bool", out.type_name()))
    }
}

impl Default for ExprEnv {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool_literal(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Convert a raw SQL value into an expression value.
#[must_use]
pub fn sql_value_to_dynamic(value: &SqlValue) -> Dynamic {
    match value {
        SqlValue::Null => Dynamic::UNIT,
        SqlValue::Bool(b) => (*b).into(),
        SqlValue::Int(i) => (*i).into(),
        SqlValue::Float(f) => (*f).into(),
        SqlValue::Text(s) => s.clone().into(),
        SqlValue::Bytes(b) => Dynamic::from_blob(b.clone()),
    }
}

/// Convert an expression result into a bindable SQL value.
///
/// Compound results (arrays, maps) have no SQL representation and fail
/// with a type error.
pub fn dynamic_to_sql_value(value: &Dynamic) -> ConnectorResult<SqlValue> {
    if value.is_unit() {
        return Ok(SqlValue::Null);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(SqlValue::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Ok(SqlValue::Int(i));
    }
    if let Ok(f) = value.as_float() {
        return Ok(SqlValue::Float(f));
    }
    if let Ok(c) = value.as_char() {
        return Ok(SqlValue::Text(c.to_string()));
    }
    if value.is_string() {
        return value
            .clone()
            .into_string()
            .map(SqlValue::Text)
            .map_err(|t| ConnectorError::eval(format!("unexpected value type {t}")));
    }
    if let Some(blob) = value.clone().try_cast::<Blob>() {
        return Ok(SqlValue::Bytes(blob));
    }
    Err(ConnectorError::type_error(
        "scalar value",
        value.type_name(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, SqlValue)]) -> Row {
        Row::new(
            pairs.iter().map(|(c, _)| (*c).to_string()).collect(),
            pairs.iter().map(|(_, v)| v.clone()).collect(),
        )
    }

    #[test]
    fn test_evaluate_column_shorthand() {
        let env = ExprEnv::new();
        let inputs = Inputs::from_row(&row(&[("user_id", SqlValue::Int(42))]));
        let out = env.evaluate_string(".user_id", &inputs).unwrap();
        assert_eq!(out, "42");
    }

    #[test]
    fn test_evaluate_string_concat() {
        let env = ExprEnv::new();
        let inputs = Inputs::from_row(&row(&[
            ("first", SqlValue::Text("Ada".into())),
            ("last", SqlValue::Text("Lovelace".into())),
        ]));
        let out = env
            .evaluate_string(".first + \" \" + .last", &inputs)
            .unwrap();
        assert_eq!(out, "Ada Lovelace");
    }

    #[test]
    fn test_evaluate_domain_functions() {
        let env = ExprEnv::new();
        let inputs = Inputs::from_row(&row(&[("name", SqlValue::Text("ada".into()))]));
        assert_eq!(
            env.evaluate_string("toUpper(.name)", &inputs).unwrap(),
            "ADA"
        );
        assert_eq!(
            env.evaluate_string("titleCase(\"one fish\")", &inputs)
                .unwrap(),
            "One Fish"
        );
    }

    #[test]
    fn test_evaluate_php_array_indexing() {
        let env = ExprEnv::new();
        let inputs = Inputs::from_row(&row(&[(
            "role_names",
            SqlValue::Text("a:2:{i:0;s:5:\"admin\";i:1;s:4:\"user\";}".into()),
        )]));
        let out = env
            .evaluate_string("phpDeserializeStringArray(.role_names)[0]", &inputs)
            .unwrap();
        assert_eq!(out, "admin");
    }

    #[test]
    fn test_resource_binding() {
        let env = ExprEnv::new();
        let inputs = Inputs::empty().with_resource(
            &ResourceId::new("role", "administrator"),
            "Administrator",
        );
        let out = env
            .evaluate_string("resource.DisplayName + \" Role Member\"", &inputs)
            .unwrap();
        assert_eq!(out, "Administrator Role Member");
    }

    #[test]
    fn test_missing_variable_is_compile_error() {
        let env = ExprEnv::new();
        let err = env
            .evaluate_string("principal.ID", &Inputs::empty())
            .unwrap_err();
        assert_eq!(err.error_code(), "COMPILE_ERROR");
    }

    #[test]
    fn test_missing_column_fails() {
        let env = ExprEnv::new();
        let inputs = Inputs::from_row(&row(&[("present", SqlValue::Int(1))]));
        assert!(env.evaluate_string(".absent", &inputs).is_err());
    }

    #[test]
    fn test_syntax_error_is_compile_error() {
        let env = ExprEnv::new();
        let err = env
            .evaluate_string("toUpper(", &Inputs::empty())
            .unwrap_err();
        assert_eq!(err.error_code(), "COMPILE_ERROR");
    }

    #[test]
    fn test_evaluate_bool_coercions() {
        let env = ExprEnv::new();
        let inputs = Inputs::from_row(&row(&[
            ("flag_int", SqlValue::Int(2)),
            ("flag_zero", SqlValue::Int(0)),
            ("flag_text", SqlValue::Text("true".into())),
            ("flag_upper", SqlValue::Text("F".into())),
        ]));

        assert!(env.evaluate_bool(".flag_int", &inputs).unwrap());
        assert!(!env.evaluate_bool(".flag_zero", &inputs).unwrap());
        assert!(env.evaluate_bool(".flag_text", &inputs).unwrap());
        assert!(!env.evaluate_bool(".flag_upper", &inputs).unwrap());
        assert!(env.evaluate_bool("1 == 1", &inputs).unwrap());
    }

    #[test]
    fn test_evaluate_bool_type_error() {
        let env = ExprEnv::new();
        let inputs = Inputs::from_row(&row(&[(
            "name",
            SqlValue::Text("not a bool".into()),
        )]));
        let err = env.evaluate_bool(".name", &inputs).unwrap_err();
        assert_eq!(err.error_code(), "TYPE_ERROR");
    }

    #[test]
    fn test_null_column_is_unit() {
        let env = ExprEnv::new();
        let inputs = Inputs::from_row(&row(&[("gone", SqlValue::Null)]));
        let err = env.evaluate_string(".gone", &inputs).unwrap_err();
        assert_eq!(err.error_code(), "EVAL_ERROR");
    }

    #[test]
    fn test_dynamic_to_sql_value() {
        assert_eq!(
            dynamic_to_sql_value(&Dynamic::from(7i64)).unwrap(),
            SqlValue::Int(7)
        );
        assert_eq!(
            dynamic_to_sql_value(&Dynamic::from("x".to_string())).unwrap(),
            SqlValue::Text("x".into())
        );
        assert_eq!(
            dynamic_to_sql_value(&Dynamic::UNIT).unwrap(),
            SqlValue::Null
        );

        let arr: rhai::Array = vec![Dynamic::from(1i64)];
        let err = dynamic_to_sql_value(&Dynamic::from(arr)).unwrap_err();
        assert_eq!(err.error_code(), "TYPE_ERROR");
    }
}
