//! # sqlbridge-expr
//!
//! The mapping expression environment. Configurations describe field
//! values as small side-effect-free expressions evaluated against the
//! current row (`cols`) and contextual identities (`resource`,
//! `principal`, `entitlement`). The environment is a sandboxed rhai
//! engine with the connector's domain functions pre-registered and a
//! leading-dot column shorthand expanded before compilation.

pub mod env;
pub mod functions;
pub mod preprocess;

pub use env::{dynamic_to_sql_value, sql_value_to_dynamic, ExprEnv, Inputs};
pub use preprocess::preprocess;
