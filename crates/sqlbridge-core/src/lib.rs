//! # sqlbridge-core
//!
//! Core building blocks for the sqlbridge connector runtime: the identity
//! object model (resources, entitlements, grants, trait payloads), the
//! declarative configuration schema, raw SQL value/row types, and the
//! connector error surface.
//!
//! Higher layers build on these: `sqlbridge-expr` evaluates the mapping
//! expressions referenced by the configuration, `sqlbridge-engine` runs
//! the templated queries, and `sqlbridge-connector` wires everything into
//! the syncer surface consumed by the upstream framework.

pub mod config;
pub mod error;
pub mod types;
pub mod value;

pub use config::Config;
pub use error::{ConnectorError, ConnectorResult};
pub use value::{Row, SqlValue};
