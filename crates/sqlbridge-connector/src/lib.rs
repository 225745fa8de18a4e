//! # sqlbridge-connector
//!
//! The declarative SQL-to-identity connector runtime. An operator
//! authors a configuration document describing, per resource type, the
//! SQL that enumerates entities, entitlements, and grants, the
//! column-to-field mapping expressions, and optional provisioning
//! statements. This crate turns that configuration into a streaming,
//! paginated traversal of the relational backend, emitting typed
//! identity objects and executing provisioning statements on demand.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sqlbridge_connector::SqlConnector;
//! use sqlbridge_core::Config;
//! use sqlbridge_engine::{AnyDatabase, PageToken};
//!
//! let config = Config::from_file("connector.yaml")?;
//! let db = Arc::new(AnyDatabase::connect(&config.connect).await?);
//! let connector = SqlConnector::new(config, db)?;
//!
//! for syncer in connector.syncers()? {
//!     let page = syncer.list(None, &PageToken::start(100)).await?;
//!     for resource in &page.items {
//!         println!("{}", resource.display_name);
//!     }
//! }
//! ```

pub mod connector;
mod entitlements;
mod grants;
mod provisioning;
pub mod resource_types;
pub mod syncer;
pub mod traits;

pub use connector::SqlConnector;
pub use syncer::SqlSyncer;
pub use traits::{Page, Provisioner, ResourceSyncer};
