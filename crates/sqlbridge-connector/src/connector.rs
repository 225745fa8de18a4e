//! Connector assembly.
//!
//! A [`SqlConnector`] binds a validated configuration to a database
//! handle and a shared expression environment, and hands out one
//! [`SqlSyncer`] per configured resource type.

use std::sync::Arc;

use sqlbridge_core::config::Config;
use sqlbridge_core::error::{ConnectorError, ConnectorResult};
use sqlbridge_core::types::ResourceType;
use sqlbridge_engine::Database;
use sqlbridge_expr::ExprEnv;

use crate::resource_types;
use crate::syncer::SqlSyncer;

/// The assembled connector.
pub struct SqlConnector {
    config: Arc<Config>,
    db: Arc<dyn Database>,
    env: Arc<ExprEnv>,
}

impl SqlConnector {
    /// Create a connector from a configuration and a database handle.
    ///
    /// Validates the configuration and builds the shared expression
    /// environment.
    pub fn new(config: Config, db: Arc<dyn Database>) -> ConnectorResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            db,
            env: Arc::new(ExprEnv::new()),
        })
    }

    /// The configured application name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.config.app_name
    }

    /// The configured application description.
    #[must_use]
    pub fn app_description(&self) -> &str {
        &self.config.app_description
    }

    /// Every configured resource type.
    pub fn resource_types(&self) -> ConnectorResult<Vec<ResourceType>> {
        resource_types::resource_types(&self.config)
    }

    /// Build the syncer for one resource type.
    pub fn syncer(&self, rt_id: &str) -> ConnectorResult<SqlSyncer> {
        let resource_type = resource_types::resource_type(&self.config, rt_id)?;
        let rt_config = self
            .config
            .resource_types
            .get(rt_id)
            .ok_or_else(|| {
                ConnectorError::config(format!("resource type '{rt_id}' not found in config"))
            })?
            .clone();

        Ok(SqlSyncer::new(
            resource_type,
            rt_config,
            Arc::clone(&self.config),
            Arc::clone(&self.db),
            Arc::clone(&self.env),
        ))
    }

    /// Build syncers for every configured resource type.
    pub fn syncers(&self) -> ConnectorResult<Vec<SqlSyncer>> {
        let mut syncers = Vec::with_capacity(self.config.resource_types.len());
        for rt in self.resource_types()? {
            syncers.push(self.syncer(&rt.id)?);
        }
        Ok(syncers)
    }
}
