//! Per-resource-type syncer.
//!
//! A [`SqlSyncer`] owns everything needed to serve one configured
//! resource type: the shared database handle, the shared expression
//! environment, and the type's slice of the configuration. Listing flows
//! through the engine's row runner; each row is bound into the
//! expression environment and mapped into a typed resource.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use sqlbridge_core::config::{
    Config, ListQuery, ResourceMapping, ResourceTypeConfig, UserTraitMapping,
};
use sqlbridge_core::error::ConnectorResult;
use sqlbridge_core::types::{
    AccountType, AppTraitData, Entitlement, Grant, GroupTraitData, Resource, ResourceId,
    ResourceType, RoleTraitData, TraitData, UserStatus, UserTraitData,
};
use sqlbridge_core::value::Row;
use sqlbridge_engine::{run_query, Database, PageToken};
use sqlbridge_expr::{ExprEnv, Inputs};

use crate::traits::{Page, Provisioner, ResourceSyncer};

/// Syncs one resource type from the configured SQL backend.
pub struct SqlSyncer {
    pub(crate) resource_type: ResourceType,
    pub(crate) rt_config: ResourceTypeConfig,
    pub(crate) config: Arc<Config>,
    pub(crate) db: Arc<dyn Database>,
    pub(crate) env: Arc<ExprEnv>,
}

impl SqlSyncer {
    pub(crate) fn new(
        resource_type: ResourceType,
        rt_config: ResourceTypeConfig,
        config: Arc<Config>,
        db: Arc<dyn Database>,
        env: Arc<ExprEnv>,
    ) -> Self {
        Self {
            resource_type,
            rt_config,
            config,
            db,
            env,
        }
    }

    /// The resource type this syncer serves.
    #[must_use]
    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    /// List one page of resources.
    ///
    /// `parent` is accepted for parity with the consumer contract;
    /// configured list queries are not parent-scoped.
    pub async fn list(
        &self,
        _parent: Option<&ResourceId>,
        token: &PageToken,
    ) -> ConnectorResult<Page<Resource>> {
        let Some(list) = &self.rt_config.list else {
            return Ok(Page::empty());
        };

        let mut items = Vec::new();
        let next = run_query(
            self.db.as_ref(),
            token,
            &list.query,
            list.pagination.as_ref(),
            |row| {
                items.push(self.map_resource(list, row)?);
                Ok(true)
            },
        )
        .await?;

        Ok(Page::new(items, next))
    }

    fn map_resource(&self, list: &ListQuery, row: &Row) -> ConnectorResult<Resource> {
        let mapping = &list.map;
        let inputs = Inputs::from_row(row);

        let id = self.env.evaluate_string(&mapping.id, &inputs)?;
        let display_name = self.env.evaluate_string(&mapping.display_name, &inputs)?;

        let description = match optional(&mapping.description) {
            Some(expr) => Some(self.env.evaluate_string(expr, &inputs)?),
            None => None,
        };

        let trait_data = self.map_traits(mapping, &inputs)?;

        let annotations = mapping
            .annotations
            .as_ref()
            .map(|a| a.to_annotations())
            .unwrap_or_default();

        Ok(Resource {
            id: ResourceId::new(self.resource_type.id.clone(), id),
            display_name,
            description,
            trait_data,
            annotations,
        })
    }

    /// Apply the single configured trait mapping, first populated wins.
    fn map_traits(
        &self,
        mapping: &ResourceMapping,
        inputs: &Inputs,
    ) -> ConnectorResult<Option<TraitData>> {
        let Some(traits) = &mapping.traits else {
            return Ok(None);
        };

        if let Some(user) = &traits.user {
            return Ok(Some(TraitData::User(self.map_user_trait(user, inputs)?)));
        }
        if let Some(group) = &traits.group {
            return Ok(Some(TraitData::Group(GroupTraitData {
                profile: self.map_profile(&group.profile, inputs)?,
            })));
        }
        if let Some(role) = &traits.role {
            return Ok(Some(TraitData::Role(RoleTraitData {
                profile: self.map_profile(&role.profile, inputs)?,
            })));
        }
        if let Some(app) = &traits.app {
            let help_url = match optional(&app.help_url) {
                Some(expr) => Some(self.env.evaluate_string(expr, inputs)?),
                None => None,
            };
            return Ok(Some(TraitData::App(AppTraitData {
                help_url,
                profile: self.map_profile(&app.profile, inputs)?,
            })));
        }

        Ok(None)
    }

    fn map_user_trait(
        &self,
        mapping: &UserTraitMapping,
        inputs: &Inputs,
    ) -> ConnectorResult<UserTraitData> {
        let mut data = UserTraitData::default();

        // The first configured email is the primary address.
        for (index, expr) in mapping.emails.iter().enumerate() {
            if expr.is_empty() {
                warn!(index, "missing email mapping for user trait");
                continue;
            }
            data.emails.push(self.env.evaluate_string(expr, inputs)?);
        }

        if let Some(expr) = optional(&mapping.status) {
            let value = self.env.evaluate_string(expr, inputs)?;
            data.status = match UserStatus::from_mapped_value(&value) {
                Some(status) => status,
                None => {
                    warn!(status = %value, "unexpected status value in mapping");
                    UserStatus::Unspecified
                }
            };
            if let Some(details_expr) = optional(&mapping.status_details) {
                data.status_details = Some(self.env.evaluate_string(details_expr, inputs)?);
            }
        }

        data.profile = self.map_profile(&mapping.profile, inputs)?;

        data.account_type = match optional(&mapping.account_type) {
            Some(expr) => {
                let value = self.env.evaluate_string(expr, inputs)?;
                match AccountType::from_mapped_value(&value) {
                    Some(account_type) => account_type,
                    None => {
                        warn!(account_type = %value, "unexpected account type in mapping, defaulting to human");
                        AccountType::Human
                    }
                }
            }
            None => AccountType::Human,
        };

        if let Some(expr) = optional(&mapping.login) {
            data.login = Some(self.env.evaluate_string(expr, inputs)?);
            for alias_expr in &mapping.login_aliases {
                let alias = self.env.evaluate_string(alias_expr, inputs)?;
                if !alias.is_empty() {
                    data.login_aliases.push(alias);
                }
            }
        }

        if let Some(expr) = optional(&mapping.last_login) {
            let value = self.env.evaluate_string(expr, inputs)?;
            match parse_timestamp(&value) {
                Some(ts) => data.last_login = Some(ts),
                None => warn!(last_login = %value, "could not parse last login timestamp"),
            }
        }

        if let Some(expr) = optional(&mapping.mfa_enabled) {
            data.mfa_enabled = Some(self.env.evaluate_bool(expr, inputs)?);
        }
        if let Some(expr) = optional(&mapping.sso_enabled) {
            data.sso_enabled = Some(self.env.evaluate_bool(expr, inputs)?);
        }

        Ok(data)
    }

    fn map_profile(
        &self,
        mappings: &HashMap<String, String>,
        inputs: &Inputs,
    ) -> ConnectorResult<HashMap<String, String>> {
        let mut profile = HashMap::with_capacity(mappings.len());
        for (key, expr) in mappings {
            profile.insert(key.clone(), self.env.evaluate_string(expr, inputs)?);
        }
        Ok(profile)
    }
}

/// Treat empty expression strings the same as absent ones.
pub(crate) fn optional(expr: &Option<String>) -> Option<&str> {
    expr.as_deref().filter(|e| !e.is_empty())
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl ResourceSyncer for SqlSyncer {
    fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    async fn list(
        &self,
        parent: Option<&ResourceId>,
        token: &PageToken,
    ) -> ConnectorResult<Page<Resource>> {
        SqlSyncer::list(self, parent, token).await
    }

    async fn entitlements(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<Page<Entitlement>> {
        SqlSyncer::entitlements(self, resource, token).await
    }

    async fn grants(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<Page<Grant>> {
        SqlSyncer::grants(self, resource, token).await
    }
}

#[async_trait]
impl Provisioner for SqlSyncer {
    async fn grant(
        &self,
        principal: &Resource,
        entitlement: &Entitlement,
    ) -> ConnectorResult<Vec<sqlbridge_core::types::Annotation>> {
        SqlSyncer::grant(self, principal, entitlement).await
    }

    async fn revoke(
        &self,
        grant: &Grant,
    ) -> ConnectorResult<Vec<sqlbridge_core::types::Annotation>> {
        SqlSyncer::revoke(self, grant).await
    }
}
