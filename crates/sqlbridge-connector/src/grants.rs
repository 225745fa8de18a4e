//! Grant mapping.
//!
//! Each grants-query row binds a principal to an entitlement on the
//! current resource. `principal_id` is an expression; `principal_type`
//! and `entitlement_id` are literals from the configuration.

use tracing::warn;

use sqlbridge_core::config::GrantMapping;
use sqlbridge_core::error::{ConnectorError, ConnectorResult};
use sqlbridge_core::types::{entitlement_id, Grant, Resource, ResourceId};
use sqlbridge_core::value::Row;
use sqlbridge_engine::{run_query, PageToken};
use sqlbridge_expr::Inputs;

use crate::syncer::{optional, SqlSyncer};
use crate::traits::Page;

impl SqlSyncer {
    /// List one page of grants for a resource.
    pub async fn grants(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<Page<Grant>> {
        if self.rt_config.skip_entitlements_and_grants {
            return Ok(Page::empty());
        }

        let Some(grants_query) = self.rt_config.grants.first() else {
            return Ok(Page::empty());
        };

        // TODO: traversing more than one grants query needs the page
        // token to carry a query index; until then only the first block
        // is processed.
        if self.rt_config.grants.len() > 1 {
            warn!(
                resource_type = %self.resource_type.id,
                configured = self.rt_config.grants.len(),
                "only the first grants query is processed"
            );
        }

        let mut items = Vec::new();
        let next = run_query(
            self.db.as_ref(),
            token,
            &grants_query.query,
            grants_query.pagination.as_ref(),
            |row| {
                if let Some(grant) = self.map_grant(resource, &grants_query.map, row)? {
                    items.push(grant);
                }
                Ok(true)
            },
        )
        .await?;

        Ok(Page::new(items, next))
    }

    fn map_grant(
        &self,
        resource: &Resource,
        mapping: &GrantMapping,
        row: &Row,
    ) -> ConnectorResult<Option<Grant>> {
        let principal_id_expr = optional(&mapping.principal_id)
            .ok_or_else(|| ConnectorError::config("missing principal_id mapping"))?;
        let principal_type = optional(&mapping.principal_type)
            .ok_or_else(|| ConnectorError::config("missing principal_type mapping"))?;
        let entitlement_key = optional(&mapping.entitlement_id)
            .ok_or_else(|| ConnectorError::config("missing entitlement_id mapping"))?;

        let inputs = Inputs::from_row(row).with_resource(&resource.id, &resource.display_name);

        if let Some(expr) = optional(&mapping.skip_if) {
            if self.env.evaluate_bool(expr, &inputs)? {
                return Ok(None);
            }
        }

        let principal_id = self.env.evaluate_string(principal_id_expr, &inputs)?;
        let principal = ResourceId::new(principal_type, principal_id);

        let mut grant = Grant::new(entitlement_id(&resource.id, entitlement_key), principal);
        if let Some(annotations) = &mapping.annotations {
            grant.annotations = annotations.to_annotations();
        }

        Ok(Some(grant))
    }
}
