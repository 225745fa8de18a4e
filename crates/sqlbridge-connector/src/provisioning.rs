//! Provisioning executor.
//!
//! Grants and revokes run the operator-configured mutation statements
//! with per-call variables evaluated from the principal and entitlement
//! under operation. Unless `no_transaction` is set, all statements for
//! one call run inside a single transaction that rolls back on the first
//! failure.

use std::collections::HashMap;

use tracing::{debug, info};

use sqlbridge_core::config::{EntitlementProvisioning, ProvisioningQueries};
use sqlbridge_core::error::{ConnectorError, ConnectorResult};
use sqlbridge_core::types::{
    entitlement_key, split_entitlement_id, Annotation, Entitlement, Grant, Resource,
};
use sqlbridge_core::value::SqlValue;
use sqlbridge_engine::{template, PreparedQuery};
use sqlbridge_expr::{dynamic_to_sql_value, Inputs};

use crate::syncer::SqlSyncer;

impl SqlSyncer {
    /// Grant an entitlement to a principal.
    pub async fn grant(
        &self,
        principal: &Resource,
        entitlement: &Entitlement,
    ) -> ConnectorResult<Vec<Annotation>> {
        debug!(entitlement_id = %entitlement.id, "granting entitlement");

        let key = entitlement_key(&entitlement.id)?;
        let provisioning = self
            .provisioning_config(key)
            .ok_or(ConnectorError::ProvisioningDisabled)?;

        let queries = provisioning
            .grant
            .as_ref()
            .filter(|q| !q.queries.is_empty())
            .ok_or_else(|| ConnectorError::no_queries("grant"))?;

        let inputs = Inputs::empty()
            .with_principal(&principal.id, &principal.display_name)
            .with_entitlement(entitlement);
        let vars = self.provisioning_vars(&provisioning.vars, &inputs)?;

        self.run_provisioning(queries, &vars).await?;

        debug!(
            principal_id = %principal.id.resource,
            entitlement_id = %entitlement.id,
            "granted entitlement"
        );
        Ok(Vec::new())
    }

    /// Revoke an existing grant.
    pub async fn revoke(&self, grant: &Grant) -> ConnectorResult<Vec<Annotation>> {
        debug!(grant_id = %grant.id, "revoking grant");

        let (resource, key) = split_entitlement_id(&grant.entitlement_id)?;
        let provisioning = self
            .provisioning_config(key)
            .ok_or(ConnectorError::ProvisioningDisabled)?;

        let queries = provisioning
            .revoke
            .as_ref()
            .filter(|q| !q.queries.is_empty())
            .ok_or_else(|| ConnectorError::no_queries("revoke"))?;

        // A grant carries only identifiers, so the entitlement binding is
        // reconstructed from the opaque id.
        let entitlement = Entitlement {
            id: grant.entitlement_id.clone(),
            resource,
            display_name: String::new(),
            description: None,
            slug: key.to_string(),
            purpose: Default::default(),
            grantable_to: Vec::new(),
            annotations: Vec::new(),
        };

        let inputs = Inputs::empty()
            .with_principal(&grant.principal, "")
            .with_entitlement(&entitlement);
        let vars = self.provisioning_vars(&provisioning.vars, &inputs)?;

        self.run_provisioning(queries, &vars).await?;

        debug!(grant_id = %grant.id, "revoked grant");
        Ok(Vec::new())
    }

    /// Find the provisioning config for an entitlement-local key.
    ///
    /// Static entitlements match by id. Dynamic mappings are searched in
    /// order and the first one carrying provisioning wins regardless of
    /// its id; the match is logged so the ambiguity is observable.
    fn provisioning_config(&self, key: &str) -> Option<&EntitlementProvisioning> {
        for mapping in &self.rt_config.static_entitlements {
            if mapping.id != key {
                continue;
            }
            if let Some(provisioning) = &mapping.provisioning {
                info!(entitlement_id = %key, "provisioning is enabled for entitlement");
                return Some(provisioning);
            }
        }

        if let Some(entitlements) = &self.rt_config.entitlements {
            for mapping in &entitlements.map {
                if let Some(provisioning) = &mapping.provisioning {
                    info!(
                        requested = %key,
                        matched = %mapping.id,
                        "using first dynamic entitlement provisioning config"
                    );
                    return Some(provisioning);
                }
            }
        }

        None
    }

    fn provisioning_vars(
        &self,
        vars: &HashMap<String, String>,
        inputs: &Inputs,
    ) -> ConnectorResult<HashMap<String, SqlValue>> {
        let mut values = HashMap::with_capacity(vars.len());
        for (name, expr) in vars {
            let out = self.env.evaluate(expr, inputs)?;
            // Token keys are lowercased by the templater; match that here
            // so `?<var>` lookups resolve case-insensitively.
            values.insert(name.to_lowercase(), dynamic_to_sql_value(&out)?);
        }
        Ok(values)
    }

    async fn run_provisioning(
        &self,
        config: &ProvisioningQueries,
        vars: &HashMap<String, SqlValue>,
    ) -> ConnectorResult<()> {
        let mut prepared = Vec::with_capacity(config.queries.len());
        for query in &config.queries {
            let rendered = template::render(self.db.engine(), query, vars)?;
            prepared.push(PreparedQuery::with_params(rendered.sql, rendered.params));
        }

        self.db
            .execute_all(&prepared, !config.no_transaction)
            .await
    }
}
