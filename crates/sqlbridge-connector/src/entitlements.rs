//! Entitlement mapping.
//!
//! A resource type's entitlements come from one of two places: a static
//! declaration list, or a dynamic list query. When static entitlements
//! are configured they win and the dynamic block is ignored.

use sqlbridge_core::config::EntitlementMapping;
use sqlbridge_core::error::ConnectorResult;
use sqlbridge_core::types::{entitlement_id, Annotation, Entitlement, Resource};
use sqlbridge_engine::{run_query, PageToken};
use sqlbridge_expr::Inputs;

use crate::syncer::{optional, SqlSyncer};
use crate::traits::Page;

impl SqlSyncer {
    /// List one page of entitlements for a resource.
    pub async fn entitlements(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<Page<Entitlement>> {
        if self.rt_config.skip_entitlements_and_grants {
            return Ok(Page::empty());
        }

        if !self.rt_config.static_entitlements.is_empty() {
            return self.static_entitlements(resource);
        }

        self.dynamic_entitlements(resource, token).await
    }

    /// Static entitlements are a single terminal page.
    fn static_entitlements(&self, resource: &Resource) -> ConnectorResult<Page<Entitlement>> {
        let inputs = Inputs::empty().with_resource(&resource.id, &resource.display_name);

        let mut items = Vec::new();
        for mapping in &self.rt_config.static_entitlements {
            if self.should_skip(mapping, &inputs)? {
                continue;
            }

            let display_name = self.env.evaluate_string(&mapping.display_name, &inputs)?;
            let description = match optional(&mapping.description) {
                Some(expr) => Some(self.env.evaluate_string(expr, &inputs)?),
                None => None,
            };

            // The slug defaults to the entitlement id when not set.
            let slug = match optional(&mapping.slug) {
                Some(slug) => slug.to_string(),
                None => mapping.id.clone(),
            };

            items.push(Entitlement {
                id: entitlement_id(&resource.id, &mapping.id),
                resource: resource.id.clone(),
                display_name,
                description,
                slug,
                purpose: mapping.purpose,
                grantable_to: Vec::new(),
                annotations: immutable_annotations(mapping),
            });
        }

        Ok(Page::new(items, String::new()))
    }

    async fn dynamic_entitlements(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<Page<Entitlement>> {
        let Some(query) = &self.rt_config.entitlements else {
            return Ok(Page::empty());
        };

        let mut items = Vec::new();
        let next = run_query(
            self.db.as_ref(),
            token,
            &query.query,
            query.pagination.as_ref(),
            |row| {
                let inputs =
                    Inputs::from_row(row).with_resource(&resource.id, &resource.display_name);

                for mapping in &query.map {
                    if self.should_skip(mapping, &inputs)? {
                        continue;
                    }

                    let key = self.env.evaluate_string(&mapping.id, &inputs)?;
                    let display_name =
                        self.env.evaluate_string(&mapping.display_name, &inputs)?;
                    let description = match optional(&mapping.description) {
                        Some(expr) => Some(self.env.evaluate_string(expr, &inputs)?),
                        None => None,
                    };
                    let slug = match optional(&mapping.slug) {
                        Some(expr) => self.env.evaluate_string(expr, &inputs)?,
                        None => key.clone(),
                    };

                    // Only configured resource types survive the filter.
                    let grantable_to = mapping
                        .grantable_to
                        .iter()
                        .filter(|rt| self.config.resource_types.contains_key(*rt))
                        .cloned()
                        .collect();

                    items.push(Entitlement {
                        id: entitlement_id(&resource.id, &key),
                        resource: resource.id.clone(),
                        display_name,
                        description,
                        slug,
                        purpose: mapping.purpose,
                        grantable_to,
                        annotations: immutable_annotations(mapping),
                    });
                }

                Ok(true)
            },
        )
        .await?;

        Ok(Page::new(items, next))
    }

    fn should_skip(&self, mapping: &EntitlementMapping, inputs: &Inputs) -> ConnectorResult<bool> {
        match optional(&mapping.skip_if) {
            Some(expr) => self.env.evaluate_bool(expr, inputs),
            None => Ok(false),
        }
    }
}

fn immutable_annotations(mapping: &EntitlementMapping) -> Vec<Annotation> {
    if mapping.immutable {
        vec![Annotation::EntitlementImmutable]
    } else {
        Vec::new()
    }
}
