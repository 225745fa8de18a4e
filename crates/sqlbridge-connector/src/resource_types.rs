//! Resource-type registry.
//!
//! Exposes the configured resource types and the traits their list
//! mappings declare. A type with no list query cannot be introspected.

use sqlbridge_core::config::Config;
use sqlbridge_core::error::{ConnectorError, ConnectorResult};
use sqlbridge_core::types::{ResourceTrait, ResourceType};

fn extract_traits(config: &Config, rt_id: &str) -> ConnectorResult<Vec<ResourceTrait>> {
    let rt = config.resource_types.get(rt_id).ok_or_else(|| {
        ConnectorError::config(format!("resource type '{rt_id}' not found in config"))
    })?;

    let list = rt.list.as_ref().ok_or_else(|| {
        ConnectorError::config(format!("resource type '{rt_id}' has no listing defined"))
    })?;

    Ok(list
        .map
        .traits
        .as_ref()
        .map(|traits| traits.declared())
        .unwrap_or_default())
}

/// Get one configured resource type by id.
pub fn resource_type(config: &Config, rt_id: &str) -> ConnectorResult<ResourceType> {
    let traits = extract_traits(config, rt_id)?;

    let rt = config.resource_types.get(rt_id).ok_or_else(|| {
        ConnectorError::config(format!("resource type '{rt_id}' not found in config"))
    })?;

    Ok(ResourceType {
        id: rt_id.to_string(),
        display_name: rt.name.clone(),
        description: rt.description.clone(),
        traits,
    })
}

/// Get every configured resource type.
pub fn resource_types(config: &Config) -> ConnectorResult<Vec<ResourceType>> {
    let mut types = Vec::with_capacity(config.resource_types.len());
    for rt_id in config.resource_types.keys() {
        types.push(resource_type(config, rt_id)?);
    }
    // Config keys carry no meaningful order; keep output stable.
    types.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(types)
}
