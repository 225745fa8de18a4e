//! Connector configuration schema.
//!
//! The configuration document is a YAML mapping from resource-type ids to
//! the SQL queries, mapping expressions, and provisioning statements for
//! that type. The document is parsed once at startup and is read-only
//! afterwards.
//!
//! Only the current document revision is accepted: `static_entitlements`
//! is a list, `entitlements` is an object whose `map` is a list, and
//! `grants` is a list of query blocks. Older shapes fail to parse and are
//! reported as configuration errors with the offending path.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};
use crate::types::{Annotation, EntitlementPurpose, ResourceTrait};

/// Root connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name identifying the connector.
    pub app_name: String,

    /// Optional description of the application.
    #[serde(default)]
    pub app_description: String,

    /// Database connection settings.
    pub connect: Connection,

    /// Configured resource types, keyed by resource-type id.
    pub resource_types: HashMap<String, ResourceTypeConfig>,
}

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Connection string; may contain `${ENV_VAR}` tokens resolved from
    /// the process environment before connecting. The URL scheme selects
    /// the database engine.
    pub dsn: String,

    /// Username override. Only needed when the DSN cannot carry it
    /// (e.g. characters that would need URL encoding).
    #[serde(default)]
    pub user: String,

    /// Password override.
    #[serde(default)]
    pub password: String,
}

/// Configuration for a single resource type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTypeConfig {
    /// Display name for this resource type.
    pub name: String,

    /// Additional information about the resource type.
    #[serde(default)]
    pub description: String,

    /// Bypass entitlement and grant processing for this type.
    #[serde(default)]
    pub skip_entitlements_and_grants: bool,

    /// Query configuration for listing resources of this type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<ListQuery>,

    /// Dynamic entitlement query and mappings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitlements: Option<EntitlementsQuery>,

    /// Predefined entitlements that do not require a query. When present,
    /// these take precedence over the dynamic `entitlements` block.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_entitlements: Vec<EntitlementMapping>,

    /// Queries discovering existing grants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<GrantsQuery>,
}

/// A resource list query with its row mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListQuery {
    /// SQL statement fetching a page of resources.
    pub query: String,

    /// Pagination settings; absent means the query returns everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,

    /// Column-to-field mapping for each row.
    pub map: ResourceMapping,
}

/// Maps list-query rows to resource fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMapping {
    /// Expression producing the resource's unique identifier.
    pub id: String,

    /// Expression producing the resource's display name.
    pub display_name: String,

    /// Expression producing the resource description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Trait-specific mappings; at most one kind may be populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<TraitMappings>,

    /// Annotations attached to every mapped resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<AnnotationsConfig>,
}

/// Trait mappings per resource kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraitMappings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserTraitMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupTraitMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleTraitMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AppTraitMapping>,
}

impl TraitMappings {
    /// The trait kinds populated in this mapping, in declaration order.
    #[must_use]
    pub fn declared(&self) -> Vec<ResourceTrait> {
        let mut traits = Vec::new();
        if self.user.is_some() {
            traits.push(ResourceTrait::User);
        }
        if self.group.is_some() {
            traits.push(ResourceTrait::Group);
        }
        if self.role.is_some() {
            traits.push(ResourceTrait::Role);
        }
        if self.app.is_some() {
            traits.push(ResourceTrait::App);
        }
        traits
    }
}

/// Attribute mappings for user resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserTraitMapping {
    /// Email address expressions; index 0 becomes the primary address.
    #[serde(default)]
    pub emails: Vec<String>,

    /// Expression producing the account status. Recognized values:
    /// active/enabled, disabled/inactive/suspended/locked, deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Expression producing additional status detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<String>,

    /// Profile attribute expressions, keyed by profile field.
    #[serde(default)]
    pub profile: HashMap<String, String>,

    /// Expression producing the account type (user/human/service/system).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,

    /// Expression producing the primary login identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,

    /// Expressions producing alternative login identifiers.
    #[serde(default)]
    pub login_aliases: Vec<String>,

    /// Expression producing the last-login timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,

    /// Expression producing whether MFA is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_enabled: Option<String>,

    /// Expression producing whether SSO is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sso_enabled: Option<String>,
}

/// Attribute mappings for group resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupTraitMapping {
    /// Profile attribute expressions.
    #[serde(default)]
    pub profile: HashMap<String, String>,
}

/// Attribute mappings for role resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleTraitMapping {
    /// Profile attribute expressions.
    #[serde(default)]
    pub profile: HashMap<String, String>,
}

/// Attribute mappings for app resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppTraitMapping {
    /// Expression producing the application help URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,

    /// Profile attribute expressions.
    #[serde(default)]
    pub profile: HashMap<String, String>,
}

/// Pagination strategy for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationStrategy {
    /// Integer row-offset tokens.
    Offset,
    /// Last-seen primary-key tokens.
    Cursor,
}

/// How offset next-page tokens are computed.
///
/// `rows` treats the stored offset as a row count and advances it by one
/// page. `legacy_pages` reproduces the historical `offset * page_size +
/// page_size` formula for operators replaying tokens minted by older
/// deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OffsetTokenMode {
    #[default]
    Rows,
    LegacyPages,
}

/// Pagination settings for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    /// Pagination approach.
    pub strategy: PaginationStrategy,

    /// Column uniquely identifying a row. Required for cursor pagination;
    /// for cursor correctness the query must order by this column.
    #[serde(default)]
    pub primary_key: String,

    /// Offset next-token interpretation.
    #[serde(default)]
    pub offset_mode: OffsetTokenMode,
}

/// A dynamic entitlements query with its row mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementsQuery {
    /// SQL statement fetching entitlement rows.
    pub query: String,

    /// Pagination settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,

    /// Mappings applied to every row; each produces one entitlement
    /// unless its `skip_if` evaluates true.
    pub map: Vec<EntitlementMapping>,
}

/// Maps a row (or a static declaration) to an entitlement.
///
/// In `static_entitlements`, `id` and `slug` are literals while
/// `display_name` and `description` are expressions evaluated with the
/// resource in scope. In a dynamic `entitlements.map`, all four are
/// expressions evaluated against the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementMapping {
    /// Entitlement identifier.
    pub id: String,

    /// Human-readable name.
    pub display_name: String,

    /// Description of what the entitlement represents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Resource-type ids eligible to receive this entitlement.
    #[serde(default)]
    pub grantable_to: Vec<String>,

    /// Intended use of the entitlement.
    #[serde(default)]
    pub purpose: EntitlementPurpose,

    /// Short identifier. Defaults to `id` for static entitlements;
    /// required for dynamic mappings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    /// Mark the entitlement as immutable.
    #[serde(default)]
    pub immutable: bool,

    /// Boolean expression; when it evaluates true the mapping is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_if: Option<String>,

    /// Grant/revoke configuration for this entitlement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning: Option<EntitlementProvisioning>,
}

/// Provisioning configuration for an entitlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementProvisioning {
    /// Queries executed to grant the entitlement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<ProvisioningQueries>,

    /// Queries executed to revoke the entitlement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoke: Option<ProvisioningQueries>,

    /// Variables available to provisioning SQL, evaluated against the
    /// principal and entitlement under operation.
    #[serde(default)]
    pub vars: HashMap<String, String>,
}

/// Ordered mutation statements for one provisioning operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningQueries {
    /// Run the statements on the raw connection instead of inside a
    /// single transaction.
    #[serde(default)]
    pub no_transaction: bool,

    /// SQL statements executed in order.
    #[serde(default)]
    pub queries: Vec<String>,
}

/// A grants query with its row mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantsQuery {
    /// SQL statement fetching grant rows.
    pub query: String,

    /// Pagination settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,

    /// Row-to-grant mapping.
    pub map: GrantMapping,
}

/// Maps grant-query rows to grants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantMapping {
    /// Boolean expression; rows where it evaluates true are omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_if: Option<String>,

    /// Expression producing the principal's identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,

    /// Literal resource-type id of the principal (not an expression).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_type: Option<String>,

    /// Entitlement key the grant binds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitlement_id: Option<String>,

    /// Annotations attached to every mapped grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<AnnotationsConfig>,
}

/// Annotation configuration for resources and grants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationsConfig {
    /// Mark the object's entitlement as immutable.
    #[serde(default)]
    pub entitlement_immutable: bool,

    /// External URL related to the object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_link: Option<ExternalLinkConfig>,
}

/// An external link annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLinkConfig {
    /// Link target.
    pub url: String,
}

impl AnnotationsConfig {
    /// Convert to the annotations attached to emitted objects.
    #[must_use]
    pub fn to_annotations(&self) -> Vec<Annotation> {
        let mut annotations = Vec::new();
        if self.entitlement_immutable {
            annotations.push(Annotation::EntitlementImmutable);
        }
        if let Some(link) = &self.external_link {
            annotations.push(Annotation::ExternalLink {
                url: link.url.clone(),
            });
        }
        annotations
    }
}

impl Config {
    /// Parse a YAML configuration document.
    pub fn from_yaml(data: &str) -> ConnectorResult<Self> {
        let config: Config = serde_yaml::from_str(data)
            .map_err(|e| ConnectorError::config(format!("failed to parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> ConnectorResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            ConnectorError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&data)
    }

    /// Validate semantic invariants that the schema alone cannot express.
    pub fn validate(&self) -> ConnectorResult<()> {
        for (rt_id, rt) in &self.resource_types {
            if rt.name.is_empty() {
                return Err(ConnectorError::config(format!(
                    "resource type '{rt_id}': name is required"
                )));
            }

            if rt.list.is_none() && rt.static_entitlements.is_empty() {
                return Err(ConnectorError::config(format!(
                    "resource type '{rt_id}': at least one of 'list' or 'static_entitlements' must be defined"
                )));
            }

            if let Some(list) = &rt.list {
                if list.map.id.is_empty() {
                    return Err(ConnectorError::config(format!(
                        "resource type '{rt_id}': list.map.id is required"
                    )));
                }
                if list.map.display_name.is_empty() {
                    return Err(ConnectorError::config(format!(
                        "resource type '{rt_id}': list.map.display_name is required"
                    )));
                }
                if let Some(traits) = &list.map.traits {
                    let declared = traits.declared();
                    if declared.len() > 1 {
                        return Err(ConnectorError::config(format!(
                            "resource type '{rt_id}': only one trait mapping may be set, found {}",
                            declared
                                .iter()
                                .map(ResourceTrait::as_str)
                                .collect::<Vec<_>>()
                                .join(", ")
                        )));
                    }
                }
                validate_pagination(rt_id, "list", list.pagination.as_ref())?;
            }

            for (i, e) in rt.static_entitlements.iter().enumerate() {
                if e.id.is_empty() {
                    return Err(ConnectorError::config(format!(
                        "resource type '{rt_id}': static_entitlements[{i}].id is required"
                    )));
                }
                if e.display_name.is_empty() {
                    return Err(ConnectorError::config(format!(
                        "resource type '{rt_id}': static_entitlements[{i}].display_name is required"
                    )));
                }
            }

            if let Some(entitlements) = &rt.entitlements {
                if entitlements.map.is_empty() {
                    return Err(ConnectorError::config(format!(
                        "resource type '{rt_id}': entitlements.map must not be empty"
                    )));
                }
                for (i, m) in entitlements.map.iter().enumerate() {
                    if m.id.is_empty() || m.display_name.is_empty() {
                        return Err(ConnectorError::config(format!(
                            "resource type '{rt_id}': entitlements.map[{i}] requires id and display_name"
                        )));
                    }
                    if m.slug.as_deref().unwrap_or_default().is_empty() {
                        return Err(ConnectorError::config(format!(
                            "resource type '{rt_id}': entitlements.map[{i}].slug is required"
                        )));
                    }
                }
                validate_pagination(rt_id, "entitlements", entitlements.pagination.as_ref())?;
            }

            for (i, g) in rt.grants.iter().enumerate() {
                validate_pagination(rt_id, &format!("grants[{i}]"), g.pagination.as_ref())?;
            }
        }

        Ok(())
    }
}

fn validate_pagination(
    rt_id: &str,
    context: &str,
    pagination: Option<&Pagination>,
) -> ConnectorResult<()> {
    if let Some(p) = pagination {
        if p.strategy == PaginationStrategy::Cursor && p.primary_key.is_empty() {
            return Err(ConnectorError::config(format!(
                "resource type '{rt_id}': {context}.pagination.primary_key is required for cursor pagination"
            )));
        }
    }
    Ok(())
}
