//! Identity object model.
//!
//! The typed objects emitted by a sync: resources, entitlements, and
//! grants, plus the trait payloads that can be attached to a resource.
//! These mirror the upstream identity-protocol objects; the runtime only
//! constructs them, it never consumes them.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, ConnectorResult};

/// Identifies a single resource: `(resource_type_id, resource id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    /// The configured resource-type id (e.g. `user`, `role`).
    pub resource_type: String,
    /// The resource's unique identifier within its type.
    pub resource: String,
}

impl ResourceId {
    /// Create a resource id.
    pub fn new(resource_type: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource)
    }
}

/// The trait kinds a resource type can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceTrait {
    /// User resources (people and service accounts).
    User,
    /// Group resources.
    Group,
    /// Role resources.
    Role,
    /// Application resources.
    App,
}

impl ResourceTrait {
    /// Get the string representation used in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceTrait::User => "user",
            ResourceTrait::Group => "group",
            ResourceTrait::Role => "role",
            ResourceTrait::App => "app",
        }
    }
}

impl fmt::Display for ResourceTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A configured resource type, as exposed to consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceType {
    /// Resource-type id (the key in the configuration document).
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Optional description.
    #[serde(default)]
    pub description: String,
    /// Traits declared by the type's list mapping.
    #[serde(default)]
    pub traits: Vec<ResourceTrait>,
}

/// Enumerated user status, mapped from the configured status expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Account is usable.
    Enabled,
    /// Account exists but cannot be used.
    Disabled,
    /// Account has been deleted in the source system.
    Deleted,
    /// Status could not be determined from the mapped value.
    #[default]
    Unspecified,
}

impl UserStatus {
    /// Map a raw status string from the closed configuration set.
    ///
    /// Returns `None` for values outside the set; callers decide how to
    /// degrade (the resource mapper warns and emits `Unspecified`).
    #[must_use]
    pub fn from_mapped_value(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "active" | "enabled" => Some(UserStatus::Enabled),
            "disabled" | "inactive" | "suspended" | "locked" => Some(UserStatus::Disabled),
            "deleted" => Some(UserStatus::Deleted),
            _ => None,
        }
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Enabled => "enabled",
            UserStatus::Disabled => "disabled",
            UserStatus::Deleted => "deleted",
            UserStatus::Unspecified => "unspecified",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Enumerated account type for user resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// A person.
    #[default]
    Human,
    /// A service account.
    Service,
    /// A system account.
    System,
}

impl AccountType {
    /// Map a raw account-type string from the closed configuration set.
    ///
    /// `user` and `human` both mean [`AccountType::Human`]. Returns `None`
    /// for values outside the set.
    #[must_use]
    pub fn from_mapped_value(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "user" | "human" => Some(AccountType::Human),
            "service" => Some(AccountType::Service),
            "system" => Some(AccountType::System),
            _ => None,
        }
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Human => "human",
            AccountType::Service => "service",
            AccountType::System => "system",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User trait payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserTraitData {
    /// Email addresses; index 0 is the primary address.
    pub emails: Vec<String>,
    /// Mapped account status.
    pub status: UserStatus,
    /// Optional free-form status detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<String>,
    /// Profile attributes.
    #[serde(default)]
    pub profile: HashMap<String, String>,
    /// Account type; defaults to human when unmapped.
    #[serde(default)]
    pub account_type: AccountType,
    /// Primary login identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Alternative login identifiers (empty values filtered out).
    #[serde(default)]
    pub login_aliases: Vec<String>,
    /// Time of last login, when the source exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    /// Whether multi-factor authentication is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_enabled: Option<bool>,
    /// Whether single sign-on is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sso_enabled: Option<bool>,
}

/// Group trait payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupTraitData {
    /// Profile attributes.
    #[serde(default)]
    pub profile: HashMap<String, String>,
}

/// Role trait payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleTraitData {
    /// Profile attributes.
    #[serde(default)]
    pub profile: HashMap<String, String>,
}

/// App trait payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppTraitData {
    /// Link to help documentation for the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
    /// Profile attributes.
    #[serde(default)]
    pub profile: HashMap<String, String>,
}

/// The single trait payload attached to a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraitData {
    User(UserTraitData),
    Group(GroupTraitData),
    Role(RoleTraitData),
    App(AppTraitData),
}

impl TraitData {
    /// The trait kind of this payload.
    #[must_use]
    pub fn kind(&self) -> ResourceTrait {
        match self {
            TraitData::User(_) => ResourceTrait::User,
            TraitData::Group(_) => ResourceTrait::Group,
            TraitData::Role(_) => ResourceTrait::Role,
            TraitData::App(_) => ResourceTrait::App,
        }
    }
}

/// Extra metadata attached to emitted objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    /// Marks an entitlement as immutable (cannot be granted or revoked).
    EntitlementImmutable,
    /// An external URL related to the object.
    ExternalLink { url: String },
}

/// An identity-bearing entity produced by a list query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Resource identity.
    pub id: ResourceId,
    /// Human-readable name.
    pub display_name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The single trait payload, when the type declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trait_data: Option<TraitData>,
    /// Attached annotations.
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// Intended use of an entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementPurpose {
    /// Membership-style entitlement.
    Assignment,
    /// Permission-style entitlement.
    Permission,
    /// No declared purpose.
    #[default]
    Unspecified,
}

impl EntitlementPurpose {
    /// Get the string representation used in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementPurpose::Assignment => "assignment",
            EntitlementPurpose::Permission => "permission",
            EntitlementPurpose::Unspecified => "unspecified",
        }
    }
}

/// A grantable capability scoped to a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    /// Opaque entitlement id: `resource_type:resource:key`.
    pub id: String,
    /// The resource the entitlement is scoped to.
    pub resource: ResourceId,
    /// Human-readable name.
    pub display_name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Short identifier.
    pub slug: String,
    /// Declared purpose.
    #[serde(default)]
    pub purpose: EntitlementPurpose,
    /// Resource-type ids eligible to receive this entitlement.
    #[serde(default)]
    pub grantable_to: Vec<String>,
    /// Attached annotations.
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// Compose the opaque entitlement id for an entitlement key on a resource.
#[must_use]
pub fn entitlement_id(resource: &ResourceId, key: &str) -> String {
    format!("{}:{}:{}", resource.resource_type, resource.resource, key)
}

/// Split an opaque entitlement id into its scoping resource and
/// entitlement-local key.
pub fn split_entitlement_id(id: &str) -> ConnectorResult<(ResourceId, &str)> {
    let parts: Vec<&str> = id.splitn(3, ':').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(ConnectorError::config(format!(
            "malformed entitlement id '{id}'"
        )));
    }
    Ok((ResourceId::new(parts[0], parts[1]), parts[2]))
}

/// Extract the entitlement-local key (last segment) from an opaque
/// entitlement id.
pub fn entitlement_key(id: &str) -> ConnectorResult<&str> {
    split_entitlement_id(id).map(|(_, key)| key)
}

/// An association binding a principal to an entitlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    /// Opaque grant id: `entitlement_id:principal_type:principal_id`.
    pub id: String,
    /// The opaque id of the granted entitlement.
    pub entitlement_id: String,
    /// The principal holding the grant.
    pub principal: ResourceId,
    /// Attached annotations.
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Grant {
    /// Create a grant, deriving its opaque id.
    #[must_use]
    pub fn new(entitlement_id: String, principal: ResourceId) -> Self {
        let id = format!(
            "{}:{}:{}",
            entitlement_id, principal.resource_type, principal.resource
        );
        Self {
            id,
            entitlement_id,
            principal,
            annotations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_status_closed_set() {
        for v in ["active", "enabled", "ACTIVE", "Enabled"] {
            assert_eq!(UserStatus::from_mapped_value(v), Some(UserStatus::Enabled));
        }
        for v in ["disabled", "inactive", "suspended", "locked", "LOCKED"] {
            assert_eq!(UserStatus::from_mapped_value(v), Some(UserStatus::Disabled));
        }
        assert_eq!(
            UserStatus::from_mapped_value("deleted"),
            Some(UserStatus::Deleted)
        );
        assert_eq!(UserStatus::from_mapped_value("banana"), None);
    }

    #[test]
    fn test_account_type_closed_set() {
        assert_eq!(
            AccountType::from_mapped_value("user"),
            Some(AccountType::Human)
        );
        assert_eq!(
            AccountType::from_mapped_value("HUMAN"),
            Some(AccountType::Human)
        );
        assert_eq!(
            AccountType::from_mapped_value("service"),
            Some(AccountType::Service)
        );
        assert_eq!(
            AccountType::from_mapped_value("system"),
            Some(AccountType::System)
        );
        assert_eq!(AccountType::from_mapped_value("robot"), None);
    }

    #[test]
    fn test_entitlement_id_round_trip() {
        let rid = ResourceId::new("role", "administrator");
        let id = entitlement_id(&rid, "member");
        assert_eq!(id, "role:administrator:member");
        assert_eq!(entitlement_key(&id).unwrap(), "member");
    }

    #[test]
    fn test_entitlement_key_malformed() {
        assert!(entitlement_key("justakey").is_err());
        assert!(entitlement_key("two:parts").is_err());
        assert!(entitlement_key("role:admin:").is_err());
        assert!(entitlement_key("").is_err());
    }

    #[test]
    fn test_split_entitlement_id() {
        let (resource, key) = split_entitlement_id("role:administrator:member").unwrap();
        assert_eq!(resource, ResourceId::new("role", "administrator"));
        assert_eq!(key, "member");

        // Keys may themselves contain separators; only the first two
        // segments are structural.
        let (_, key) = split_entitlement_id("role:admin:member:extra").unwrap();
        assert_eq!(key, "member:extra");
    }

    #[test]
    fn test_grant_id_composition() {
        let g = Grant::new(
            "role:administrator:member".to_string(),
            ResourceId::new("user", "42"),
        );
        assert_eq!(g.id, "role:administrator:member:user:42");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&UserStatus::Enabled).unwrap();
        assert_eq!(json, "\"enabled\"");

        let parsed: UserStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, UserStatus::Enabled);
    }

    #[test]
    fn test_resource_serialization_round_trip() {
        let resource = Resource {
            id: ResourceId::new("user", "42"),
            display_name: "Ada".to_string(),
            description: None,
            trait_data: Some(TraitData::User(UserTraitData {
                emails: vec!["ada@example.com".to_string()],
                status: UserStatus::Enabled,
                ..UserTraitData::default()
            })),
            annotations: vec![Annotation::ExternalLink {
                url: "https://example.com".to_string(),
            }],
        };

        let json = serde_json::to_string(&resource).unwrap();
        let parsed: Resource = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, resource.id);
        assert_eq!(parsed.display_name, resource.display_name);
        assert_eq!(parsed.annotations, resource.annotations);
    }

    #[test]
    fn test_trait_data_kind() {
        assert_eq!(
            TraitData::User(UserTraitData::default()).kind(),
            ResourceTrait::User
        );
        assert_eq!(
            TraitData::App(AppTraitData::default()).kind(),
            ResourceTrait::App
        );
    }
}
