//! The consumer contract.
//!
//! The upstream framework drives a connector through these capability
//! traits: enumerate resource types, then per type page through
//! resources, entitlements, and grants; on explicit operator action,
//! grant or revoke an entitlement. All row-producing calls return a
//! [`Page`] whose token must be passed back verbatim to continue.

use async_trait::async_trait;

use sqlbridge_core::error::ConnectorResult;
use sqlbridge_core::types::{
    Annotation, Entitlement, Grant, Resource, ResourceId, ResourceType,
};
use sqlbridge_engine::PageToken;

/// One page of results plus the continuation token.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items in delivery order.
    pub items: Vec<T>,
    /// Token for the next page; empty on the terminal page.
    pub next_page_token: String,
    /// Call-level annotations.
    pub annotations: Vec<Annotation>,
}

impl<T> Page<T> {
    /// An empty terminal page.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_page_token: String::new(),
            annotations: Vec::new(),
        }
    }

    /// A page of items with its continuation token.
    #[must_use]
    pub fn new(items: Vec<T>, next_page_token: String) -> Self {
        Self {
            items,
            next_page_token,
            annotations: Vec::new(),
        }
    }

    /// Whether this is the terminal page.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_empty()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Read-side surface for one resource type.
#[async_trait]
pub trait ResourceSyncer: Send + Sync {
    /// The resource type this syncer serves.
    fn resource_type(&self) -> &ResourceType;

    /// List one page of resources.
    async fn list(
        &self,
        parent: Option<&ResourceId>,
        token: &PageToken,
    ) -> ConnectorResult<Page<Resource>>;

    /// List one page of entitlements for a resource.
    async fn entitlements(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<Page<Entitlement>>;

    /// List one page of grants for a resource.
    async fn grants(
        &self,
        resource: &Resource,
        token: &PageToken,
    ) -> ConnectorResult<Page<Grant>>;
}

/// Write-side surface for entitlement provisioning.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Grant an entitlement to a principal.
    async fn grant(
        &self,
        principal: &Resource,
        entitlement: &Entitlement,
    ) -> ConnectorResult<Vec<Annotation>>;

    /// Revoke an existing grant.
    async fn revoke(&self, grant: &Grant) -> ConnectorResult<Vec<Annotation>>;
}
