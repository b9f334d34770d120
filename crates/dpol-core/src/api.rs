//! # External Collaborator Seams
//!
//! The crawler reaches the storage hierarchy only through these traits. The
//! HTTP implementation lives in `dpol-drive-client`; tests use an in-memory
//! drive.
//!
//! Implementations perform exactly one external call per method invocation
//! and do not retry; retry is applied by the caller through
//! [`RetryPolicy`](crate::retry::RetryPolicy) so that every call site follows
//! the same schedule.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::identity::{ItemId, PermissionId};
use crate::item::Item;

/// One page of a folder listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildPage {
    pub items: Vec<Item>,
    /// Token for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Read access to the hierarchy.
#[async_trait]
pub trait ItemLister: Send + Sync {
    /// Fetch a single item by id.
    async fn get_item(&self, id: &ItemId) -> Result<Item, ApiError>;

    /// Fetch one page of the non-trashed children of `folder_id`.
    async fn list_children(
        &self,
        folder_id: &ItemId,
        page_token: Option<&str>,
    ) -> Result<ChildPage, ApiError>;
}

/// Write access to access-control entries.
#[async_trait]
pub trait PermissionMutator: Send + Sync {
    /// Delete one permission from an item.
    async fn delete_permission(
        &self,
        item_id: &ItemId,
        permission_id: &PermissionId,
    ) -> Result<(), ApiError>;
}
