//! Typed access to the Drive v2 `permissions` resource.

use async_trait::async_trait;
use dpol_core::{ApiError, ItemId, PermissionId, PermissionMutator};

use crate::DriveClient;

#[async_trait]
impl PermissionMutator for DriveClient {
    /// Calls `DELETE {base_url}/drive/v2/files/{item}/permissions/{permission}`.
    ///
    /// The API answers `204 No Content` on success; any 2xx is accepted.
    async fn delete_permission(
        &self,
        item_id: &ItemId,
        permission_id: &PermissionId,
    ) -> Result<(), ApiError> {
        let endpoint = "permissions.delete";
        let url = self.endpoint_url(
            endpoint,
            &["files", item_id.as_str(), "permissions", permission_id.as_str()],
        )?;

        self.send(endpoint, self.http.delete(url)).await?;
        tracing::debug!(item_id = %item_id, permission_id = %permission_id, "permission deleted");
        Ok(())
    }
}
