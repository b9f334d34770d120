//! Typed access to the Drive v2 `files` resource.
//!
//! Only the fields the crawler needs are requested (`fields=` projection),
//! which keeps listing pages small enough for 1000-item pages.

use async_trait::async_trait;
use dpol_core::{
    ApiError, ChildPage, GranteeKind, Item, ItemId, ItemKind, ItemLister, Owner, Permission,
    PermissionId,
};
use serde::Deserialize;

use crate::DriveClient;

/// MIME type the Drive API reports for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Field projection for a single file.
const FILE_FIELDS: &str = "id,title,mimeType,labels,alternateLink,owners,permissions";

/// Field projection for a listing page.
const LIST_FIELDS: &str =
    "nextPageToken,items(id,title,mimeType,labels,alternateLink,owners,permissions)";

// -- Wire types matching the v2 schema ---------------------------------------

/// File resource as returned by `files.get` / `files.list`.
///
/// Fields use `#[serde(default)]` so a projection that omits a field, or a
/// schema addition, never fails the whole page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub labels: DriveLabels,
    #[serde(default)]
    pub alternate_link: Option<String>,
    #[serde(default)]
    pub owners: Vec<DriveUser>,
    #[serde(default)]
    pub permissions: Vec<DrivePermission>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriveLabels {
    #[serde(default)]
    pub trashed: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveUser {
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrivePermission {
    pub id: String,
    #[serde(rename = "type")]
    pub grantee: GranteeKind,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Response of `files.list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub items: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl From<DrivePermission> for Permission {
    fn from(p: DrivePermission) -> Self {
        Permission {
            id: PermissionId::new(p.id),
            grantee: p.grantee,
            email: p.email_address.filter(|e| !e.is_empty()),
            domain: p.domain.filter(|d| !d.is_empty()),
            role: p.role,
            deleted: p.deleted,
        }
    }
}

impl From<DriveFile> for Item {
    fn from(f: DriveFile) -> Self {
        let kind = if f.mime_type == FOLDER_MIME_TYPE {
            ItemKind::Folder
        } else {
            ItemKind::File
        };
        Item {
            id: ItemId::new(f.id),
            name: f.title,
            kind,
            trashed: f.labels.trashed,
            link: f.alternate_link,
            owners: f
                .owners
                .into_iter()
                .map(|o| Owner {
                    email: o.email_address,
                    display_name: o.display_name,
                })
                .collect(),
            permissions: f.permissions.into_iter().map(Permission::from).collect(),
        }
    }
}

/// Query selecting the live children of a folder.
fn children_query(folder_id: &ItemId) -> String {
    // Single quotes and backslashes inside the id must be escaped for the
    // Drive query language.
    let escaped = folder_id.as_str().replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents and trashed = false")
}

#[async_trait]
impl ItemLister for DriveClient {
    /// Calls `GET {base_url}/drive/v2/files/{id}`.
    async fn get_item(&self, id: &ItemId) -> Result<Item, ApiError> {
        let endpoint = "files.get";
        let mut url = self.endpoint_url(endpoint, &["files", id.as_str()])?;
        url.query_pairs_mut().append_pair("fields", FILE_FIELDS);

        let resp = self.send(endpoint, self.http.get(url)).await?;
        let file: DriveFile = resp
            .json()
            .await
            .map_err(|e| crate::error::transport_error(endpoint, e))?;
        Ok(file.into())
    }

    /// Calls `GET {base_url}/drive/v2/files?q='{folder}' in parents and trashed = false`.
    async fn list_children(
        &self,
        folder_id: &ItemId,
        page_token: Option<&str>,
    ) -> Result<ChildPage, ApiError> {
        let endpoint = "files.list";
        let mut url = self.endpoint_url(endpoint, &["files"])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", &children_query(folder_id))
                .append_pair("maxResults", &self.page_size.to_string())
                .append_pair("fields", LIST_FIELDS);
            if let Some(token) = page_token.filter(|t| !t.is_empty()) {
                query.append_pair("pageToken", token);
            }
        }

        let resp = self.send(endpoint, self.http.get(url)).await?;
        let list: FileList = resp
            .json()
            .await
            .map_err(|e| crate::error::transport_error(endpoint, e))?;

        tracing::trace!(
            folder_id = %folder_id,
            items = list.items.len(),
            more = list.next_page_token.is_some(),
            "listed folder page"
        );

        Ok(ChildPage {
            items: list.items.into_iter().map(Item::from).collect(),
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}
