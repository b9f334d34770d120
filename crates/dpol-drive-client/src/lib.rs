//! # dpol-drive-client -- Typed Rust client for the Drive v2 API
//!
//! Implements the [`ItemLister`](dpol_core::ItemLister) and
//! [`PermissionMutator`](dpol_core::PermissionMutator) seams against three
//! endpoints:
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/drive/v2/files/{fileId}` | Get one item |
//! | GET    | `/drive/v2/files?q='{folderId}' in parents and trashed = false` | List children, paginated |
//! | DELETE | `/drive/v2/files/{fileId}/permissions/{permissionId}` | Delete one permission |
//!
//! The v2 surface is used rather than v3 because v3 omits permissions for
//! items the caller can only read, and omits the domain on non-domain
//! shares.
//!
//! Each trait method performs exactly one HTTP request. Retry is applied by
//! the crawler so every call site shares one schedule.

pub mod config;
pub mod error;
pub mod files;
pub mod permissions;

pub use config::DriveApiConfig;
pub use error::ClientError;
pub use files::FOLDER_MIME_TYPE;

use std::time::Duration;

use dpol_core::ApiError;
use url::Url;

/// Drive API client. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    base_url: Url,
    page_size: u32,
}

impl DriveClient {
    /// Create a new client from configuration.
    pub fn new(config: DriveApiConfig) -> Result<Self, ClientError> {
        let mut auth = reqwest::header::HeaderValue::from_str(&format!(
            "Bearer {}",
            config.access_token.as_str()
        ))
        .map_err(|_| ClientError::Config(config::ConfigError::MissingToken))?;
        auth.set_sensitive(true);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            page_size: config.page_size,
        })
    }

    /// Build `{base_url}/drive/v2/{segments...}` with each segment escaped.
    pub(crate) fn endpoint_url(&self, endpoint: &str, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Unexpected {
                endpoint: endpoint.to_string(),
                status: 0,
                message: format!("base URL {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(["drive", "v2"])
            .extend(segments);
        Ok(url)
    }

    /// Send a request and turn non-success statuses into classified errors.
    pub(crate) async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let resp = request
            .send()
            .await
            .map_err(|e| error::transport_error(endpoint, e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(endpoint, status, "Drive API returned an error status");
            return Err(error::status_error(endpoint, status, &body));
        }

        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> DriveClient {
        DriveClient::new(DriveApiConfig::local_mock(base, "token").unwrap()).unwrap()
    }

    #[test]
    fn endpoint_url_appends_segments() {
        let c = client("http://127.0.0.1:9000");
        let url = c.endpoint_url("files.get", &["files", "abc"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/drive/v2/files/abc");
    }

    #[test]
    fn endpoint_url_keeps_base_path_prefix() {
        let c = client("http://127.0.0.1:9000/proxy/");
        let url = c.endpoint_url("files.get", &["files", "abc"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/proxy/drive/v2/files/abc");
    }

    #[test]
    fn endpoint_url_escapes_segments() {
        let c = client("http://127.0.0.1:9000");
        let url = c.endpoint_url("files.get", &["files", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/drive/v2/files/a%2Fb%20c");
    }
}
