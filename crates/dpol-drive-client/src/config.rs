//! Drive API client configuration.
//!
//! The base URL defaults to the public Google API host. Override via
//! environment variables or explicit construction for testing.

use url::Url;
use zeroize::Zeroizing;

/// Default API host.
pub const DEFAULT_API_URL: &str = "https://www.googleapis.com";

/// Largest page size the files.list endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Configuration for connecting to the Drive API.
///
/// Custom `Debug` implementation redacts the `access_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct DriveApiConfig {
    /// Base URL of the API host. Paths such as `drive/v2/files` are
    /// appended to it.
    pub base_url: Url,
    /// OAuth bearer token. Obtaining and refreshing it is the caller's job.
    pub access_token: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Items requested per files.list page.
    pub page_size: u32,
}

impl std::fmt::Debug for DriveApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveApiConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl DriveApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `DRIVEPOLICY_ACCESS_TOKEN` (required)
    /// - `DRIVEPOLICY_API_URL` (default: `https://www.googleapis.com`)
    /// - `DRIVEPOLICY_TIMEOUT_SECS` (default: 30)
    /// - `DRIVEPOLICY_PAGE_SIZE` (default: 1000, capped at 1000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token = std::env::var("DRIVEPOLICY_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let raw_url =
            std::env::var("DRIVEPOLICY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let base_url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidUrl("DRIVEPOLICY_API_URL".to_string(), e.to_string()))?;

        Ok(Self {
            base_url,
            access_token: Zeroizing::new(access_token),
            timeout_secs: env_number("DRIVEPOLICY_TIMEOUT_SECS").unwrap_or(30),
            page_size: env_number("DRIVEPOLICY_PAGE_SIZE")
                .map(|n: u32| n.clamp(1, MAX_PAGE_SIZE))
                .unwrap_or(MAX_PAGE_SIZE),
        })
    }

    /// Configuration pointing at a local mock server (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `uri` cannot be parsed.
    pub fn local_mock(uri: &str, token: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Url::parse(uri)
                .map_err(|e| ConfigError::InvalidUrl(uri.to_string(), e.to_string()))?,
            access_token: Zeroizing::new(token.to_string()),
            timeout_secs: 5,
            page_size: MAX_PAGE_SIZE,
        })
    }
}

fn env_number<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.trim().parse().ok())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DRIVEPOLICY_ACCESS_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = DriveApiConfig::local_mock("http://127.0.0.1:9000", "test-token").unwrap();
        assert_eq!(cfg.access_token.as_str(), "test-token");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.page_size, MAX_PAGE_SIZE);
        assert_eq!(cfg.base_url.as_str(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn local_mock_rejects_garbage() {
        assert!(DriveApiConfig::local_mock("not a url", "t").is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = DriveApiConfig::local_mock("http://127.0.0.1:9000", "secret-value").unwrap();
        let dbg = format!("{cfg:?}");
        assert!(dbg.contains("[REDACTED]"));
        assert!(!dbg.contains("secret-value"));
    }

    #[test]
    fn env_number_ignores_unparseable() {
        std::env::set_var("DPOL_TEST_BAD_NUMBER", "lots");
        let parsed: Option<u64> = env_number("DPOL_TEST_BAD_NUMBER");
        std::env::remove_var("DPOL_TEST_BAD_NUMBER");
        assert!(parsed.is_none());
    }
}
