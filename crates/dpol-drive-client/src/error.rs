//! Drive client error types and response classification.

use dpol_core::ApiError;
use serde::Deserialize;

/// Errors constructing a [`DriveClient`](crate::DriveClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The configuration cannot be turned into a client.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Google API error envelope: `{"error": {"code": 403, "message": "..."}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Classify a non-success response. The message is taken from the Google
/// error envelope when present, otherwise the raw body is used.
pub(crate) fn status_error(endpoint: &str, status: u16, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    ApiError::from_status(endpoint, status, message)
}

/// Map a reqwest failure. Anything that is not a body decode failure is a
/// transport problem and therefore transient.
pub(crate) fn transport_error(endpoint: &str, err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    } else {
        ApiError::Transient {
            endpoint: endpoint.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_message_preferred() {
        let err = status_error(
            "files.list",
            403,
            r#"{"error":{"code":403,"message":"Insufficient Permission"}}"#,
        );
        assert!(err.is_authorization());
        assert!(err.to_string().contains("Insufficient Permission"));
        assert!(!err.to_string().contains("\"code\""));
    }

    #[test]
    fn raw_body_used_without_envelope() {
        let err = status_error("files.list", 500, "  backend error \n");
        assert!(err.is_transient());
        assert!(err.to_string().ends_with("backend error"));
    }
}
