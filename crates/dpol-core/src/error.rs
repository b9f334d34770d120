//! # Error Types — Structured Error Hierarchy
//!
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - [`ApiError`] classifies a failed external call by what the crawler must
//!   do about it: retry ([`ApiError::is_transient`]), treat as empty
//!   ([`ApiError::is_not_found_or_bad_request`]), or abort the run
//!   ([`ApiError::is_authorization`]).
//! - [`RunError`] is the process-fatal taxonomy. Only configuration and
//!   authorization failures end a run; everything else is contained to a
//!   subtree or a single permission by the caller.

use thiserror::Error;

/// A failed call to the external hierarchy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Server-side (5xx) failure or a transport error (connection reset,
    /// timeout). Worth retrying.
    #[error("transient failure calling {endpoint}{}: {message}", status_suffix(.status))]
    Transient {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// The credentials are missing, expired, or lack the required scope.
    #[error("{endpoint} returned {status}: {message}")]
    Unauthorized {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The request referenced something that does not exist or was rejected
    /// as malformed.
    #[error("{endpoint} returned {status}: {message}")]
    NotFoundOrBadRequest {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// Any other non-success status.
    #[error("{endpoint} returned unexpected status {status}: {message}")]
    Unexpected {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized {
                endpoint,
                status,
                message,
            },
            400 | 404 => Self::NotFoundOrBadRequest {
                endpoint,
                status,
                message,
            },
            500..=599 => Self::Transient {
                endpoint,
                status: Some(status),
                message,
            },
            _ => Self::Unexpected {
                endpoint,
                status,
                message,
            },
        }
    }

    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Whether the failure is an authorization failure (process-fatal).
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Whether the call should be treated as an empty result.
    pub fn is_not_found_or_bad_request(&self) -> bool {
        matches!(self, Self::NotFoundOrBadRequest { .. })
    }

    /// The endpoint label the failing call was made against.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Transient { endpoint, .. }
            | Self::Unauthorized { endpoint, .. }
            | Self::NotFoundOrBadRequest { endpoint, .. }
            | Self::Unexpected { endpoint, .. }
            | Self::Decode { endpoint, .. } => endpoint,
        }
    }
}

/// Invalid run configuration, detected before any crawling starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The root folder could not be fetched.
    #[error("unable to get root folder {root}: {reason}")]
    RootUnavailable { root: String, reason: String },

    /// The root id names a file.
    #[error("please specify a folder id; {root} is a file id")]
    RootNotFolder { root: String },

    /// The root folder is in the trash.
    #[error("please specify an active folder; folder {root} is trashed")]
    RootTrashed { root: String },

    /// The policy source produced no rules.
    #[error("no folder policy rules found in policy source")]
    EmptyPolicy,

    /// The policy source could not be read or parsed.
    #[error("invalid policy source: {0}")]
    InvalidPolicy(String),
}

/// Process-fatal run failure.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A 401/403 from any call site. The token has to be refreshed.
    #[error("authorization failed during {operation}; refresh the access token and re-run - {source}")]
    Authorization {
        operation: String,
        #[source]
        source: ApiError,
    },

    /// A phase started while the previous one still had live work.
    #[error("{phase} started before the previous phase completed: {detail}")]
    PhaseOrder { phase: String, detail: String },
}
