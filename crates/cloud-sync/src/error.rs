//! Error types for the cloud sync crate.

use rentdesk_core::sync::{classify_http_status, SyncRetryClass};
use thiserror::Error;

/// Result type alias for remote store operations.
pub type Result<T> = std::result::Result<T, CloudError>;

/// Errors raised while talking to a remote document store.
#[derive(Debug, Error)]
pub enum CloudError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body or backup file that is not the expected JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the remote store
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Request or configuration that cannot be used (blank ids, missing settings, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or malformed access token
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Reading a backup file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloudError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Api { status, .. } => classify_http_status(*status),
            Self::Http(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
                SyncRetryClass::Retryable
            }
            Self::Http(err) => match err.status() {
                Some(status) => classify_http_status(status.as_u16()),
                None => SyncRetryClass::Retryable,
            },
            Self::Io(_) => SyncRetryClass::Retryable,
            Self::Json(_) | Self::InvalidRequest(_) => SyncRetryClass::Permanent,
            Self::Auth(_) => SyncRetryClass::ReauthRequired,
        }
    }
}

impl From<CloudError> for rentdesk_core::Error {
    fn from(err: CloudError) -> Self {
        let retryable = err.retry_class() == SyncRetryClass::Retryable;
        rentdesk_core::Error::remote(err.to_string(), retryable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable_and_auth_errors_are_not() {
        assert_eq!(
            CloudError::api(503, "unavailable").retry_class(),
            SyncRetryClass::Retryable
        );
        assert_eq!(
            CloudError::api(401, "expired").retry_class(),
            SyncRetryClass::ReauthRequired
        );
        assert_eq!(
            CloudError::api(404, "gone").retry_class(),
            SyncRetryClass::Permanent
        );
    }

    #[test]
    fn conversion_keeps_the_retry_signal() {
        let err: rentdesk_core::Error = CloudError::api(429, "slow down").into();
        assert!(err.is_retryable());
        let err: rentdesk_core::Error = CloudError::invalid_request("bad tenant").into();
        assert!(!err.is_retryable());
    }
}
