//! Error types for REST API operations

use cody_auth::AuthError;

use crate::response::{ApiFailure, FailureKind};

/// Errors that can occur during REST API operations
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Signing or token storage failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The request did not come back with a 200
    #[error("Request failed: {0}")]
    Request(ApiFailure),

    /// Response was missing an expected field
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RestError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(failure) => matches!(
                failure.kind,
                FailureKind::Transport | FailureKind::Timeout
            ) || failure.status.is_some_and(|s| s >= 500),
            _ => false,
        }
    }

    /// Check if the server rejected the session or credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Request(ApiFailure {
                status: Some(401 | 403),
                ..
            })
        )
    }

    /// HTTP status of a failed request, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(failure) => failure.status,
            _ => None,
        }
    }
}

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;
