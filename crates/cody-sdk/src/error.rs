//! SDK error type

use cody_auth::AuthError;
use cody_rest::RestError;
use cody_types::CodyError;
use std::time::Duration;

/// Errors surfaced by the session facade
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// REST call or client setup failed
    #[error(transparent)]
    Rest(#[from] RestError),

    /// Credentials or token storage failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Streaming session failed
    #[error(transparent)]
    Stream(#[from] CodyError),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background tasks did not stop in time
    #[error("Background tasks did not stop within {timeout:?}")]
    ShutdownTimeout { timeout: Duration },
}

impl SdkError {
    /// Check if the server rejected the session; a new login is needed
    pub fn requires_login(&self) -> bool {
        match self {
            Self::Rest(e) => e.is_unauthorized(),
            Self::Stream(e) => e.requires_reauth(),
            _ => false,
        }
    }
}

/// Result type for SDK operations
pub type SdkResult<T> = Result<T, SdkError>;
