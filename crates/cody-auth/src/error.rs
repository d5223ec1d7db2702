//! Error types for authentication operations

/// Errors that can occur while signing or storing session state
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Invalid API credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Signature could not be computed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    /// Token record could not be written or removed
    #[error("Token storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Token record could not be encoded
    #[error("Token encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
