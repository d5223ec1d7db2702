//! Error types for the Cody streaming layer

use std::time::Duration;
use thiserror::Error;

/// Main error type for streaming operations
#[derive(Error, Debug)]
pub enum CodyError {
    // === Connection Errors ===
    /// Failed to establish WebSocket connection
    #[error("Failed to connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// Connection attempt timed out
    #[error("Connection timeout after {timeout:?} to {url}")]
    ConnectionTimeout { url: String, timeout: Duration },

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    // === Protocol Errors ===
    /// Failed to encode or parse a JSON frame
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String, raw: Option<String> },

    /// Unexpected message format
    #[error("Unexpected message format: {0}")]
    UnexpectedMessage(String),

    // === Authentication Errors ===
    /// Handshake was rejected or could not be signed
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// No session token is held, streaming requires a login first
    #[error("No session token available, login required")]
    TokenMissing,

    // === Internal Errors ===
    /// Internal channel was closed unexpectedly
    #[error("Internal channel closed unexpectedly")]
    ChannelClosed,

    /// Session is shutting down
    #[error("Shutdown in progress")]
    ShuttingDown,

    /// A command was not acknowledged in time
    #[error("Send not acknowledged within {timeout:?}")]
    SendTimeout { timeout: Duration },

    /// Session task did not stop within the shutdown deadline
    #[error("Session did not stop within {timeout:?}")]
    ShutdownTimeout { timeout: Duration },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CodyError {
    /// Returns true if this error is potentially recoverable via retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::ConnectionTimeout { .. }
                | Self::WebSocket(_)
                | Self::SendTimeout { .. }
        )
    }

    /// Returns true if this error requires reconnection
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_) | Self::ConnectionFailed { .. } | Self::ChannelClosed
        )
    }

    /// Returns true if this error requires re-authentication
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. } | Self::TokenMissing)
    }

    /// Create an authentication failure
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }
}

/// Result type alias for streaming operations
pub type CodyResult<T> = Result<T, CodyError>;
