//! Shared session token cell
//!
//! The session token is written by login and by session invalidation, and
//! read by every signed request and every WebSocket handshake. [`TokenHandle`]
//! is the one place it lives; clones share the same value.

use parking_lot::RwLock;
use std::sync::Arc;

/// Single-writer, many-reader handle to the current session token
///
/// An empty string is never stored; `set("")` clears the token.
#[derive(Clone, Default)]
pub struct TokenHandle {
    inner: Arc<RwLock<Option<String>>>,
}

impl TokenHandle {
    /// Create an empty handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle already holding `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        let handle = Self::new();
        handle.set(token);
        handle
    }

    /// Current token, if any
    pub fn get(&self) -> Option<String> {
        self.inner.read().clone()
    }

    /// Replace the token
    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        *self.inner.write() = if token.is_empty() { None } else { Some(token) };
    }

    /// Remove the token, returning the previous value
    pub fn clear(&self) -> Option<String> {
        self.inner.write().take()
    }

    /// Check if a token is held
    pub fn is_present(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl std::fmt::Debug for TokenHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.is_present() { "[REDACTED]" } else { "None" };
        f.debug_struct("TokenHandle").field("token", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_value() {
        let a = TokenHandle::new();
        let b = a.clone();
        a.set("jwt-1");
        assert_eq!(b.get().as_deref(), Some("jwt-1"));
        b.clear();
        assert!(!a.is_present());
    }

    #[test]
    fn test_empty_token_clears() {
        let h = TokenHandle::with_token("jwt");
        h.set("");
        assert_eq!(h.get(), None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let h = TokenHandle::with_token("secret-jwt");
        assert!(!format!("{:?}", h).contains("secret-jwt"));
    }
}
