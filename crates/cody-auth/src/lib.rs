//! Request signing and session token storage for the Cody trading API
//!
//! This crate holds everything the REST and WebSocket layers share about
//! identity: the client credentials, the HMAC-SHA256 signer, the in-memory
//! session token cell and its on-disk record.
//!
//! # Example
//!
//! ```no_run
//! use cody_auth::{Credentials, TokenHandle, TokenStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load credentials from environment
//!     let creds = Credentials::from_env()?;
//!
//!     // Sign a request body for a path
//!     let signed = creds.sign_request("/Portfolio/SubAccounts", "{}")?;
//!     println!("X-Signature: {}", signed.signature);
//!
//!     // Restore a saved session token
//!     let token = TokenHandle::new();
//!     if let Some(saved) = TokenStore::default().load() {
//!         token.set(saved);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod credentials;
mod error;
mod store;
mod token;

pub use credentials::{Credentials, RequestSigner, SignedRequest, ENV_API_KEY, ENV_API_SECRET};
pub use error::{AuthError, AuthResult};
pub use store::{TokenStore, DEFAULT_TOKEN_FILE};
pub use token::TokenHandle;
