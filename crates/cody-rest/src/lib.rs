//! Signed REST client for the Cody trading API
//!
//! This crate issues every HTTP call to the trading service: it signs each
//! request, spaces requests with a throttle, keeps the session token in
//! memory and on disk, and keeps the session alive in the background.
//!
//! # Features
//!
//! - **Signed requests**: HMAC-SHA256 over `client_key|path|body|timestamp`
//! - **Session lifecycle**: OTP + login, saved-session restore and validation
//! - **Keep-alive**: cancellable background refresh of the session
//! - **Endpoints**: portfolio, stock and futures wrappers over [`RestClient::post`]
//!
//! # Failure contract
//!
//! [`RestClient::post`] never returns `Err`. Non-200 responses and transport
//! errors come back as [`ApiResponse::Failure`] with the status code and raw
//! body. Use [`ApiResponse::into_result`] where `?` is more convenient.
//!
//! # Example
//!
//! ```no_run
//! use cody_auth::Credentials;
//! use cody_rest::{spawn_keep_alive, KeepAliveConfig, RestClient, RestConfig};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let creds = Arc::new(Credentials::from_env()?);
//!     let client = Arc::new(RestClient::new(RestConfig::default(), creds)?);
//!     client.restore_session().await;
//!
//!     let cancel = CancellationToken::new();
//!     let keep_alive = spawn_keep_alive(client.clone(), KeepAliveConfig::default(), cancel.clone());
//!
//!     let summary = client.portfolio().account_summary(1234).await;
//!     println!("{:?}", summary.json());
//!
//!     cancel.cancel();
//!     keep_alive.await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod endpoints;
pub mod error;
pub mod keepalive;
pub mod response;
pub mod throttle;

// Re-export main types
pub use client::{
    RestClient, RestConfig, DEFAULT_BASE_URL, HEADER_CLIENT_KEY, HEADER_SIGNATURE,
    HEADER_TIMESTAMP, JSON_CONTENT_TYPE,
};
pub use error::{RestError, RestResult};
pub use keepalive::{keep_alive_tick, spawn_keep_alive, KeepAliveConfig, KeepAliveOutcome};
pub use response::{ApiFailure, ApiResponse, FailureKind, OtpChallenge, SessionRestore};
pub use throttle::Throttle;

// Re-export endpoint-specific types
pub use endpoints::{
    FutureOrderListQuery, FutureOrderRequest, FutureReplaceRequest, StockOrderListQuery,
    StockOrderRequest, StockPositionsQuery,
};
