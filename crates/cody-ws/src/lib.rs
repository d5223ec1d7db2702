//! Streaming WebSocket session for the Cody trading API
//!
//! This crate keeps one authenticated WebSocket connection alive:
//!
//! - Signed handshake (`X-ClientKey`, `Authorization`, `X-Signature`, `X-Timestamp`)
//! - Heartbeat frames on a polled interval
//! - Automatic reconnection with exponential backoff
//! - Subscription restoration after reconnect
//! - Event channel and optional per-frame callback
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cody_auth::{Credentials, TokenHandle};
//! use cody_types::Feed;
//! use cody_ws::{StreamConfig, StreamingSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Arc::new(Credentials::from_env()?);
//!     let token = TokenHandle::with_token("session-token");
//!     let config = StreamConfig::from_rest_base("https://api.codyalgo.com")?;
//!
//!     let mut session = StreamingSession::websocket(config, credentials, token)
//!         .with_message_handler(|frame| println!("{frame}"));
//!     let mut events = session.take_event_receiver().unwrap();
//!
//!     let running = session.spawn();
//!     running.handle().subscribe(Feed::T, ["GARAN"]).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod endpoint;
pub mod events;
pub mod heartbeat;
pub mod reconnect;
pub mod session;
pub mod subscription;
pub mod transport;

// Re-export main types
pub use endpoint::{ws_url, WS_PATH};
pub use events::{DisconnectReason, StreamEvent};
pub use heartbeat::{Heartbeat, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HEARTBEAT_POLL};
pub use reconnect::{Backoff, ReconnectConfig};
pub use session::{
    ConnectionState, MessageHandler, RunningSession, SessionHandle, StreamConfig,
    StreamingSession, DEFAULT_SEND_TIMEOUT, DEFAULT_WS_URL,
};
pub use subscription::SubscriptionManager;
pub use transport::{HandshakeHeaders, Transport, TransportError, WsTransport};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::{MockFrame, MockHandle, MockTransport};
