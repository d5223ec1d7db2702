//! High-level session SDK for the Cody trading API
//!
//! This crate ties the signed REST client and the streaming session
//! together behind one process-wide [`Session`]: it restores a saved
//! login, keeps the session alive in the background, and hands out
//! streaming sessions that share its token.
//!
//! # Quick Start
//!
//! ```no_run
//! use cody_sdk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::start(SdkConfig::from_env()?).await?;
//!
//!     if !session.is_authenticated() {
//!         let challenge = session.send_otp("user", "password").await?;
//!         session.login(&challenge, "123456").await?;
//!     }
//!
//!     let summary = session.rest().portfolio().account_summary(12345).await;
//!     println!("{:?}", summary.json());
//!
//!     let mut stream = session.streaming()?;
//!     let mut events = stream.take_event_receiver().unwrap();
//!     let running = stream.spawn();
//!     running.handle().subscribe(Feed::T, ["GARAN"]).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let StreamEvent::Message(frame) = event {
//!             println!("{frame}");
//!         }
//!     }
//!
//!     session.shutdown(std::time::Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod prelude;
pub mod session;

// Re-export main types
pub use config::SdkConfig;
pub use error::{SdkError, SdkResult};
pub use session::Session;

// Re-export commonly used types from dependencies
pub use cody_auth::{Credentials, TokenHandle};
pub use cody_rest::{ApiResponse, RestClient, SessionRestore};
pub use cody_types::{Feed, MessageType, StreamMessage};
pub use cody_ws::{ConnectionState, ReconnectConfig, StreamEvent};
