//! Shared types for the Cody trading API
//!
//! This crate holds the wire model of the streaming feed and the error type
//! shared by the streaming layer. It has minimal dependencies and can be used
//! independently of the network crates.
//!
//! # Key Types
//!
//! - [`StreamMessage`] - Outbound WebSocket frame (`{Token, Type, Symbols}`)
//! - [`MessageType`], [`Feed`] - Heartbeat and subscription message kinds
//! - [`CodyError`] - Streaming error type

pub mod error;
pub mod messages;

pub use error::*;
pub use messages::*;
