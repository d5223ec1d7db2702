//! Re-exports for convenience
//!
//! Import everything you need with:
//! ```
//! use cody_sdk::prelude::*;
//! ```

// Session
pub use crate::config::SdkConfig;
pub use crate::error::{SdkError, SdkResult};
pub use crate::session::Session;

// Auth
pub use cody_auth::{Credentials, TokenHandle};

// REST
pub use cody_rest::{
    ApiFailure, ApiResponse, FailureKind, FutureOrderListQuery, FutureOrderRequest,
    FutureReplaceRequest, KeepAliveConfig, OtpChallenge, RestClient, RestConfig, RestError,
    SessionRestore, StockOrderListQuery, StockOrderRequest, StockPositionsQuery,
};

// Streaming
pub use cody_types::{CodyError, Feed, MessageType, StreamMessage};
pub use cody_ws::{
    ConnectionState, DisconnectReason, ReconnectConfig, RunningSession, SessionHandle,
    StreamConfig, StreamEvent, StreamingSession,
};

// Decimal for prices
pub use rust_decimal::Decimal;
