//! Streaming session events

use std::time::Duration;

/// Reason for disconnection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server closed the connection
    ServerClosed,
    /// Network or protocol error while receiving
    NetworkError(String),
    /// A write to the socket failed
    SendFailed(String),
    /// Reconnect was requested through the session handle
    Requested,
    /// Client requested shutdown
    Shutdown,
}

/// Events published by a streaming session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Handshake completed
    Connected {
        /// WebSocket URL
        url: String,
        /// Number of successful connects so far (1 for the first)
        connection: u64,
    },
    /// Raw text frame received
    Message(String),
    /// Heartbeat frame written
    HeartbeatSent,
    /// Connection was lost
    Disconnected {
        /// Reason for disconnection
        reason: DisconnectReason,
    },
    /// Waiting before the next connect attempt
    Reconnecting {
        /// Consecutive failed attempts (1-indexed)
        attempt: u32,
        /// Delay before this attempt
        delay: Duration,
    },
    /// Session gave up
    ReconnectFailed {
        /// Final error
        error: String,
    },
    /// Subscriptions replayed after connecting
    SubscriptionsRestored {
        /// Number of subscribe frames sent
        count: usize,
    },
    /// Session stopped and will not reconnect
    Closed,
}

impl StreamEvent {
    /// Check if this event carries a received frame
    pub fn is_message(&self) -> bool {
        matches!(self, Self::Message(_))
    }
}
