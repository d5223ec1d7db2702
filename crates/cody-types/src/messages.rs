//! Outbound streaming message types
//!
//! Every frame the client writes to the feed has the same JSON shape:
//!
//! ```json
//! {"Token": "<session token>", "Type": "AddT", "Symbols": ["GARAN", "THYAO"]}
//! ```
//!
//! Heartbeats use `Type: "H"` with an empty symbol list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CodyError, CodyResult};

/// Feed codes accepted by the streaming service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feed {
    /// `T` feed
    T,
    /// `Y` feed
    Y,
    /// `D` feed
    D,
}

impl Feed {
    /// All feeds, in wire order
    pub const ALL: [Feed; 3] = [Feed::T, Feed::Y, Feed::D];

    /// Message type that subscribes to this feed
    pub fn subscribe(self) -> MessageType {
        match self {
            Self::T => MessageType::AddT,
            Self::Y => MessageType::AddY,
            Self::D => MessageType::AddD,
        }
    }

    /// Message type that unsubscribes from this feed
    pub fn unsubscribe(self) -> MessageType {
        match self {
            Self::T => MessageType::RemoveT,
            Self::Y => MessageType::RemoveY,
            Self::D => MessageType::RemoveD,
        }
    }

    /// Single-letter code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::T => "T",
            Self::Y => "Y",
            Self::D => "D",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `Type` field of a streaming frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Keep-alive frame
    #[serde(rename = "H")]
    Heartbeat,
    AddT,
    AddY,
    AddD,
    RemoveT,
    RemoveY,
    RemoveD,
}

impl MessageType {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heartbeat => "H",
            Self::AddT => "AddT",
            Self::AddY => "AddY",
            Self::AddD => "AddD",
            Self::RemoveT => "RemoveT",
            Self::RemoveY => "RemoveY",
            Self::RemoveD => "RemoveD",
        }
    }

    /// Feed this message refers to, `None` for heartbeats
    pub fn feed(&self) -> Option<Feed> {
        match self {
            Self::Heartbeat => None,
            Self::AddT | Self::RemoveT => Some(Feed::T),
            Self::AddY | Self::RemoveY => Some(Feed::Y),
            Self::AddD | Self::RemoveD => Some(Feed::D),
        }
    }

    /// Check if this is one of the `Add*` types
    pub fn is_subscribe(&self) -> bool {
        matches!(self, Self::AddT | Self::AddY | Self::AddD)
    }

    /// Check if this is one of the `Remove*` types
    pub fn is_unsubscribe(&self) -> bool {
        matches!(self, Self::RemoveT | Self::RemoveY | Self::RemoveD)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = CodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "H" => Ok(Self::Heartbeat),
            "AddT" => Ok(Self::AddT),
            "AddY" => Ok(Self::AddY),
            "AddD" => Ok(Self::AddD),
            "RemoveT" => Ok(Self::RemoveT),
            "RemoveY" => Ok(Self::RemoveY),
            "RemoveD" => Ok(Self::RemoveD),
            other => Err(CodyError::UnexpectedMessage(format!(
                "unknown message type: {other}"
            ))),
        }
    }
}

/// A frame written to the streaming feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Session token of the connection the frame is sent on
    #[serde(rename = "Token")]
    pub token: String,
    /// Frame type
    #[serde(rename = "Type")]
    pub msg_type: MessageType,
    /// Instrument codes (empty for heartbeats)
    #[serde(rename = "Symbols")]
    pub symbols: Vec<String>,
}

impl StreamMessage {
    /// Create a frame of any type
    pub fn new(
        token: impl Into<String>,
        msg_type: MessageType,
        symbols: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            token: token.into(),
            msg_type,
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    /// Heartbeat frame: `{"Token": ..., "Type": "H", "Symbols": []}`
    pub fn heartbeat(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            msg_type: MessageType::Heartbeat,
            symbols: Vec::new(),
        }
    }

    /// Subscribe to `feed` for the given symbols
    pub fn subscribe(
        token: impl Into<String>,
        feed: Feed,
        symbols: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(token, feed.subscribe(), symbols)
    }

    /// Unsubscribe from `feed` for the given symbols
    pub fn unsubscribe(
        token: impl Into<String>,
        feed: Feed,
        symbols: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(token, feed.unsubscribe(), symbols)
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> CodyResult<String> {
        serde_json::to_string(self).map_err(|e| CodyError::InvalidJson {
            message: e.to_string(),
            raw: None,
        })
    }
}

/// Clean up user-supplied symbol input: trims entries and drops empty ones
pub fn normalize_symbols(symbols: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    symbols
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
