//! Session configuration
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use cody_auth::Credentials;
//! use cody_sdk::SdkConfig;
//!
//! let credentials = Credentials::new("client-key", "secret").unwrap();
//! let config = SdkConfig::new(credentials)
//!     .with_base_url("https://api.example.com")
//!     .with_heartbeat_interval(Duration::from_secs(120));
//! assert_eq!(config.stream_url().unwrap(), "wss://api.example.com/ws");
//! ```

use crate::error::{SdkError, SdkResult};
use cody_auth::{Credentials, ENV_API_KEY, ENV_API_SECRET};
use cody_rest::{KeepAliveConfig, RestConfig};
use cody_ws::{ws_url, ReconnectConfig, StreamConfig};
use std::path::PathBuf;
use std::time::Duration;

/// REST base URL variable
pub const ENV_API_URL: &str = "CODY_API_URL";
/// Token record path variable
pub const ENV_TOKEN_FILE: &str = "CODY_TOKEN_FILE";
/// Heartbeat interval variable, in seconds
pub const ENV_HEARTBEAT_SECS: &str = "CODY_HEARTBEAT_SECS";
/// Keep-alive interval variable, in seconds
pub const ENV_KEEPALIVE_SECS: &str = "CODY_KEEPALIVE_SECS";

/// Everything a [`Session`](crate::Session) needs
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// API credentials
    pub credentials: Credentials,
    /// REST client settings, including the base URL
    pub rest: RestConfig,
    /// Keep-alive loop settings
    pub keep_alive: KeepAliveConfig,
    /// Streaming settings; the URL is replaced by [`stream_url`](Self::stream_url)
    pub stream: StreamConfig,
    /// Explicit streaming URL, derived from the REST base URL if unset
    pub stream_url: Option<String>,
}

impl SdkConfig {
    /// Default configuration for these credentials
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            rest: RestConfig::default(),
            keep_alive: KeepAliveConfig::default(),
            stream: StreamConfig::default(),
            stream_url: None,
        }
    }

    /// Load from the process environment, reading `.env` first if present
    ///
    /// Requires `CODY_API_URL`, `CODY_API_KEY` and `CODY_API_SECRET`.
    /// `CODY_TOKEN_FILE`, `CODY_HEARTBEAT_SECS` and `CODY_KEEPALIVE_SECS`
    /// are optional.
    pub fn from_env() -> SdkResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SdkResult<Self> {
        let required = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| SdkError::Config(format!("{name} is not set")))
        };

        let base_url = required(ENV_API_URL)?;
        let credentials = Credentials::new(required(ENV_API_KEY)?, required(ENV_API_SECRET)?)?;
        let mut config = Self::new(credentials).with_base_url(base_url);

        if let Some(path) = lookup(ENV_TOKEN_FILE).filter(|p| !p.trim().is_empty()) {
            config = config.with_token_file(path.trim());
        }
        if let Some(interval) = seconds(&lookup, ENV_HEARTBEAT_SECS)? {
            config = config.with_heartbeat_interval(interval);
        }
        if let Some(interval) = seconds(&lookup, ENV_KEEPALIVE_SECS)? {
            config = config.with_keep_alive_interval(interval);
        }

        Ok(config)
    }

    /// Set REST base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.rest = self.rest.with_base_url(base_url);
        self
    }

    /// Set token record path
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rest = self.rest.with_token_file(path);
        self
    }

    /// Set minimum spacing between REST requests
    pub fn with_throttle_interval(mut self, interval: Duration) -> Self {
        self.rest = self.rest.with_throttle_interval(interval);
        self
    }

    /// Set keep-alive interval
    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive = self.keep_alive.with_interval(interval);
        self
    }

    /// Disable the keep-alive loop
    pub fn without_keep_alive(mut self) -> Self {
        self.keep_alive = KeepAliveConfig::disabled();
        self
    }

    /// Set heartbeat interval
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.stream = self.stream.with_heartbeat_interval(interval);
        self
    }

    /// Set reconnection policy
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.stream = self.stream.with_reconnect(reconnect);
        self
    }

    /// Use an explicit streaming URL
    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = Some(url.into());
        self
    }

    /// Streaming URL in effect
    pub fn stream_url(&self) -> SdkResult<String> {
        match &self.stream_url {
            Some(url) => Ok(url.clone()),
            None => Ok(ws_url(&self.rest.base_url)?),
        }
    }

    /// Streaming settings with the URL filled in
    pub fn stream_config(&self) -> SdkResult<StreamConfig> {
        let mut stream = self.stream.clone();
        stream.url = self.stream_url()?;
        Ok(stream)
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> SdkResult<Option<Duration>> {
    let Some(raw) = lookup(name).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(|secs| Some(Duration::from_secs(secs)))
        .ok_or_else(|| SdkError::Config(format!("{name} must be a positive number of seconds, got {raw:?}")))
}
