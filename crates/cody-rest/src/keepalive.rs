//! Session keep-alive loop
//!
//! An idle session expires on the server. While a token is held, the loop
//! issues one authenticated sub-account listing per interval and throws the
//! result away. Failures are logged and the loop keeps going until its
//! cancellation token fires.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::RestClient;

/// Default keep-alive interval
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Keep-alive configuration
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// Time between refresh calls
    pub interval: Duration,
    /// Disable the loop entirely
    pub enabled: bool,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_KEEPALIVE_INTERVAL,
            enabled: true,
        }
    }
}

impl KeepAliveConfig {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Disable the loop
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Result of one keep-alive cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveOutcome {
    /// No token held, nothing sent
    Skipped,
    /// Refresh call succeeded
    Refreshed,
    /// Refresh call failed
    Failed {
        /// Status of the failed call, if a response arrived
        status: Option<u16>,
    },
}

/// Run one keep-alive cycle
pub async fn keep_alive_tick(client: &RestClient) -> KeepAliveOutcome {
    if !client.is_authenticated() {
        debug!("No session token, skipping keep-alive");
        return KeepAliveOutcome::Skipped;
    }

    let response = client.portfolio().sub_accounts().await;
    if response.is_success() {
        debug!("Session refreshed");
        KeepAliveOutcome::Refreshed
    } else {
        let status = response.status();
        warn!(?status, "Session refresh failed");
        KeepAliveOutcome::Failed { status }
    }
}

/// Spawn the keep-alive loop
///
/// The loop sleeps first, then runs one cycle, and exits promptly once
/// `cancel` is triggered, including mid-sleep and mid-request.
pub fn spawn_keep_alive(
    client: Arc<RestClient>,
    config: KeepAliveConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            debug!("Keep-alive disabled");
            return;
        }
        info!(interval = ?config.interval, "Keep-alive loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(config.interval) => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = keep_alive_tick(&client) => {}
            }
        }

        info!("Keep-alive loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = KeepAliveConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert!(config.enabled);
        assert!(!KeepAliveConfig::disabled().enabled);
    }

    #[test]
    fn test_config_builder() {
        let config = KeepAliveConfig::new().with_interval(Duration::from_secs(5));
        assert_eq!(config.interval, Duration::from_secs(5));
    }
}
