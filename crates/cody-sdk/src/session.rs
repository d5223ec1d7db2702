//! Process-wide API session
//!
//! A [`Session`] owns the signed REST client, validates any saved token at
//! startup, runs the keep-alive loop, and builds streaming sessions that
//! share its token.

use crate::config::SdkConfig;
use crate::error::{SdkError, SdkResult};

use cody_auth::TokenHandle;
use cody_rest::{spawn_keep_alive, OtpChallenge, RestClient, SessionRestore};
use cody_ws::{StreamConfig, StreamingSession, Transport, WsTransport};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Authenticated API session
///
/// Construct once with [`Session::start`] and share it by reference or
/// `Arc`. Dropping it stops the keep-alive loop and any streaming session
/// it created; [`shutdown`](Self::shutdown) does the same with a bounded wait.
pub struct Session {
    rest: Arc<RestClient>,
    config: SdkConfig,
    restore: SessionRestore,
    cancel: CancellationToken,
    keep_alive: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Build the REST client, restore a saved token and start keep-alive
    #[instrument(skip_all, fields(base_url = %config.rest.base_url))]
    pub async fn start(config: SdkConfig) -> SdkResult<Self> {
        let credentials = Arc::new(config.credentials.clone());
        let rest = Arc::new(RestClient::new(config.rest.clone(), credentials)?);

        let restore = rest.restore_session().await;
        match restore {
            SessionRestore::Restored => info!("Session restored from saved token"),
            SessionRestore::NoSavedToken => info!("No saved session, login required"),
            SessionRestore::Invalidated { status } => {
                warn!(?status, "Saved session rejected, login required")
            }
        }

        let cancel = CancellationToken::new();
        let keep_alive = spawn_keep_alive(
            Arc::clone(&rest),
            config.keep_alive.clone(),
            cancel.child_token(),
        );

        Ok(Self {
            rest,
            config,
            restore,
            cancel,
            keep_alive: Mutex::new(Some(keep_alive)),
        })
    }

    /// Signed REST client
    pub fn rest(&self) -> &Arc<RestClient> {
        &self.rest
    }

    /// Configuration the session was started with
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Outcome of the startup token validation
    pub fn restore_status(&self) -> SessionRestore {
        self.restore
    }

    /// Shared session token
    pub fn token(&self) -> &TokenHandle {
        self.rest.token()
    }

    /// Check if a session token is held
    pub fn is_authenticated(&self) -> bool {
        self.rest.is_authenticated()
    }

    /// First login step: request a one-time code
    pub async fn send_otp(&self, internet_user: &str, password: &str) -> SdkResult<OtpChallenge> {
        Ok(self.rest.send_otp(internet_user, password).await?)
    }

    /// Second login step: exchange the code for a session token
    pub async fn login(&self, challenge: &OtpChallenge, otp: &str) -> SdkResult<Value> {
        Ok(self.rest.login(&challenge.token, otp).await?)
    }

    /// Discard the session token in memory and on disk
    pub fn logout(&self) {
        self.rest.invalidate_session();
    }

    /// Streaming settings with the URL in effect
    pub fn stream_config(&self) -> SdkResult<StreamConfig> {
        self.config.stream_config()
    }

    /// Streaming session over a real WebSocket
    ///
    /// The session reads the shared token each time it connects, so it
    /// can be created before login but must not be run until a token is held.
    pub fn streaming(&self) -> SdkResult<StreamingSession<WsTransport>> {
        let config = self.stream_config()?;
        let session = StreamingSession::websocket(
            config,
            Arc::clone(self.rest.credentials()),
            self.rest.token().clone(),
        );
        Ok(session.with_cancellation(self.cancel.child_token()))
    }

    /// Streaming session over a caller-supplied transport
    pub fn streaming_with_transport<T: Transport + 'static>(
        &self,
        transport: T,
    ) -> SdkResult<StreamingSession<T>> {
        let session = StreamingSession::new(
            self.stream_config()?,
            Arc::clone(self.rest.credentials()),
            self.rest.token().clone(),
            transport,
        );
        Ok(session.with_cancellation(self.cancel.child_token()))
    }

    /// Check if shutdown has been requested
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop background work, waiting at most `timeout` for the keep-alive task
    ///
    /// Streaming sessions created from this session are cancelled too; join
    /// them through their own [`RunningSession`](cody_ws::RunningSession).
    pub async fn shutdown(&self, timeout: Duration) -> SdkResult<()> {
        self.cancel.cancel();

        let task = self.keep_alive.lock().take();
        let Some(mut task) = task else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => {
                info!("Session shut down");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("Keep-alive task ended abnormally: {}", e);
                Ok(())
            }
            Err(_) => {
                warn!("Keep-alive task did not stop within {:?}, aborting", timeout);
                task.abort();
                Err(SdkError::ShutdownTimeout { timeout })
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("rest", &self.rest)
            .field("restore", &self.restore)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
