//! Command bridge into a running session

use super::{Ack, Command, ConnectionState};
use crate::subscription::affects_subscriptions;

use cody_auth::TokenHandle;
use cody_types::{normalize_symbols, CodyError, CodyResult, Feed, MessageType};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cloneable handle to a streaming session
///
/// Every call enqueues a command for the session task and waits for its
/// acknowledgement. Both steps are bounded by the session's send timeout.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    token: TokenHandle,
    state: Arc<RwLock<ConnectionState>>,
    cancel: CancellationToken,
    send_timeout: Duration,
}

impl SessionHandle {
    pub(super) fn new(
        command_tx: mpsc::Sender<Command>,
        token: TokenHandle,
        state: Arc<RwLock<ConnectionState>>,
        cancel: CancellationToken,
        send_timeout: Duration,
    ) -> Self {
        Self {
            command_tx,
            token,
            state,
            cancel,
            send_timeout,
        }
    }

    /// Subscribe to `feed` for `symbols`
    ///
    /// Symbols are trimmed; an empty list is rejected.
    pub async fn subscribe(
        &self,
        feed: Feed,
        symbols: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> CodyResult<()> {
        self.send(feed.subscribe(), symbols).await
    }

    /// Unsubscribe from `feed` for `symbols`
    pub async fn unsubscribe(
        &self,
        feed: Feed,
        symbols: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> CodyResult<()> {
        self.send(feed.unsubscribe(), symbols).await
    }

    /// Send a frame of any type with the session's current token
    pub async fn send(
        &self,
        msg_type: MessageType,
        symbols: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> CodyResult<()> {
        let symbols = normalize_symbols(symbols);
        if affects_subscriptions(msg_type) && symbols.is_empty() {
            return Err(CodyError::Configuration(format!(
                "{msg_type} requires at least one symbol"
            )));
        }

        self.request(|ack| Command::Publish {
            msg_type,
            symbols,
            ack,
        })
        .await
    }

    /// Write a raw text frame
    pub async fn send_raw(&self, text: impl Into<String>) -> CodyResult<()> {
        let text = text.into();
        self.request(|ack| Command::Raw { text, ack }).await
    }

    /// Drop the current connection and connect again
    pub async fn reconnect(&self) -> CodyResult<()> {
        self.request(|ack| Command::Reconnect { ack }).await
    }

    /// Replace the shared session token and reconnect with it
    pub async fn rebind_token(&self, token: impl Into<String>) -> CodyResult<()> {
        self.token.set(token);
        self.reconnect().await
    }

    /// Stop the session; succeeds if it already stopped
    pub async fn close(&self) -> CodyResult<()> {
        match self.request(|ack| Command::Close { ack }).await {
            Err(CodyError::ShuttingDown | CodyError::ChannelClosed) => Ok(()),
            other => other,
        }
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Check if the session has stopped or is stopping
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn request(&self, make: impl FnOnce(Ack) -> Command) -> CodyResult<()> {
        if self.cancel.is_cancelled() {
            return Err(CodyError::ShuttingDown);
        }

        let send_timeout = self.send_timeout;
        let (tx, rx) = oneshot::channel();

        timeout(send_timeout, self.command_tx.send(make(tx)))
            .await
            .map_err(|_| CodyError::SendTimeout {
                timeout: send_timeout,
            })?
            .map_err(|_| CodyError::ChannelClosed)?;

        match timeout(send_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CodyError::ChannelClosed),
            Err(_) => Err(CodyError::SendTimeout {
                timeout: send_timeout,
            }),
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

/// A session running on its own task
pub struct RunningSession {
    handle: SessionHandle,
    task: JoinHandle<CodyResult<()>>,
}

impl RunningSession {
    pub(super) fn new(handle: SessionHandle, task: JoinHandle<CodyResult<()>>) -> Self {
        Self { handle, task }
    }

    /// Handle for sending commands
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Check if the session task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end on its own
    pub async fn join(self) -> CodyResult<()> {
        self.task
            .await
            .map_err(|e| CodyError::WebSocket(format!("session task failed: {e}")))?
    }

    /// Cancel the session and wait at most `timeout` for it to stop
    ///
    /// Returns the session's final result. On expiry the task is aborted.
    pub async fn shutdown(self, timeout: Duration) -> CodyResult<()> {
        self.handle.cancel.cancel();
        let mut task = self.task;

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => {
                joined.map_err(|e| CodyError::WebSocket(format!("session task failed: {e}")))?
            }
            Err(_) => {
                warn!("Streaming session did not stop within {:?}, aborting", timeout);
                task.abort();
                Err(CodyError::ShutdownTimeout { timeout })
            }
        }
    }
}

impl std::fmt::Debug for RunningSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningSession")
            .field("handle", &self.handle)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
