//! Streaming session
//!
//! One task owns the transport and multiplexes four things with
//! `tokio::select!`: inbound frames, the heartbeat poll tick, commands from
//! [`SessionHandle`]s and cancellation. When the socket fails the task backs
//! off and reconnects, re-reading the shared token and re-signing the
//! handshake, then replays active subscriptions.

mod handle;
#[cfg(test)]
mod tests;

pub use handle::{RunningSession, SessionHandle};

use crate::events::{DisconnectReason, StreamEvent};
use crate::heartbeat::{Heartbeat, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HEARTBEAT_POLL};
use crate::reconnect::{Backoff, ReconnectConfig};
use crate::subscription::{affects_subscriptions, SubscriptionManager};
use crate::transport::{HandshakeHeaders, Transport, WsTransport, DEFAULT_CONNECT_TIMEOUT};

use cody_auth::{Credentials, TokenHandle};
use cody_types::{CodyError, CodyResult, MessageType, StreamMessage};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default streaming URL
pub const DEFAULT_WS_URL: &str = "wss://api.codyalgo.com/ws";

/// Default bound on command acknowledgement
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

const COMMAND_BUFFER: usize = 64;

/// Streaming connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connection in progress
    Connecting,
    /// Connected and ready
    Connected,
    /// Waiting to reconnect after a failure
    Reconnecting,
    /// Shutting down
    ShuttingDown,
}

/// Configuration for a streaming session
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket URL, ending in `/ws`
    pub url: String,
    /// Time between heartbeat frames
    pub heartbeat_interval: Duration,
    /// How often elapsed time is checked
    pub heartbeat_poll: Duration,
    /// Reconnection settings
    pub reconnect: ReconnectConfig,
    /// Handshake timeout
    pub connect_timeout: Duration,
    /// Bound on enqueueing a command and on its acknowledgement
    pub send_timeout: Duration,
    /// Replay subscriptions after reconnect
    pub restore_subscriptions: bool,
    /// Log frames at debug level when no handler is set
    pub log_messages: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_poll: DEFAULT_HEARTBEAT_POLL,
            reconnect: ReconnectConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            restore_subscriptions: true,
            log_messages: true,
        }
    }
}

impl StreamConfig {
    /// Config for an explicit WebSocket URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Config whose URL is derived from the REST base URL
    pub fn from_rest_base(base_url: &str) -> CodyResult<Self> {
        Ok(Self::new(crate::endpoint::ws_url(base_url)?))
    }

    /// Set heartbeat interval
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set heartbeat poll tick
    pub fn with_heartbeat_poll(mut self, poll: Duration) -> Self {
        self.heartbeat_poll = poll;
        self
    }

    /// Set reconnection policy
    pub fn with_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Disable automatic reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect = ReconnectConfig::disabled();
        self
    }

    /// Set handshake timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set command acknowledgement timeout
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Enable or disable subscription replay
    pub fn with_restore_subscriptions(mut self, enabled: bool) -> Self {
        self.restore_subscriptions = enabled;
        self
    }

    /// Enable or disable frame logging
    pub fn with_log_messages(mut self, enabled: bool) -> Self {
        self.log_messages = enabled;
        self
    }
}

/// Callback invoked with every received text frame
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

pub(crate) type Ack = oneshot::Sender<CodyResult<()>>;

pub(crate) enum Command {
    Publish {
        msg_type: MessageType,
        symbols: Vec<String>,
        ack: Ack,
    },
    Raw {
        text: String,
        ack: Ack,
    },
    Reconnect {
        ack: Ack,
    },
    Close {
        ack: Ack,
    },
}

impl Command {
    fn reject(self, error: CodyError) {
        let ack = match self {
            Self::Publish { ack, .. }
            | Self::Raw { ack, .. }
            | Self::Reconnect { ack }
            | Self::Close { ack } => ack,
        };
        let _ = ack.send(Err(error));
    }
}

enum Served {
    Closed,
    Reconnect,
    Failed(CodyError),
}

enum Wait {
    Retry,
    Stop,
}

/// A self-healing streaming connection
///
/// Build it, take the event receiver and handles you need, then
/// [`spawn`](Self::spawn) it or await [`run`](Self::run) directly.
pub struct StreamingSession<T: Transport> {
    config: StreamConfig,
    credentials: Arc<Credentials>,
    token: TokenHandle,
    transport: T,
    state: Arc<RwLock<ConnectionState>>,
    subscriptions: SubscriptionManager,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<StreamEvent>>,
    handler: Option<MessageHandler>,
    command_tx: mpsc::Sender<Command>,
    command_rx: mpsc::Receiver<Command>,
    cancel: CancellationToken,
    connections: u64,
    close_ack: Option<Ack>,
}

impl StreamingSession<WsTransport> {
    /// Session over a real WebSocket at `config.url`
    pub fn websocket(config: StreamConfig, credentials: Arc<Credentials>, token: TokenHandle) -> Self {
        let transport = WsTransport::new(config.url.clone()).with_timeout(config.connect_timeout);
        Self::new(config, credentials, token, transport)
    }
}

impl<T: Transport + 'static> StreamingSession<T> {
    /// Create a session over any transport
    pub fn new(
        config: StreamConfig,
        credentials: Arc<Credentials>,
        token: TokenHandle,
        transport: T,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

        Self {
            config,
            credentials,
            token,
            transport,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            subscriptions: SubscriptionManager::new(),
            events_tx,
            events_rx: Some(events_rx),
            handler: None,
            command_tx,
            command_rx,
            cancel: CancellationToken::new(),
            connections: 0,
            close_ack: None,
        }
    }

    /// Register a callback for received frames
    pub fn with_message_handler(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Bind the session to an external cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Take the event receiver (can only be called once)
    ///
    /// Events are discarded if nobody took the receiver before the session starts.
    /// With a message handler registered, frames are not published as
    /// [`StreamEvent::Message`]; the receiver then carries connection events only.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<StreamEvent>> {
        self.events_rx.take()
    }

    /// Handle for sending commands to the running session
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(
            self.command_tx.clone(),
            self.token.clone(),
            Arc::clone(&self.state),
            self.cancel.clone(),
            self.config.send_timeout,
        )
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Run the session on a new task
    pub fn spawn(self) -> RunningSession {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        RunningSession::new(handle, task)
    }

    /// Run until closed, cancelled, or reconnection gives up
    #[instrument(name = "stream_session", skip_all)]
    pub async fn run(mut self) -> CodyResult<()> {
        self.events_rx = None;
        let cancel = self.cancel.clone();
        let mut backoff = Backoff::new(self.config.reconnect.clone());

        let result = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }
            self.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                connected = self.connect() => connected,
            };

            let outcome = match connected {
                Ok(token) => {
                    backoff.reset();
                    self.serve(&token).await
                }
                Err(CodyError::TokenMissing) => {
                    error!("No session token, streaming requires a login");
                    self.emit(StreamEvent::ReconnectFailed {
                        error: CodyError::TokenMissing.to_string(),
                    });
                    break Err(CodyError::TokenMissing);
                }
                Err(e) => Served::Failed(e),
            };

            match outcome {
                Served::Closed => break Ok(()),
                Served::Reconnect => continue,
                Served::Failed(e) => {
                    if self.transport.is_connected() {
                        let _ = self.transport.close().await;
                    }

                    let Some(delay) = backoff.next_delay() else {
                        error!(
                            "Reconnection attempts exhausted after {} tries: {}",
                            backoff.attempt() + 1,
                            e
                        );
                        self.emit(StreamEvent::ReconnectFailed {
                            error: e.to_string(),
                        });
                        break Err(e);
                    };

                    let attempt = backoff.attempt();
                    warn!(
                        "Connection lost, reconnecting in {:?} (attempt {}): {}",
                        delay, attempt, e
                    );
                    self.set_state(ConnectionState::Reconnecting);
                    self.emit(StreamEvent::Reconnecting { attempt, delay });

                    match self.wait_backoff(delay).await {
                        Wait::Retry => continue,
                        Wait::Stop => break Ok(()),
                    }
                }
            }
        };

        self.finish().await;
        result
    }

    /// Handshake, then replay subscriptions; returns the token in use
    async fn connect(&mut self) -> CodyResult<String> {
        let token = self.token.get().ok_or(CodyError::TokenMissing)?;
        let headers = HandshakeHeaders::sign(&self.credentials, &token)?;
        let url = self.transport.endpoint().to_string();

        info!("Connecting to {}", url);
        self.transport
            .connect(&headers)
            .await
            .map_err(|e| e.into_cody(&url))?;

        self.connections += 1;
        self.set_state(ConnectionState::Connected);
        info!(connection = self.connections, "Streaming connection established");
        self.emit(StreamEvent::Connected {
            url,
            connection: self.connections,
        });

        if self.config.restore_subscriptions {
            let restore = self.subscriptions.restoration_messages(&token);
            for message in &restore {
                if let Err(e) = self.write(message).await {
                    self.report_send_failure(&e);
                    return Err(e);
                }
            }
            if !restore.is_empty() {
                debug!(count = restore.len(), "Subscriptions restored");
                self.emit(StreamEvent::SubscriptionsRestored {
                    count: restore.len(),
                });
            }
        }

        Ok(token)
    }

    async fn serve(&mut self, token: &str) -> Served {
        let cancel = self.cancel.clone();
        let start = Instant::now();
        let mut heartbeat = Heartbeat::new(self.config.heartbeat_interval, start);
        let poll = self.config.heartbeat_poll;
        let mut ticker = interval_at(start + poll, poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Served::Closed,

                frame = self.transport.recv() => match frame {
                    Ok(Some(text)) => self.dispatch(text),
                    Ok(None) => {
                        info!("Server closed connection");
                        self.emit(StreamEvent::Disconnected {
                            reason: DisconnectReason::ServerClosed,
                        });
                        return Served::Failed(CodyError::WebSocket(
                            "Server closed connection".into(),
                        ));
                    }
                    Err(e) => {
                        warn!("Streaming receive failed: {}", e);
                        self.emit(StreamEvent::Disconnected {
                            reason: DisconnectReason::NetworkError(e.to_string()),
                        });
                        return Served::Failed(e.into_cody(&self.config.url));
                    }
                },

                tick = ticker.tick() => {
                    if heartbeat.poll(tick) {
                        if let Err(e) = self.write(&StreamMessage::heartbeat(token)).await {
                            return self.send_failed(e);
                        }
                        debug!("Heartbeat sent");
                        self.emit(StreamEvent::HeartbeatSent);
                    }
                },

                Some(command) = self.command_rx.recv() => {
                    if let Some(outcome) = self.handle_command(command, token).await {
                        return outcome;
                    }
                },
            }
        }
    }

    async fn handle_command(&mut self, command: Command, token: &str) -> Option<Served> {
        match command {
            Command::Publish {
                msg_type,
                symbols,
                ack,
            } => {
                let message = StreamMessage::new(token, msg_type, symbols);
                match self.write(&message).await {
                    Ok(()) => {
                        self.subscriptions.apply(&message);
                        let _ = ack.send(Ok(()));
                        None
                    }
                    Err(e) => {
                        let outcome = self.send_failed(CodyError::WebSocket(e.to_string()));
                        let _ = ack.send(Err(e));
                        Some(outcome)
                    }
                }
            }
            Command::Raw { text, ack } => match self.send_text(&text).await {
                Ok(()) => {
                    let _ = ack.send(Ok(()));
                    None
                }
                Err(e) => {
                    let outcome = self.send_failed(CodyError::WebSocket(e.to_string()));
                    let _ = ack.send(Err(e));
                    Some(outcome)
                }
            },
            Command::Reconnect { ack } => {
                info!("Reconnect requested");
                if let Err(e) = self.transport.close().await {
                    debug!("Close before reconnect failed: {}", e);
                }
                self.emit(StreamEvent::Disconnected {
                    reason: DisconnectReason::Requested,
                });
                let _ = ack.send(Ok(()));
                Some(Served::Reconnect)
            }
            Command::Close { ack } => {
                self.close_ack = Some(ack);
                Some(Served::Closed)
            }
        }
    }

    /// Sleep before the next attempt while still serving commands
    async fn wait_backoff(&mut self, delay: Duration) -> Wait {
        let cancel = self.cancel.clone();
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Wait::Stop,
                _ = &mut sleep => return Wait::Retry,
                command = self.command_rx.recv() => match command {
                    Some(Command::Close { ack }) => {
                        self.close_ack = Some(ack);
                        return Wait::Stop;
                    }
                    Some(Command::Reconnect { ack }) => {
                        let _ = ack.send(Ok(()));
                        return Wait::Retry;
                    }
                    Some(Command::Publish { msg_type, symbols, ack })
                        if self.config.restore_subscriptions && affects_subscriptions(msg_type) =>
                    {
                        // replayed on the next connection
                        self.subscriptions
                            .apply(&StreamMessage::new("", msg_type, symbols));
                        let _ = ack.send(Ok(()));
                    }
                    Some(other) => other.reject(CodyError::WebSocket("not connected".into())),
                    None => return Wait::Stop,
                },
            }
        }
    }

    async fn finish(&mut self) {
        self.set_state(ConnectionState::ShuttingDown);

        if self.transport.is_connected() {
            if let Err(e) = self.transport.close().await {
                debug!("Close failed: {}", e);
            }
            self.emit(StreamEvent::Disconnected {
                reason: DisconnectReason::Shutdown,
            });
        }

        self.cancel.cancel();
        self.command_rx.close();
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                Command::Close { ack } => {
                    let _ = ack.send(Ok(()));
                }
                other => other.reject(CodyError::ShuttingDown),
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!("Streaming session closed");
        self.emit(StreamEvent::Closed);

        if let Some(ack) = self.close_ack.take() {
            let _ = ack.send(Ok(()));
        }
    }

    /// Frames go to the handler when one is set, otherwise onto the event channel
    fn dispatch(&self, text: String) {
        if let Some(handler) = &self.handler {
            handler(&text);
            return;
        }
        if self.config.log_messages {
            debug!(len = text.len(), "Received: {}", text);
        }
        self.emit(StreamEvent::Message(text));
    }

    fn send_failed(&self, error: CodyError) -> Served {
        self.report_send_failure(&error);
        Served::Failed(error)
    }

    fn report_send_failure(&self, error: &CodyError) {
        warn!("Streaming send failed: {}", error);
        self.emit(StreamEvent::Disconnected {
            reason: DisconnectReason::SendFailed(error.to_string()),
        });
    }

    async fn write(&mut self, message: &StreamMessage) -> CodyResult<()> {
        let json = message.to_json()?;
        self.send_text(&json).await
    }

    async fn send_text(&mut self, text: &str) -> CodyResult<()> {
        let url = self.transport.endpoint().to_string();
        self.transport
            .send(text)
            .await
            .map_err(|e| e.into_cody(&url))
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    fn emit(&self, event: StreamEvent) {
        let _ = self.events_tx.send(event);
    }
}

impl<T: Transport> std::fmt::Debug for StreamingSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingSession")
            .field("url", &self.config.url)
            .field("state", &*self.state.read())
            .field("connections", &self.connections)
            .field("subscriptions", &self.subscriptions.count())
            .finish()
    }
}
