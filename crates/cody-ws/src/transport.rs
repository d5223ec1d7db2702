//! WebSocket transport abstraction
//!
//! The streaming session talks to the socket only through [`Transport`],
//! so the reconnect and heartbeat logic can be driven by [`MockTransport`]
//! in tests.
//!
//! # Example
//!
//! ```no_run
//! use cody_auth::Credentials;
//! use cody_ws::transport::{HandshakeHeaders, Transport, WsTransport};
//!
//! async fn example(creds: &Credentials, token: &str) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut transport = WsTransport::new("wss://api.codyalgo.com/ws");
//!     let headers = HandshakeHeaders::sign(creds, token)?;
//!     transport.connect(&headers).await?;
//!     if let Some(frame) = transport.recv().await? {
//!         println!("Received: {}", frame);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use cody_auth::{Credentials, RequestSigner};
use cody_types::{CodyError, CodyResult};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

use crate::endpoint::WS_PATH;

/// Default handshake timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport layer errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout
    #[error("connection timeout after {0:?}")]
    Timeout(Duration),

    /// Not connected
    #[error("not connected")]
    NotConnected,

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Convert into the public error type, attributing it to `url`
    pub fn into_cody(self, url: &str) -> CodyError {
        match self {
            Self::ConnectionFailed(reason) => CodyError::ConnectionFailed {
                url: url.to_string(),
                reason,
            },
            Self::Timeout(timeout) => CodyError::ConnectionTimeout {
                url: url.to_string(),
                timeout,
            },
            Self::ConnectionClosed | Self::NotConnected => CodyError::ConnectionFailed {
                url: url.to_string(),
                reason: self.to_string(),
            },
            other => CodyError::WebSocket(other.to_string()),
        }
    }
}

/// Headers for the signed WebSocket upgrade
///
/// The signature covers `clientKey|/ws||timestamp`. The token goes in
/// `Authorization` as-is, without a `Bearer` prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct HandshakeHeaders {
    /// `X-ClientKey`
    pub client_key: String,
    /// `Authorization`
    pub token: String,
    /// `X-Signature`
    pub signature: String,
    /// `X-Timestamp`
    pub timestamp: String,
}

impl HandshakeHeaders {
    /// Sign a handshake at the current time
    pub fn sign(credentials: &Credentials, token: &str) -> CodyResult<Self> {
        Self::from_signer(RequestSigner::new(credentials, WS_PATH), token)
    }

    /// Sign a handshake at a fixed timestamp
    pub fn sign_at(credentials: &Credentials, token: &str, timestamp: &str) -> CodyResult<Self> {
        Self::from_signer(
            RequestSigner::new(credentials, WS_PATH).with_timestamp(timestamp),
            token,
        )
    }

    fn from_signer(signer: RequestSigner<'_>, token: &str) -> CodyResult<Self> {
        let client_key = signer.client_key().to_string();
        let signed = signer
            .sign("")
            .map_err(|e| CodyError::auth_failed(e.to_string()))?;

        Ok(Self {
            client_key,
            token: token.to_string(),
            signature: signed.signature,
            timestamp: signed.timestamp,
        })
    }

    /// Header name/value pairs in the order they are sent
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("X-ClientKey", self.client_key.as_str()),
            ("Authorization", self.token.as_str()),
            ("X-Signature", self.signature.as_str()),
            ("X-Timestamp", self.timestamp.as_str()),
        ]
    }
}

impl std::fmt::Debug for HandshakeHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeHeaders")
            .field("client_key", &self.client_key)
            .field("token", &"[REDACTED]")
            .field("signature", &self.signature)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Trait for WebSocket transport abstraction
///
/// This trait enables unit testing of connection logic by allowing
/// mock implementations to be injected instead of real WebSocket connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the WebSocket endpoint with signed upgrade headers
    async fn connect(&mut self, headers: &HandshakeHeaders) -> Result<(), TransportError>;

    /// Send a text message
    async fn send(&mut self, message: &str) -> Result<(), TransportError>;

    /// Receive a text message
    ///
    /// Returns `None` if the connection was closed gracefully.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;

    /// Close the connection gracefully
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if currently connected
    fn is_connected(&self) -> bool;

    /// Get the endpoint URL
    fn endpoint(&self) -> &str;
}

/// Real WebSocket transport using tokio-tungstenite
pub struct WsTransport {
    url: String,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    connect_timeout: Duration,
}

impl WsTransport {
    /// Create a new WebSocket transport
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("url", &self.url)
            .field("connected", &self.stream.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[async_trait]
impl Transport for WsTransport {
    #[instrument(skip(self, headers), fields(url = %self.url))]
    async fn connect(&mut self, headers: &HandshakeHeaders) -> Result<(), TransportError> {
        debug!("Connecting to WebSocket");

        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        for (name, value) in headers.pairs() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Protocol(e.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| TransportError::Protocol(e.to_string()))?;
            request.headers_mut().insert(name, value);
        }

        let (ws_stream, _response) = timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        self.stream = Some(ws_stream);
        debug!("WebSocket connected");
        Ok(())
    }

    #[instrument(skip(self, message), fields(len = message.len()))]
    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        stream
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data)
                        .map(Some)
                        .map_err(|e| TransportError::Protocol(e.to_string()));
                }
                Some(Ok(Message::Close(_))) => {
                    self.stream = None;
                    return Ok(None);
                }
                // tungstenite answers pings itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.stream = None;
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .close(None)
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockFrame, MockHandle, MockTransport};

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// A scripted server-side event
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MockFrame {
        /// Text frame delivered to `recv`
        Text(String),
        /// Server closes the connection
        Close,
        /// Receive fails with this message
        Error(String),
    }

    #[derive(Debug, Default)]
    struct MockState {
        scripts: VecDeque<Vec<MockFrame>>,
        frames: VecDeque<MockFrame>,
        connected: bool,
        fail_connects: u32,
        fail_sends: u32,
        connect_attempts: usize,
        connect_count: usize,
        close_count: usize,
        handshakes: Vec<HandshakeHeaders>,
        sent: Vec<String>,
    }

    /// Mock transport for testing
    ///
    /// Each successful `connect` consumes the next script pushed with
    /// [`MockHandle::push_connection`]. Without a script the connection
    /// stays open and silent until frames are pushed.
    #[derive(Debug)]
    pub struct MockTransport {
        url: String,
        state: Arc<Mutex<MockState>>,
        notify: Arc<Notify>,
    }

    /// Inspection and scripting handle that outlives the moved transport
    #[derive(Debug, Clone)]
    pub struct MockHandle {
        state: Arc<Mutex<MockState>>,
        notify: Arc<Notify>,
    }

    impl MockTransport {
        /// Create a new mock transport
        pub fn new(url: impl Into<String>) -> Self {
            Self {
                url: url.into(),
                state: Arc::new(Mutex::new(MockState::default())),
                notify: Arc::new(Notify::new()),
            }
        }

        /// Handle sharing this transport's state
        pub fn handle(&self) -> MockHandle {
            MockHandle {
                state: Arc::clone(&self.state),
                notify: Arc::clone(&self.notify),
            }
        }
    }

    impl MockHandle {
        /// Frames for the next connection
        pub fn push_connection(&self, frames: impl IntoIterator<Item = MockFrame>) {
            self.state.lock().scripts.push_back(frames.into_iter().collect());
        }

        /// Append a frame to the live connection
        pub fn push_frame(&self, frame: MockFrame) {
            self.state.lock().frames.push_back(frame);
            self.notify.notify_one();
        }

        /// Shorthand for pushing a text frame
        pub fn push_text(&self, text: impl Into<String>) {
            self.push_frame(MockFrame::Text(text.into()));
        }

        /// Fail the next `n` connect attempts
        pub fn fail_next_connects(&self, n: u32) {
            self.state.lock().fail_connects = n;
        }

        /// Fail the next `n` sends
        pub fn fail_next_sends(&self, n: u32) {
            self.state.lock().fail_sends = n;
        }

        /// Connect calls, including failed ones
        pub fn connect_attempts(&self) -> usize {
            self.state.lock().connect_attempts
        }

        /// Successful connects
        pub fn connect_count(&self) -> usize {
            self.state.lock().connect_count
        }

        /// Calls to `close`
        pub fn close_count(&self) -> usize {
            self.state.lock().close_count
        }

        /// Whether the mock is currently connected
        pub fn is_connected(&self) -> bool {
            self.state.lock().connected
        }

        /// Headers of every connect attempt
        pub fn handshakes(&self) -> Vec<HandshakeHeaders> {
            self.state.lock().handshakes.clone()
        }

        /// Raw frames written by the client
        pub fn sent(&self) -> Vec<String> {
            self.state.lock().sent.clone()
        }

        /// Written frames parsed as stream messages; unparseable frames are skipped
        pub fn sent_messages(&self) -> Vec<cody_types::StreamMessage> {
            self.state
                .lock()
                .sent
                .iter()
                .filter_map(|raw| serde_json::from_str(raw).ok())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&mut self, headers: &HandshakeHeaders) -> Result<(), TransportError> {
            let mut state = self.state.lock();
            state.connect_attempts += 1;
            state.handshakes.push(headers.clone());

            if state.fail_connects > 0 {
                state.fail_connects -= 1;
                return Err(TransportError::ConnectionFailed(
                    "mock connection failure".into(),
                ));
            }

            let script = state.scripts.pop_front().unwrap_or_default();
            state.frames = script.into();
            state.connected = true;
            state.connect_count += 1;
            Ok(())
        }

        async fn send(&mut self, message: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(TransportError::NotConnected);
            }
            if state.fail_sends > 0 {
                state.fail_sends -= 1;
                return Err(TransportError::SendFailed("mock send failure".into()));
            }
            state.sent.push(message.to_string());
            Ok(())
        }

        async fn recv(&mut self) -> Result<Option<String>, TransportError> {
            loop {
                {
                    let mut state = self.state.lock();
                    if !state.connected {
                        return Err(TransportError::NotConnected);
                    }
                    match state.frames.pop_front() {
                        Some(MockFrame::Text(text)) => return Ok(Some(text)),
                        Some(MockFrame::Close) => {
                            state.connected = false;
                            return Ok(None);
                        }
                        Some(MockFrame::Error(reason)) => {
                            state.connected = false;
                            return Err(TransportError::ReceiveFailed(reason));
                        }
                        None => {}
                    }
                }
                self.notify.notified().await;
            }
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            let mut state = self.state.lock();
            state.connected = false;
            state.close_count += 1;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.state.lock().connected
        }

        fn endpoint(&self) -> &str {
            &self.url
        }
    }
}
