//! Signed REST client
//!
//! All HTTP calls to the trading API go through [`RestClient::post`], which
//! serializes the payload once, signs exactly those bytes, waits on the
//! throttle and sends.

use cody_auth::{Credentials, TokenHandle, TokenStore, DEFAULT_TOKEN_FILE};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::endpoints::{FutureEndpoints, PortfolioEndpoints, StockEndpoints};
use crate::error::{RestError, RestResult};
use crate::response::{ApiFailure, ApiResponse, FailureKind, OtpChallenge, SessionRestore};
use crate::throttle::{Throttle, DEFAULT_THROTTLE_INTERVAL};

/// Production API host
pub const DEFAULT_BASE_URL: &str = "https://api.codyalgo.com";

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Content type sent and accepted on every request
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Header carrying the client key
pub const HEADER_CLIENT_KEY: &str = "X-ClientKey";
/// Header carrying the Unix-second timestamp
pub const HEADER_TIMESTAMP: &str = "X-Timestamp";
/// Header carrying the request signature
pub const HEADER_SIGNATURE: &str = "X-Signature";

const SEND_OTP_PATH: &str = "Identity/SendOtp";
const LOGIN_PATH: &str = "Identity/Login";

/// Signed client for the trading REST API
///
/// Owns the session token (shared through [`TokenHandle`]), its on-disk
/// record and the request throttle.
///
/// # Example
///
/// ```no_run
/// use cody_auth::Credentials;
/// use cody_rest::{RestClient, RestConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let creds = Arc::new(Credentials::from_env()?);
///     let client = RestClient::new(RestConfig::default(), creds)?;
///
///     // Reuse a saved session if it is still live
///     if !client.restore_session().await.is_authenticated() {
///         let challenge = client.send_otp("user", "password").await?;
///         client.login(&challenge.token, "123456").await?;
///     }
///
///     let accounts = client.portfolio().sub_accounts().await;
///     println!("{:?}", accounts.json());
///     Ok(())
/// }
/// ```
pub struct RestClient {
    http: Client,
    base_url: String,
    credentials: Arc<Credentials>,
    token: TokenHandle,
    store: TokenStore,
    throttle: Throttle,
}

impl RestClient {
    /// Create a client from configuration
    ///
    /// Does not touch the token record; call [`restore_session`](Self::restore_session)
    /// to load and validate a saved session.
    pub fn new(config: RestConfig, credentials: Arc<Credentials>) -> RestResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RestError::Configuration(format!(
                "base URL must be http(s): {}",
                config.base_url
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_deref().unwrap_or(concat!(
                "cody-rest/",
                env!("CARGO_PKG_VERSION")
            )))
            .build()?;

        info!(base_url = %base_url, "Created Cody REST client");

        Ok(Self {
            http,
            base_url,
            credentials,
            token: TokenHandle::new(),
            store: TokenStore::new(config.token_file),
            throttle: Throttle::new(config.throttle_interval),
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Credentials used for signing
    pub fn credentials(&self) -> &Arc<Credentials> {
        &self.credentials
    }

    /// Shared handle to the session token
    pub fn token(&self) -> &TokenHandle {
        &self.token
    }

    /// Check if a session token is held
    pub fn is_authenticated(&self) -> bool {
        self.token.is_present()
    }

    // ========================================================================
    // Core Request
    // ========================================================================

    /// Send a signed POST request
    ///
    /// `endpoint` may omit the leading `/`. The bearer token is attached only
    /// when `require_auth` is set and a token is held. Never returns `Err`:
    /// non-200 statuses and transport errors come back as
    /// [`ApiResponse::Failure`].
    #[instrument(skip(self, payload), fields(path = tracing::field::Empty))]
    pub async fn post<P: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        payload: &P,
        require_auth: bool,
    ) -> ApiResponse {
        let path = normalize_path(endpoint);
        tracing::Span::current().record("path", path.as_str());

        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to serialize request payload");
                return ApiResponse::Failure(ApiFailure::new(FailureKind::Encode, None, e.to_string()));
            }
        };

        self.throttle.wait().await;

        let signed = match self.credentials.sign_request(path, body) {
            Ok(signed) => signed,
            Err(e) => {
                warn!(error = %e, "Failed to sign request");
                return ApiResponse::Failure(ApiFailure::new(FailureKind::Encode, None, e.to_string()));
            }
        };

        let url = format!("{}{}", self.base_url, signed.path);
        let sensitive = signed.path.starts_with("/Identity/");
        let mut request = self
            .http
            .post(&url)
            .header(HEADER_CLIENT_KEY, self.credentials.client_key())
            .header(HEADER_TIMESTAMP, signed.timestamp.as_str())
            .header(HEADER_SIGNATURE, signed.signature.as_str())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(ACCEPT, JSON_CONTENT_TYPE);

        if require_auth {
            if let Some(token) = self.token.get() {
                request = request.header(AUTHORIZATION, format!("Bearer {token}"));
            }
        }

        let response = match request.body(signed.body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Request failed before a response arrived");
                return ApiResponse::Failure(ApiFailure::from_reqwest(&e));
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(status, error = %e, "Failed to read response body");
                return ApiResponse::Failure(ApiFailure::from_reqwest(&e));
            }
        };

        if status != 200 {
            info!(status, "Request returned non-success status");
            debug!(response = %text, "Failed request detail");
            return ApiResponse::Failure(ApiFailure::status(status, Some(text)));
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                info!(status, "Request succeeded");
                if !sensitive {
                    debug!(response = %value, "Response detail");
                }
                ApiResponse::Success(value)
            }
            Err(e) => {
                warn!(error = %e, "Response body is not valid JSON");
                ApiResponse::Failure(
                    ApiFailure::new(FailureKind::Decode, Some(status), e.to_string()).with_body(text),
                )
            }
        }
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Request a one-time code for step-up login
    ///
    /// Sent without a bearer token. The returned challenge token is passed
    /// to [`login`](Self::login) together with the code the user received.
    #[instrument(skip(self, password))]
    pub async fn send_otp(&self, internet_user: &str, password: &str) -> RestResult<OtpChallenge> {
        let response = self
            .post(
                SEND_OTP_PATH,
                &OtpRequest {
                    internet_user,
                    password,
                },
                false,
            )
            .await
            .into_result()?;

        let token = extract_str(&response, "token")?;
        debug!("OTP challenge issued");
        Ok(OtpChallenge { token, response })
    }

    /// Complete login with a challenge token and one-time code
    ///
    /// On success the session token is stored in memory and persisted before
    /// the raw response is returned.
    #[instrument(skip_all)]
    pub async fn login(&self, challenge_token: &str, otp: &str) -> RestResult<Value> {
        let response = self
            .post(
                LOGIN_PATH,
                &LoginRequest {
                    token: challenge_token,
                    otp,
                },
                false,
            )
            .await
            .into_result()?;

        let jwt = extract_str(&response, "jwtToken")?;
        self.token.set(jwt.as_str());
        self.store.save(&jwt)?;

        info!("Login successful, session token stored");
        Ok(response)
    }

    /// Load the saved session token and validate it
    ///
    /// Validation is a single authenticated sub-account listing. Any
    /// non-success discards the token in memory and on disk, including a
    /// 200 whose body `statusCode` is not 200.
    #[instrument(skip(self))]
    pub async fn restore_session(&self) -> SessionRestore {
        let Some(saved) = self.store.load() else {
            debug!("No saved session token");
            return SessionRestore::NoSavedToken;
        };

        self.token.set(saved);
        let response = self.portfolio().sub_accounts().await;
        if response.is_accepted() {
            info!("Saved session token restored");
            return SessionRestore::Restored;
        }

        let status = response.body_status().or_else(|| response.status());
        warn!(?status, "Saved session token rejected, discarding");
        self.invalidate_session();
        SessionRestore::Invalidated { status }
    }

    /// Drop the session token from memory and storage
    pub fn invalidate_session(&self) {
        self.token.clear();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to remove token record");
        }
    }

    // ========================================================================
    // Endpoint Groups
    // ========================================================================

    /// Portfolio endpoints
    pub fn portfolio(&self) -> PortfolioEndpoints<'_> {
        PortfolioEndpoints::new(self)
    }

    /// Stock order endpoints
    pub fn stock(&self) -> StockEndpoints<'_> {
        StockEndpoints::new(self)
    }

    /// Futures order endpoints
    pub fn future(&self) -> FutureEndpoints<'_> {
        FutureEndpoints::new(self)
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OtpRequest<'a> {
    internet_user: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    token: &'a str,
    otp: &'a str,
}

/// Prefix `/` if missing
fn normalize_path(endpoint: &str) -> String {
    if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    }
}

/// Read `data.<field>` as a non-empty string
fn extract_str(response: &Value, field: &str) -> RestResult<String> {
    response
        .get("data")
        .and_then(|data| data.get(field))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RestError::Parse(format!("response has no data.{field}")))
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// REST base URL
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Minimum spacing between requests
    pub throttle_interval: Duration,
    /// Path of the token record
    pub token_file: PathBuf,
    /// Custom user agent
    pub user_agent: Option<String>,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            throttle_interval: DEFAULT_THROTTLE_INTERVAL,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            user_agent: None,
        }
    }
}

impl RestConfig {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set throttle interval
    pub fn with_throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }

    /// Set token record path
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = path.into();
        self
    }

    /// Set user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}
