//! API credentials and request signing
//!
//! Every signed call carries an HMAC-SHA256 over
//! `client_key|path|body|timestamp`, keyed by the secret key and base64
//! encoded. The signature depends on nothing but those inputs.
//!
//! # Security
//!
//! The secret key is held in a [`SecretString`], which zeroizes on drop and
//! is never printed by `Debug`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

/// Environment variable holding the client key
pub const ENV_API_KEY: &str = "CODY_API_KEY";
/// Environment variable holding the secret key
pub const ENV_API_SECRET: &str = "CODY_API_SECRET";

/// Client identity and signing secret
pub struct Credentials {
    /// Public client key, sent as `X-ClientKey`
    client_key: String,
    /// Signing secret (zeroized on drop)
    secret_key: SecretString,
}

impl Credentials {
    /// Create credentials from a client key and secret key
    ///
    /// Both values must be non-empty.
    pub fn new(client_key: impl Into<String>, secret_key: impl Into<String>) -> AuthResult<Self> {
        let client_key = client_key.into();
        let secret_key = secret_key.into();

        if client_key.trim().is_empty() {
            return Err(AuthError::InvalidCredentials("client key is empty".into()));
        }
        if secret_key.is_empty() {
            return Err(AuthError::InvalidCredentials("secret key is empty".into()));
        }

        Ok(Self {
            client_key,
            secret_key: SecretString::from(secret_key),
        })
    }

    /// Create credentials from environment variables
    ///
    /// Reads `CODY_API_KEY` and `CODY_API_SECRET` from the environment.
    pub fn from_env() -> AuthResult<Self> {
        let client_key = std::env::var(ENV_API_KEY)
            .map_err(|_| AuthError::EnvVarNotSet(ENV_API_KEY.to_string()))?;
        let secret_key = std::env::var(ENV_API_SECRET)
            .map_err(|_| AuthError::EnvVarNotSet(ENV_API_SECRET.to_string()))?;

        Self::new(client_key, secret_key)
    }

    /// Get the client key
    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    /// Current Unix time in whole seconds, as a decimal string
    pub fn timestamp() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
            .to_string()
    }

    /// Sign `client_key|path|body|timestamp`
    ///
    /// # Arguments
    /// * `path` - absolute request path (e.g. `/Identity/Login`)
    /// * `body` - the exact bytes that go on the wire (minified JSON, or empty)
    /// * `timestamp` - Unix seconds as a decimal string
    ///
    /// # Returns
    /// Base64-encoded HMAC-SHA256 digest
    pub fn sign(&self, path: &str, body: &str, timestamp: &str) -> AuthResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.expose_secret().as_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        mac.update(self.client_key.as_bytes());
        mac.update(b"|");
        mac.update(path.as_bytes());
        mac.update(b"|");
        mac.update(body.as_bytes());
        mac.update(b"|");
        mac.update(timestamp.as_bytes());

        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Sign `body` for `path` at the current time
    pub fn sign_request(&self, path: impl Into<String>, body: impl Into<String>) -> AuthResult<SignedRequest> {
        RequestSigner::new(self, path).sign(body)
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            client_key: self.client_key.clone(),
            secret_key: SecretString::from(self.secret_key.expose_secret().to_owned()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown: String = self.client_key.chars().take(8).collect();
        f.debug_struct("Credentials")
            .field("client_key", &format!("{}...", shown))
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// A request that has been signed and is ready to send
///
/// Created per call and dropped once the response arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Absolute path that was signed
    pub path: String,
    /// Body that was signed; must be sent byte-for-byte
    pub body: String,
    /// `X-Timestamp` header value
    pub timestamp: String,
    /// `X-Signature` header value
    pub signature: String,
}

/// Builder for signing one request
#[derive(Debug)]
pub struct RequestSigner<'a> {
    credentials: &'a Credentials,
    path: String,
    timestamp: String,
}

impl<'a> RequestSigner<'a> {
    /// Create a signer for `path`, stamped with the current time
    pub fn new(credentials: &'a Credentials, path: impl Into<String>) -> Self {
        Self {
            credentials,
            path: path.into(),
            timestamp: Credentials::timestamp(),
        }
    }

    /// Use a fixed timestamp instead of the current time
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Get the timestamp for this request
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Get the client key
    pub fn client_key(&self) -> &str {
        self.credentials.client_key()
    }

    /// Sign the given body
    pub fn sign(self, body: impl Into<String>) -> AuthResult<SignedRequest> {
        let body = body.into();
        let signature = self.credentials.sign(&self.path, &body, &self.timestamp)?;
        Ok(SignedRequest {
            path: self.path,
            body,
            timestamp: self.timestamp,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_BODY: &str = r#"{"token":"t1","otp":"123456"}"#;

    fn creds() -> Credentials {
        Credentials::new("abc", "s3cr3t").unwrap()
    }

    #[test]
    fn test_known_login_signature() {
        let sig = creds()
            .sign("/Identity/Login", LOGIN_BODY, "1700000000")
            .unwrap();
        assert_eq!(sig, "6QZ7ZG1Q9YiykiXRV5TRJ3PyRDtj6UQWqm346/DrkVs=");
    }

    #[test]
    fn test_known_ws_signature() {
        let sig = creds().sign("/ws", "", "1700000000").unwrap();
        assert_eq!(sig, "Hqlplk1cReSafiQeAz1XhvRZ24pykmgy7HL9HtfHtzU=");
    }

    #[test]
    fn test_signing_is_deterministic() {
        let c = creds();
        let a = c.sign("/Portfolio/SubAccounts", "{}", "1700000123").unwrap();
        let b = c.sign("/Portfolio/SubAccounts", "{}", "1700000123").unwrap();
        assert_eq!(a, b);
        assert!(BASE64.decode(&a).is_ok());
    }

    #[test]
    fn test_timestamp_changes_signature() {
        let c = creds();
        let a = c.sign("/Identity/Login", LOGIN_BODY, "1700000000").unwrap();
        let b = c.sign("/Identity/Login", LOGIN_BODY, "1700000001").unwrap();
        assert_ne!(a, b);
        assert_eq!(b, "xmaQMgqz/BumxTZWbKEB9XB0h3WwiD93l+5ZxQOJtyk=");
    }

    #[test]
    fn test_request_signer_fixed_timestamp() {
        let c = creds();
        let signed = RequestSigner::new(&c, "/Identity/Login")
            .with_timestamp("1700000000")
            .sign(LOGIN_BODY)
            .unwrap();
        assert_eq!(signed.timestamp, "1700000000");
        assert_eq!(signed.body, LOGIN_BODY);
        assert_eq!(signed.signature, "6QZ7ZG1Q9YiykiXRV5TRJ3PyRDtj6UQWqm346/DrkVs=");
    }

    #[test]
    fn test_timestamp_is_unix_seconds() {
        let ts = Credentials::timestamp();
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(ts.len(), 10);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let c = Credentials::new("client_key_value", "very-secret").unwrap();
        let debug = format!("{:?}", c);
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("client_k..."));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(Credentials::new("", "secret").is_err());
        assert!(Credentials::new("key", "").is_err());
    }
}
