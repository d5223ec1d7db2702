//! Structured results of signed requests
//!
//! [`RestClient::post`](crate::RestClient::post) never returns `Err`. A
//! failed call comes back as [`ApiResponse::Failure`] carrying the status
//! code and raw body, so background loops can log it and carry on.

use serde_json::Value;
use std::fmt;

use crate::error::{RestError, RestResult};

/// What went wrong with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Server answered with a status other than 200
    Status,
    /// Connection or protocol error before a response arrived
    Transport,
    /// No response within the request timeout
    Timeout,
    /// 200 response whose body was not valid JSON
    Decode,
    /// Payload could not be serialized or signed
    Encode,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Status => "status",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Decode => "decode",
            Self::Encode => "encode",
        };
        f.write_str(s)
    }
}

/// A request that did not produce a usable JSON body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    /// Failure category
    pub kind: FailureKind,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Raw response body, when one was captured
    pub body: Option<String>,
    /// Human-readable description
    pub message: String,
}

impl ApiFailure {
    /// Create a failure of any kind without a response
    pub fn new(kind: FailureKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            body: None,
            message: message.into(),
        }
    }

    /// Non-200 response with an optional body
    pub fn status(status: u16, body: Option<String>) -> Self {
        Self {
            kind: FailureKind::Status,
            status: Some(status),
            body: body.filter(|b| !b.is_empty()),
            message: format!("HTTP {status}"),
        }
    }

    /// Attach the raw body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else {
            FailureKind::Transport
        };
        Self::new(kind, err.status().map(|s| s.as_u16()), err.to_string())
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} failure (status {}): {}", self.kind, status, self.message),
            None => write!(f, "{} failure: {}", self.kind, self.message),
        }
    }
}

/// Outcome of a signed request
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// HTTP 200 with a decoded JSON body
    Success(Value),
    /// Anything else
    Failure(ApiFailure),
}

impl ApiResponse {
    /// Check if the request succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// HTTP status, `Some(200)` on success
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success(_) => Some(200),
            Self::Failure(failure) => failure.status,
        }
    }

    /// Application-level `statusCode` carried in a successful body, if any
    pub fn body_status(&self) -> Option<u16> {
        self.json()?
            .get("statusCode")?
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
    }

    /// Check that both the HTTP status and any body `statusCode` are 200
    pub fn is_accepted(&self) -> bool {
        self.is_success() && self.body_status().map_or(true, |code| code == 200)
    }

    /// Borrow the JSON body of a successful response
    pub fn json(&self) -> Option<&Value> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Borrow the failure, if any
    pub fn failure(&self) -> Option<&ApiFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Convert into a `Result` for use with `?`
    pub fn into_result(self) -> RestResult<Value> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(failure) => Err(RestError::Request(failure)),
        }
    }
}

/// Challenge returned by the OTP step, consumed by login
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    /// Short-lived challenge token
    pub token: String,
    /// Full response body
    pub response: Value,
}

/// Result of validating a saved session at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRestore {
    /// Nothing was saved; a login is needed
    NoSavedToken,
    /// The saved token was accepted and is now in use
    Restored,
    /// The saved token was rejected and has been discarded
    Invalidated {
        /// Status of the validation call, if one was received
        status: Option<u16>,
    },
}

impl SessionRestore {
    /// Check if a usable session token is held
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Restored)
    }
}
