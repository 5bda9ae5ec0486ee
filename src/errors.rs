use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::transport::ResponseMeta;

/// Structured validation error raised before any request leaves the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "{}: {}", field, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<String> for ValidationError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ValidationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Normalized error reported by the remote API.
///
/// Twitter answers failures with one of three body shapes: a bare `error`
/// string, a single `error` object, or an `errors` array. All three collapse
/// into this envelope; `errors` keeps the full sub-error list when there was one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub status_code: Option<u16>,
    pub code: Option<i64>,
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<Value>,
    /// Response status and headers, present when the caller asked for metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<ResponseMeta>,
}

impl ApiError {
    pub fn new(status_code: Option<u16>, message: Option<String>) -> Self {
        Self {
            status_code,
            code: None,
            message,
            errors: Vec::new(),
            raw_payload: None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self
            .status_code
            .map(|s| s.to_string())
            .unwrap_or_else(|| "no status".to_string());
        let message = self.message.as_deref().unwrap_or("request failed");
        if let Some(code) = self.code {
            write!(f, "{} ({}): {}", code, status, message)
        } else {
            write!(f, "{}: {}", status, message)
        }
    }
}

impl std::error::Error for ApiError {}

/// A response body that should have been JSON but was not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProtocolError {
    pub message: String,
    pub status_code: Option<u16>,
    /// Raw body text as received.
    pub body: String,
    /// Response status and headers, when the caller asked for them.
    pub raw_payload: Option<ResponseMeta>,
}

/// Transport-level error (timeouts, DNS/TLS/connectivity).
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// Status of a partial response, when the failure happened after headers arrived.
    pub status_code: Option<u16>,
    #[source]
    pub source: Option<reqwest::Error>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            source: None,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_request() || err.is_body() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self {
            kind,
            message: err.to_string(),
            status_code: err.status().map(|s| s.as_u16()),
            source: Some(err),
        }
    }
}

/// Broad transport error kinds for classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Other => "transport",
        };
        write!(f, "{label}")
    }
}

/// Convenience alias for fallible client results.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type surfaced by the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Api(#[from] ApiError),

    /// The media was accepted but server-side processing reported `failed`.
    #[error("media processing failed")]
    Processing { payload: Value },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// HTTP status associated with the failure, when one was observed.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api(err) => err.status_code,
            Error::Protocol(err) => err.status_code,
            Error::Transport(err) => err.status_code,
            _ => None,
        }
    }
}
