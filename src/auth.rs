//! Authentication strategies.
//!
//! A client authenticates either as the application alone (bearer token from a
//! client-credentials exchange) or on behalf of a user (OAuth 1.0a context).
//! The strategy is chosen once when the client is built.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{Error, ProtocolError, Result},
    request::{Method, RequestBody, ResolvedRequest},
    response::normalize,
    transport::Transport,
    DEFAULT_USER_AGENT,
};

/// Fields always required, whatever the mode.
const APP_ONLY_REQUIRED_KEYS: &[&str] = &["consumer_key", "consumer_secret"];
/// Additional fields required for user-context requests.
const USER_AUTH_REQUIRED_KEYS: &[&str] = &["access_token", "access_token_secret"];

/// API credentials as configured by the caller.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_secret: Option<String>,
    /// Authenticate as the application only (bearer token) instead of a user.
    #[serde(default)]
    pub app_only: bool,
}

impl Credentials {
    pub fn app_only(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: None,
            access_token_secret: None,
            app_only: true,
        }
    }

    pub fn user(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: Some(access_token.into()),
            access_token_secret: Some(access_token_secret.into()),
            app_only: false,
        }
    }

    fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "consumer_key" => Some(self.consumer_key.as_str()),
            "consumer_secret" => Some(self.consumer_secret.as_str()),
            "access_token" => self.access_token.as_deref(),
            "access_token_secret" => self.access_token_secret.as_deref(),
            _ => None,
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Check that every field the selected mode needs is present.
    pub fn validate(&self) -> Result<()> {
        let user_keys: &[&str] = if self.app_only {
            &[]
        } else {
            USER_AUTH_REQUIRED_KEYS
        };
        for name in APP_ONLY_REQUIRED_KEYS.iter().chain(user_keys) {
            if self.field(name).is_none() {
                return Err(Error::Config(format!("Missing required property {name}")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field(
                "access_token_secret",
                &self.access_token_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("app_only", &self.app_only)
            .finish()
    }
}

/// The authentication strategy threaded through request construction.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    AppOnly {
        consumer_key: String,
        consumer_secret: String,
    },
    UserContext {
        consumer_key: String,
        consumer_secret: String,
        token: String,
        token_secret: String,
    },
}

impl AuthStrategy {
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        credentials.validate()?;
        if credentials.app_only {
            return Ok(AuthStrategy::AppOnly {
                consumer_key: credentials.consumer_key.clone(),
                consumer_secret: credentials.consumer_secret.clone(),
            });
        }
        Ok(AuthStrategy::UserContext {
            consumer_key: credentials.consumer_key.clone(),
            consumer_secret: credentials.consumer_secret.clone(),
            token: credentials.access_token.clone().unwrap_or_default(),
            token_secret: credentials.access_token_secret.clone().unwrap_or_default(),
        })
    }

    pub fn is_app_only(&self) -> bool {
        matches!(self, AuthStrategy::AppOnly { .. })
    }

    /// Signing context stamped with the given Unix time. `None` for app-only auth.
    pub fn signing_context(&self, timestamp: u64) -> Option<SigningContext> {
        match self {
            AuthStrategy::AppOnly { .. } => None,
            AuthStrategy::UserContext {
                consumer_key,
                consumer_secret,
                token,
                token_secret,
            } => Some(SigningContext {
                consumer_key: consumer_key.clone(),
                consumer_secret: consumer_secret.clone(),
                token: token.clone(),
                token_secret: token_secret.clone(),
                timestamp,
            }),
        }
    }
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::AppOnly { consumer_key, .. } => f
                .debug_struct("AppOnly")
                .field("consumer_key", consumer_key)
                .finish_non_exhaustive(),
            AuthStrategy::UserContext { consumer_key, .. } => f
                .debug_struct("UserContext")
                .field("consumer_key", consumer_key)
                .finish_non_exhaustive(),
        }
    }
}

/// Per-request OAuth 1.0a material for user-context calls.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningContext {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
    /// Unix time in seconds when the request was built.
    pub timestamp: u64,
}

impl fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningContext")
            .field("consumer_key", &self.consumer_key)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Produces the `Authorization` header for a user-context request.
///
/// The context only carries a timestamp. Implementations must generate their
/// own per-request nonce.
pub trait RequestSigner: Send + Sync {
    fn authorization(&self, context: &SigningContext, request: &ResolvedRequest) -> Result<String>;
}

impl<F> RequestSigner for F
where
    F: Fn(&SigningContext, &ResolvedRequest) -> Result<String> + Send + Sync,
{
    fn authorization(&self, context: &SigningContext, request: &ResolvedRequest) -> Result<String> {
        self(context, request)
    }
}

pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// `Basic` credential for the client-credentials exchange.
pub fn basic_credentials(consumer_key: &str, consumer_secret: &str) -> String {
    BASE64.encode(format!("{consumer_key}:{consumer_secret}"))
}

#[derive(Deserialize)]
struct BearerTokenResponse {
    #[serde(default)]
    token_type: Option<String>,
    access_token: Option<String>,
}

pub(crate) fn bearer_token_request(
    token_url: &str,
    consumer_key: &str,
    consumer_secret: &str,
) -> ResolvedRequest {
    ResolvedRequest {
        url: token_url.to_string(),
        method: Method::Post,
        headers: vec![
            (
                "Authorization".to_string(),
                format!("Basic {}", basic_credentials(consumer_key, consumer_secret)),
            ),
            (
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded;charset=UTF-8".to_string(),
            ),
            ("Accept".to_string(), "*/*".to_string()),
            ("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string()),
        ],
        body: RequestBody::UrlEncoded("grant_type=client_credentials".to_string()),
        signing: None,
    }
}

/// Exchange the consumer key pair for an app-only bearer token.
///
/// The token is not cached; every app-only request performs its own exchange.
pub(crate) async fn fetch_bearer_token(
    transport: &dyn Transport,
    token_url: &str,
    consumer_key: &str,
    consumer_secret: &str,
) -> Result<String> {
    let request = bearer_token_request(token_url, consumer_key, consumer_secret);
    let body = normalize(transport.send(&request).await, false)?;
    let raw = body.to_string();
    let parsed: BearerTokenResponse = serde_json::from_value(body)?;

    if let Some(kind) = parsed.token_type.as_deref() {
        if !kind.eq_ignore_ascii_case("bearer") {
            #[cfg(feature = "tracing")]
            tracing::warn!(token_type = kind, "unexpected token type from bearer exchange");
        }
    }

    parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ProtocolError {
                message: "bearer token response is missing access_token".to_string(),
                status_code: None,
                body: raw,
                raw_payload: None,
            }
            .into()
        })
}
