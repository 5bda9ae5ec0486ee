use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    auth::{fetch_bearer_token, unix_timestamp, AuthStrategy, Credentials, RequestSigner},
    endpoints::Hosts,
    errors::{Error, Result, ValidationError},
    media::UploadParams,
    params::Params,
    request::{build, Method, RequestSpec, ResolvedRequest},
    response::normalize,
    telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext, Telemetry},
    transport::{HttpTransport, Transport},
    upload::MediaUpload,
    DEFAULT_USER_AGENT, UPLOAD_CHUNK_SIZE,
};

#[derive(Clone, Default)]
pub struct Config {
    /// Required. Validated when the client is built.
    pub credentials: Option<Credentials>,
    /// Override the API hosts (defaults to the public Twitter hosts).
    pub hosts: Option<Hosts>,
    /// Override the `User-Agent` header.
    pub user_agent: Option<String>,
    /// Reuse an existing `reqwest` client for the default transport.
    pub http_client: Option<reqwest::Client>,
    /// Override the connect timeout (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Override the request timeout (defaults to 60s).
    pub timeout: Option<Duration>,
    /// Upload chunk size in bytes (defaults to 5 MiB).
    pub chunk_size: Option<usize>,
    /// Replace the HTTP transport entirely.
    pub transport: Option<Arc<dyn Transport>>,
    /// Signs user-context requests (OAuth 1.0a).
    pub signer: Option<Arc<dyn RequestSigner>>,
    /// Optional metrics callbacks (HTTP latency, upload segments).
    pub metrics: Option<MetricsCallbacks>,
}

impl Config {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            ..Default::default()
        }
    }
}

/// Twitter API client. Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    auth: AuthStrategy,
    hosts: Hosts,
    user_agent: String,
    transport: Arc<dyn Transport>,
    signer: Option<Arc<dyn RequestSigner>>,
    chunk_size: usize,
    pub(crate) telemetry: Telemetry,
}

impl Client {
    pub fn new(cfg: Config) -> Result<Self> {
        let credentials = cfg
            .credentials
            .ok_or_else(|| Error::Config("Authentication options are required".to_string()))?;
        let auth = AuthStrategy::from_credentials(&credentials)?;

        let transport: Arc<dyn Transport> = match (cfg.transport, cfg.http_client) {
            (Some(transport), _) => transport,
            (None, Some(http)) => Arc::new(HttpTransport::with_client(http)),
            (None, None) => Arc::new(HttpTransport::new(cfg.connect_timeout, cfg.timeout)?),
        };

        let user_agent = cfg
            .user_agent
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Ok(Self {
            inner: Arc::new(ClientInner {
                auth,
                hosts: cfg.hosts.unwrap_or_default(),
                user_agent,
                transport,
                signer: cfg.signer,
                chunk_size: cfg.chunk_size.unwrap_or(UPLOAD_CHUNK_SIZE).max(1),
                telemetry: Telemetry::new(cfg.metrics),
            }),
        })
    }

    pub async fn get(&self, endpoint: &str, params: Value, wants_metadata: bool) -> Result<Value> {
        self.call(Method::Get, endpoint, params, wants_metadata).await
    }

    pub async fn post(&self, endpoint: &str, params: Value, wants_metadata: bool) -> Result<Value> {
        self.call(Method::Post, endpoint, params, wants_metadata).await
    }

    pub async fn put(&self, endpoint: &str, params: Value, wants_metadata: bool) -> Result<Value> {
        self.call(Method::Put, endpoint, params, wants_metadata).await
    }

    pub async fn delete(&self, endpoint: &str, params: Value, wants_metadata: bool) -> Result<Value> {
        self.call(Method::Delete, endpoint, params, wants_metadata).await
    }

    /// Issue a call. `params` must be a JSON object or null.
    pub async fn call(
        &self,
        method: Method,
        endpoint: &str,
        params: Value,
        wants_metadata: bool,
    ) -> Result<Value> {
        self.call_with_cancel(method, endpoint, params, wants_metadata, CancellationToken::new())
            .await
    }

    /// Like [`Client::call`], aborting with [`Error::Cancelled`] once `cancel` fires.
    pub async fn call_with_cancel(
        &self,
        method: Method,
        endpoint: &str,
        params: Value,
        wants_metadata: bool,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let params = params_from_value(params)?;
        self.inner
            .execute(method, endpoint, params, wants_metadata, &cancel)
            .await
    }

    /// Upload a media file through the chunked INIT/APPEND/FINALIZE flow,
    /// waiting for server-side processing to finish.
    pub async fn upload(&self, params: UploadParams, wants_metadata: bool) -> Result<Value> {
        self.upload_with_cancel(params, wants_metadata, CancellationToken::new())
            .await
    }

    pub async fn upload_with_cancel(
        &self,
        params: UploadParams,
        wants_metadata: bool,
        cancel: CancellationToken,
    ) -> Result<Value> {
        MediaUpload::new(self.inner.clone(), wants_metadata, cancel)
            .run(params)
            .await
    }
}

fn params_from_value(value: Value) -> Result<Params> {
    match value {
        Value::Null => Ok(Params::new()),
        Value::Object(map) => Ok(map),
        _ => Err(ValidationError::new("parameters must be an object")
            .with_field("params")
            .into()),
    }
}

impl ClientInner {
    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub(crate) async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        params: Params,
        wants_metadata: bool,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let mut request = build(
            &self.hosts,
            &self.user_agent,
            RequestSpec::new(method, endpoint, params),
        )?;
        self.authorize(&mut request, cancel).await?;

        let start = Instant::now();
        let result = cancellable(cancel, self.transport.send(&request)).await?;

        #[cfg(feature = "tracing")]
        match &result {
            Ok(raw) => tracing::debug!(
                method = %method,
                endpoint,
                status = raw.status,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "request completed"
            ),
            Err(err) => tracing::warn!(method = %method, endpoint, error = %err, "transport error"),
        }

        if self.telemetry.http_enabled() {
            let (status, error) = match &result {
                Ok(raw) => (Some(raw.status), None),
                Err(err) => (err.status_code, Some(err.to_string())),
            };
            self.telemetry.record_http(HttpRequestMetrics {
                latency: start.elapsed(),
                status,
                error,
                context: RequestContext::new(method, endpoint),
            });
        }

        normalize(result, wants_metadata)
    }

    async fn authorize(&self, request: &mut ResolvedRequest, cancel: &CancellationToken) -> Result<()> {
        match &self.auth {
            AuthStrategy::AppOnly {
                consumer_key,
                consumer_secret,
            } => {
                let token = cancellable(
                    cancel,
                    fetch_bearer_token(
                        self.transport.as_ref(),
                        &self.hosts.bearer_token,
                        consumer_key,
                        consumer_secret,
                    ),
                )
                .await??;
                request.set_header("Authorization", format!("Bearer {token}"));
            }
            AuthStrategy::UserContext { .. } => {
                request.signing = self.auth.signing_context(unix_timestamp());
                let header = match (&self.signer, &request.signing) {
                    (Some(signer), Some(context)) => Some(signer.authorization(context, request)?),
                    _ => None,
                };
                if let Some(header) = header {
                    request.set_header("Authorization", header);
                }
            }
        }
        Ok(())
    }
}

/// Race `fut` against cancellation of `cancel`.
pub(crate) async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        out = fut => Ok(out),
    }
}
