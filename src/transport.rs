use std::{collections::BTreeMap, future::Future, pin::Pin, time::Duration};

use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{TransportError, TransportErrorKind},
    request::{RequestBody, ResolvedRequest},
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Status line and headers of a response, attached to results on request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub status: u16,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
}

/// Raw transport result before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn meta(&self) -> ResponseMeta {
        ResponseMeta {
            status: self.status,
            headers: self.headers.clone(),
        }
    }
}

/// Sends a resolved request and returns the raw status, headers and body.
///
/// Implementations do not interpret the status code; that is the normalizer's
/// job.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a ResolvedRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>>;
}

/// Default transport over `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Option<Duration>, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
            .timeout(timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .gzip(true)
            .build()
            .map_err(|err| TransportError {
                kind: TransportErrorKind::Connect,
                message: "failed to build http client".to_string(),
                status_code: None,
                source: Some(err),
            })?;
        Ok(Self { http })
    }

    /// Wrap an existing `reqwest` client (shared connection pool, custom TLS).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn execute(&self, request: &ResolvedRequest) -> Result<RawResponse, TransportError> {
        if request.signing.is_some() && request.header("Authorization").is_none() {
            return Err(TransportError::new(
                TransportErrorKind::Request,
                "user-context request is unsigned; configure a RequestSigner",
            ));
        }

        let url = reqwest::Url::parse(&request.url).map_err(|err| {
            TransportError::new(TransportErrorKind::Request, format!("invalid url: {err}"))
        })?;
        let mut builder = self.http.request(request.method.into(), url);

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|err| {
                TransportError::new(TransportErrorKind::Request, format!("invalid header name: {err}"))
            })?;
            let value = HeaderValue::from_str(value.trim()).map_err(|err| {
                TransportError::new(TransportErrorKind::Request, format!("invalid header value: {err}"))
            })?;
            builder = builder.header(name, value);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::UrlEncoded(text) => builder.body(text.clone()),
            RequestBody::Multipart(fields) => {
                let form = fields
                    .iter()
                    .fold(reqwest::multipart::Form::new(), |form, (k, v)| {
                        form.text(k.clone(), v.clone())
                    });
                builder.multipart(form)
            }
        };

        let resp = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp.text().await.map_err(|err| {
            let mut err = TransportError::from_reqwest(err);
            err.status_code = Some(status);
            err
        })?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        request: &'a ResolvedRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        Box::pin(self.execute(request))
    }
}
