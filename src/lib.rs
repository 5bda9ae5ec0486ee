//! Async client for the Twitter REST API (v1.1, labs) with chunked media upload.
#![cfg_attr(docsrs, feature(doc_cfg))]
// Allow large error types - boxing would change every public signature
#![allow(clippy::result_large_err)]

use std::time::Duration;

/// Bare API host; serves `labs/` endpoints.
pub const API_HOST: &str = "https://api.twitter.com/";

/// Versioned REST host.
pub const REST_API_HOST: &str = "https://api.twitter.com/1.1/";

/// Host for `media/*` endpoints.
pub const UPLOAD_API_HOST: &str = "https://upload.twitter.com/1.1/";

/// Client-credentials token endpoint for app-only auth.
pub const BEARER_TOKEN_URL: &str = "https://api.twitter.com/oauth2/token";

/// Default User-Agent header value.
pub const DEFAULT_USER_AGENT: &str = "twttr-api-client";

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// APPEND segment size (5 MiB).
pub const UPLOAD_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Key under which response status and headers are attached when requested.
pub const RESPONSE_META_KEY: &str = "_response";

mod auth;
mod chunker;
mod client;
mod endpoints;
mod errors;
mod media;
#[cfg(feature = "mock")]
mod mock;
mod params;
mod request;
mod response;
mod telemetry;
mod transport;
mod upload;

pub use auth::{basic_credentials, AuthStrategy, Credentials, RequestSigner, SigningContext};
pub use chunker::{Segment, StreamChunker};
pub use client::{Client, Config};
pub use endpoints::{
    classify, is_absolute_url, BodyMode, Hosts, JSON_BODY_ENDPOINTS, LABS_PREFIX,
    MULTIPART_ENDPOINTS,
};
pub use errors::{
    ApiError, Error, ProtocolError, Result, TransportError, TransportErrorKind, ValidationError,
};
pub use media::{
    media_type_for_path, MediaCategory, ProcessingInfo, ProcessingState, UploadParams,
    MAX_FILE_SIZE, MAX_GIF_SIZE, MAX_IMAGE_SIZE,
};
#[cfg(feature = "mock")]
pub use mock::MockTransport;
pub use params::Params;
pub use request::{build as build_request, Method, RequestBody, RequestSpec, ResolvedRequest};
pub use response::{body_error, normalize as normalize_response};
pub use telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext, UploadSegmentMetrics};
pub use transport::{BoxFuture, HttpTransport, RawResponse, ResponseMeta, Transport};
pub use upload::{UploadSession, UploadState};
