use std::{fmt, sync::Arc, time::Duration};

use crate::{media::MediaCategory, request::Method};

/// User-provided callbacks for emitting metrics without taking on a tracing dependency.
#[derive(Clone, Default)]
pub struct MetricsCallbacks {
    pub http_request: Option<Arc<dyn Fn(HttpRequestMetrics) + Send + Sync>>,
    pub upload_segment: Option<Arc<dyn Fn(UploadSegmentMetrics) + Send + Sync>>,
}

impl fmt::Debug for MetricsCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCallbacks")
            .field(
                "http_request",
                &self.http_request.as_ref().map(|_| "callback"),
            )
            .field(
                "upload_segment",
                &self.upload_segment.as_ref().map(|_| "callback"),
            )
            .finish()
    }
}

/// Common request metadata shared by all telemetry events.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub method: Method,
    /// Endpoint as the caller passed it (placeholders unresolved).
    pub endpoint: String,
}

impl RequestContext {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
        }
    }
}

/// HTTP request latency and outcome.
#[derive(Clone, Debug)]
pub struct HttpRequestMetrics {
    pub latency: Duration,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub context: RequestContext,
}

/// Emitted after each APPEND call completes.
#[derive(Clone, Debug)]
pub struct UploadSegmentMetrics {
    pub media_id: String,
    pub category: MediaCategory,
    pub segment_index: u32,
    pub bytes: usize,
    pub latency: Duration,
}

/// Internal helper that owns the registered callbacks (if any).
#[derive(Clone, Default)]
pub(crate) struct Telemetry {
    callbacks: MetricsCallbacks,
}

impl Telemetry {
    pub fn new(callbacks: Option<MetricsCallbacks>) -> Self {
        Self {
            callbacks: callbacks.unwrap_or_default(),
        }
    }

    pub fn http_enabled(&self) -> bool {
        self.callbacks.http_request.is_some()
    }

    pub fn record_http(&self, metrics: HttpRequestMetrics) {
        if let Some(cb) = &self.callbacks.http_request {
            cb(metrics);
        }
    }

    pub fn record_segment(&self, metrics: UploadSegmentMetrics) {
        #[cfg(feature = "tracing")]
        tracing::trace!(
            media_id = %metrics.media_id,
            segment_index = metrics.segment_index,
            bytes = metrics.bytes,
            elapsed_ms = metrics.latency.as_millis() as u64,
            "segment appended"
        );
        if let Some(cb) = &self.callbacks.upload_segment {
            cb(metrics);
        }
    }
}
