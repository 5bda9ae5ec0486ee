//! Chunked media upload: INIT, sequential APPENDs, FINALIZE, then STATUS
//! polling until server-side processing settles.

use std::{
    path::PathBuf,
    sync::Arc,
    time::Instant,
};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    chunker::StreamChunker,
    client::{cancellable, ClientInner},
    errors::{Error, ProtocolError, Result, ValidationError},
    media::{media_type_for_path, MediaCategory, ProcessingInfo, ProcessingState, UploadParams},
    params::Params,
    request::Method,
    telemetry::UploadSegmentMetrics,
};

pub(crate) const MEDIA_UPLOAD_ENDPOINT: &str = "media/upload";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Validating,
    Initializing,
    Appending,
    Finalizing,
    Processing,
    Succeeded,
    Failed,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Succeeded | UploadState::Failed)
    }
}

/// Server-side identity of an upload once INIT has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub media_id: String,
    pub category: MediaCategory,
    pub total_bytes: u64,
    pub media_type: &'static str,
    /// Index the next APPEND will carry.
    pub next_segment_index: u32,
    /// Whether every step's result carries response metadata.
    pub append_response_wanted: bool,
}

/// Locally validated upload input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UploadPlan {
    pub path: PathBuf,
    pub media_type: &'static str,
    pub category: MediaCategory,
    pub total_bytes: u64,
    pub additional_owners: Vec<String>,
    pub is_shared: bool,
}

/// Check the upload locally. No network access happens here.
pub(crate) async fn validate(params: &UploadParams) -> Result<UploadPlan> {
    if params.media_path.as_os_str().is_empty() {
        return Err(ValidationError::new("media_path is required")
            .with_field("media_path")
            .into());
    }
    let missing = || ValidationError::new("Media file does not exist").with_field("media_path");

    let meta = tokio::fs::metadata(&params.media_path)
        .await
        .map_err(|_| missing())?;
    if !meta.is_file() {
        return Err(missing().into());
    }
    tokio::fs::File::open(&params.media_path).await.map_err(|err| {
        ValidationError::new(format!("Media file is not readable: {err}")).with_field("media_path")
    })?;

    let media_type = media_type_for_path(&params.media_path)
        .ok_or_else(|| ValidationError::new("Invalid media type").with_field("media_path"))?;

    let category = match params.media_category.as_deref() {
        Some(raw) => raw.parse::<MediaCategory>()?,
        None => MediaCategory::infer(media_type),
    };

    let total_bytes = meta.len();
    if total_bytes > category.size_limit() {
        return Err(ValidationError::new("Media is over size limit")
            .with_field("media_path")
            .into());
    }

    Ok(UploadPlan {
        path: params.media_path.clone(),
        media_type,
        category,
        total_bytes,
        additional_owners: params.additional_owners.clone(),
        is_shared: params.is_shared,
    })
}

/// Drives one upload to a terminal state. Every network call and poll delay
/// observes the cancellation token.
pub(crate) struct MediaUpload {
    inner: Arc<ClientInner>,
    wants_metadata: bool,
    cancel: CancellationToken,
    state: UploadState,
}

impl MediaUpload {
    pub fn new(inner: Arc<ClientInner>, wants_metadata: bool, cancel: CancellationToken) -> Self {
        Self {
            inner,
            wants_metadata,
            cancel,
            state: UploadState::Validating,
        }
    }

    pub async fn run(mut self, params: UploadParams) -> Result<Value> {
        let outcome = self.drive(params).await;
        self.transition(if outcome.is_ok() {
            UploadState::Succeeded
        } else {
            UploadState::Failed
        });
        outcome
    }

    async fn drive(&mut self, params: UploadParams) -> Result<Value> {
        let plan = validate(&params).await?;

        self.transition(UploadState::Initializing);
        let mut session = self.init(&plan).await?;

        self.transition(UploadState::Appending);
        self.append_all(&plan, &mut session).await?;

        self.transition(UploadState::Finalizing);
        let mut payload = self.command("FINALIZE", &session.media_id).await?;

        self.transition(UploadState::Processing);
        while let Some(info) = ProcessingInfo::from_payload(&payload)? {
            match info.state {
                ProcessingState::Succeeded => break,
                ProcessingState::Failed => return Err(Error::Processing { payload }),
                _ if info.is_waiting() => {
                    let delay = info.poll_delay();
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        media_id = %session.media_id,
                        delay_ms = delay.as_millis() as u64,
                        progress = ?info.progress_percent,
                        "media processing pending"
                    );
                    cancellable(&self.cancel, tokio::time::sleep(delay)).await?;
                    payload = self.status(&session.media_id).await?;
                }
                // Unrecognized state strings are treated as settled.
                _ => break,
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            media_id = %session.media_id,
            media_type = session.media_type,
            total_bytes = session.total_bytes,
            segments = session.next_segment_index,
            "upload complete"
        );
        Ok(payload)
    }

    fn transition(&mut self, next: UploadState) {
        if self.state.is_terminal() {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(from = ?self.state, to = ?next, "upload state");
        self.state = next;
    }

    async fn init(&self, plan: &UploadPlan) -> Result<UploadSession> {
        let mut params = Params::new();
        params.insert("command".into(), "INIT".into());
        params.insert("total_bytes".into(), plan.total_bytes.into());
        params.insert("media_type".into(), plan.media_type.into());
        params.insert("media_category".into(), plan.category.as_str().into());
        if !plan.additional_owners.is_empty() {
            params.insert(
                "additional_owners".into(),
                Value::Array(plan.additional_owners.iter().cloned().map(Value::String).collect()),
            );
        }
        params.insert("shared".into(), plan.is_shared.into());

        let data = self.send(Method::Post, params).await?;
        let media_id = media_id_of(&data).ok_or_else(|| ProtocolError {
            message: "INIT response is missing media_id_string".to_string(),
            status_code: None,
            body: data.to_string(),
            raw_payload: None,
        })?;

        Ok(UploadSession {
            media_id,
            category: plan.category,
            total_bytes: plan.total_bytes,
            media_type: plan.media_type,
            next_segment_index: 0,
            append_response_wanted: self.wants_metadata,
        })
    }

    async fn append_all(&self, plan: &UploadPlan, session: &mut UploadSession) -> Result<()> {
        let mut chunker = StreamChunker::open_with_chunk_size(&plan.path, self.inner.chunk_size()).await?;

        while let Some(segment) = cancellable(&self.cancel, chunker.next_segment()).await?? {
            let started = Instant::now();
            let mut params = Params::new();
            params.insert("command".into(), "APPEND".into());
            params.insert("media_id".into(), session.media_id.clone().into());
            params.insert("media".into(), segment.to_base64().into());
            params.insert("segment_index".into(), session.next_segment_index.into());
            self.send(Method::Post, params).await?;

            chunker.acknowledge(segment.index())?;
            session.next_segment_index += 1;
            self.inner.telemetry.record_segment(UploadSegmentMetrics {
                media_id: session.media_id.clone(),
                category: session.category,
                segment_index: segment.index(),
                bytes: segment.len(),
                latency: started.elapsed(),
            });
        }
        Ok(())
    }

    async fn command(&self, command: &str, media_id: &str) -> Result<Value> {
        let mut params = Params::new();
        params.insert("command".into(), command.into());
        params.insert("media_id".into(), media_id.into());
        self.send(Method::Post, params).await
    }

    async fn status(&self, media_id: &str) -> Result<Value> {
        let mut params = Params::new();
        params.insert("command".into(), "STATUS".into());
        params.insert("media_id".into(), media_id.into());
        self.send(Method::Get, params).await
    }

    async fn send(&self, method: Method, params: Params) -> Result<Value> {
        self.inner
            .execute(method, MEDIA_UPLOAD_ENDPOINT, params, self.wants_metadata, &self.cancel)
            .await
    }
}

fn media_id_of(data: &Value) -> Option<String> {
    match data.get("media_id_string") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        _ => data.get("media_id").and_then(|id| match id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }),
    }
}
