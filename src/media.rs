use std::{fmt, path::Path, path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ProtocolError, ValidationError};

/// Largest accepted file for video and the remaining categories (512 MiB).
pub const MAX_FILE_SIZE: u64 = 512 * 1024 * 1024;
/// Largest accepted `tweet_image` (5 MiB).
pub const MAX_IMAGE_SIZE: u64 = 5 * 1024 * 1024;
/// Largest accepted `tweet_gif` (15 MiB).
pub const MAX_GIF_SIZE: u64 = 15 * 1024 * 1024;

/// Extension to MIME type.
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("gif", "image/gif"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
];

/// MIME type for a media file, from the text after the last `.` of its file
/// name (case-insensitive). A dotfile such as `.png` counts as `png`; a name
/// without any dot is matched whole.
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_str()?;
    let ext = name.rsplit('.').next()?.to_ascii_lowercase();
    MEDIA_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    TweetImage,
    TweetVideo,
    TweetGif,
    DmImage,
    DmVideo,
    DmGif,
    AmplifyVideo,
    Subtitles,
}

impl MediaCategory {
    pub const ALL: [MediaCategory; 8] = [
        MediaCategory::TweetImage,
        MediaCategory::TweetVideo,
        MediaCategory::TweetGif,
        MediaCategory::DmImage,
        MediaCategory::DmVideo,
        MediaCategory::DmGif,
        MediaCategory::AmplifyVideo,
        MediaCategory::Subtitles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::TweetImage => "tweet_image",
            MediaCategory::TweetVideo => "tweet_video",
            MediaCategory::TweetGif => "tweet_gif",
            MediaCategory::DmImage => "dm_image",
            MediaCategory::DmVideo => "dm_video",
            MediaCategory::DmGif => "dm_gif",
            MediaCategory::AmplifyVideo => "amplify_video",
            MediaCategory::Subtitles => "subtitles",
        }
    }

    /// Category implied by a MIME type when the caller did not pick one.
    pub fn infer(media_type: &str) -> Self {
        if media_type.contains("video") {
            MediaCategory::TweetVideo
        } else if media_type.contains("gif") {
            MediaCategory::TweetGif
        } else {
            MediaCategory::TweetImage
        }
    }

    /// Size ceiling in bytes.
    pub fn size_limit(&self) -> u64 {
        match self {
            MediaCategory::TweetImage => MAX_IMAGE_SIZE,
            MediaCategory::TweetGif => MAX_GIF_SIZE,
            _ => MAX_FILE_SIZE,
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::new("Invalid media_category").with_field("media_category"))
    }
}

/// Caller input for one upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    pub media_path: PathBuf,
    /// Explicit category; validated against the known set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_owners: Vec<String>,
    #[serde(default)]
    pub is_shared: bool,
}

impl UploadParams {
    pub fn new(media_path: impl Into<PathBuf>) -> Self {
        Self {
            media_path: media_path.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: MediaCategory) -> Self {
        self.media_category = Some(category.as_str().to_string());
        self
    }

    pub fn with_additional_owner(mut self, user_id: impl Into<String>) -> Self {
        self.additional_owners.push(user_id.into());
        self
    }

    pub fn shared(mut self, is_shared: bool) -> Self {
        self.is_shared = is_shared;
        self
    }

    /// Parse a loosely-typed parameter bag. Anything but an object is rejected.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        if !value.is_object() {
            return Err(ValidationError::new("Media Upload parameters must be an object"));
        }
        serde_json::from_value(value).map_err(|err| ValidationError::new(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl ProcessingState {
    /// Parse the wire value. Unrecognized strings map to `Unknown`.
    pub fn from_wire(state: &str) -> Self {
        match state {
            "pending" => ProcessingState::Pending,
            "in_progress" => ProcessingState::InProgress,
            "succeeded" => ProcessingState::Succeeded,
            "failed" => ProcessingState::Failed,
            _ => ProcessingState::Unknown,
        }
    }
}

/// Server-side processing status reported by FINALIZE and STATUS.
///
/// Only `state` drives the upload. The other fields are read leniently so an
/// odd `check_after_secs` or `progress_percent` never hides the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    pub state: ProcessingState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_after_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ProcessingInfo {
    /// Read `processing_info` from a media descriptor.
    ///
    /// Absent or null means processing is done. A present `processing_info`
    /// that is not an object, or that has no string `state`, is a protocol
    /// error.
    pub fn from_payload(payload: &Value) -> Result<Option<Self>, ProtocolError> {
        let Some(info) = payload.get("processing_info").filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let malformed = |message: &str| ProtocolError {
            message: message.to_string(),
            status_code: None,
            body: payload.to_string(),
            raw_payload: None,
        };
        let obj = info
            .as_object()
            .ok_or_else(|| malformed("processing_info is not an object"))?;
        let state = obj
            .get("state")
            .and_then(Value::as_str)
            .map(ProcessingState::from_wire)
            .ok_or_else(|| malformed("processing_info has no state"))?;

        Ok(Some(Self {
            state,
            check_after_secs: obj.get("check_after_secs").and_then(Value::as_f64),
            progress_percent: obj.get("progress_percent").and_then(Value::as_f64),
            error: obj.get("error").filter(|v| !v.is_null()).cloned(),
        }))
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, ProcessingState::Pending | ProcessingState::InProgress)
    }

    /// Wait before the next STATUS call. Zero, negative or absent means one second.
    pub fn poll_delay(&self) -> Duration {
        self.check_after_secs
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
            .unwrap_or(Duration::from_secs(1))
    }
}
