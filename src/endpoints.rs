//! Static endpoint catalog: which endpoints take JSON or multipart bodies, and
//! which host serves a given path.

use serde::{Deserialize, Serialize};

use crate::{API_HOST, BEARER_TOKEN_URL, REST_API_HOST, UPLOAD_API_HOST};

/// Endpoints whose parameters travel as a JSON body.
pub const JSON_BODY_ENDPOINTS: &[&str] = &[
    "media/metadata/create",
    "direct_messages/events/new",
    "direct_messages/welcome_messages/new",
    "direct_messages/welcome_messages/rules/new",
];

/// Endpoints whose parameters travel as form fields on non-GET requests.
pub const MULTIPART_ENDPOINTS: &[&str] = &["media/upload", "account/update_profile_image"];

/// Path prefix of the beta (labs) namespace, served from the bare API host.
pub const LABS_PREFIX: &str = "labs/";

const MEDIA_MARKER: &str = "media";

/// How the remaining request parameters are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Json,
    Multipart,
    Query,
}

/// Classify an endpoint path. Multipart only applies to non-GET requests.
pub fn classify(endpoint: &str, is_get: bool) -> BodyMode {
    if JSON_BODY_ENDPOINTS.contains(&endpoint) {
        BodyMode::Json
    } else if MULTIPART_ENDPOINTS.contains(&endpoint) && !is_get {
        BodyMode::Multipart
    } else {
        BodyMode::Query
    }
}

pub fn is_absolute_url(endpoint: &str) -> bool {
    endpoint.starts_with("http://") || endpoint.starts_with("https://")
}

/// Base URLs the client talks to. Overridable for proxies and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hosts {
    /// Versioned REST host, e.g. `https://api.twitter.com/1.1/`.
    pub rest: String,
    /// Media upload host.
    pub upload: String,
    /// Bare API host without a version path (labs endpoints).
    pub api: String,
    /// Client-credentials exchange endpoint for app-only auth.
    pub bearer_token: String,
}

impl Default for Hosts {
    fn default() -> Self {
        Self {
            rest: REST_API_HOST.to_string(),
            upload: UPLOAD_API_HOST.to_string(),
            api: API_HOST.to_string(),
            bearer_token: BEARER_TOKEN_URL.to_string(),
        }
    }
}

impl Hosts {
    /// Point every host at one base URL (useful against a local mock server).
    pub fn single(base: &str) -> Self {
        let base = format!("{}/", base.trim_end_matches('/'));
        Self {
            rest: format!("{base}1.1/"),
            upload: format!("{base}1.1/"),
            api: base.clone(),
            bearer_token: format!("{base}oauth2/token"),
        }
    }

    /// Full URL for a bare endpoint path (no query string).
    pub fn resolve(&self, endpoint: &str) -> String {
        let path = endpoint.trim_start_matches('/');
        if path.starts_with(LABS_PREFIX) {
            format!("{}{}", with_slash(&self.api), path)
        } else if path.contains(MEDIA_MARKER) {
            format!("{}{}.json", with_slash(&self.upload), path)
        } else {
            format!("{}{}.json", with_slash(&self.rest), path)
        }
    }
}

fn with_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}
