//! Turns `(method, endpoint, params)` into a transport-ready request.

use std::{fmt, str::FromStr};

use serde_json::Value;

use crate::{
    auth::SigningContext,
    endpoints::{classify, is_absolute_url, BodyMode, Hosts},
    errors::ValidationError,
    params::{bind_path, form_fields, normalize, query_string, Params},
};

/// HTTP verbs accepted by the API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "PUT" => Ok(Method::Put),
            "POST" => Ok(Method::Post),
            "DELETE" => Ok(Method::Delete),
            _ => Err(ValidationError::new("Invalid HTTP method").with_field("method")),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A call as the caller describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    /// Bare path such as `statuses/show/:id`, or a full URL.
    pub endpoint: String,
    pub params: Params,
}

impl RequestSpec {
    pub fn new(method: Method, endpoint: impl Into<String>, params: Params) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            params,
        }
    }
}

/// Request body in its wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// `multipart/form-data` text fields. The transport owns the boundary and
    /// therefore the `Content-Type` header.
    Multipart(Vec<(String, String)>),
    /// Pre-encoded `application/x-www-form-urlencoded` text.
    UrlEncoded(String),
}

/// Transport-ready request descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    /// Full URL, including any query string.
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    /// OAuth material for user-context requests.
    pub signing: Option<SigningContext>,
}

impl ResolvedRequest {
    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// The URL without its query string (what OAuth signs as the base URL).
    pub fn base_url(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }

    /// Query parameters decoded from the URL, in order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        reqwest::Url::parse(&self.url)
            .map(|url| {
                url.query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Form field value from a multipart body.
    pub fn form_field(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Multipart(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Compose a request from a `RequestSpec`. Fails before any network access when a path
/// placeholder has no matching parameter.
pub fn build(
    hosts: &Hosts,
    user_agent: &str,
    spec: RequestSpec,
) -> Result<ResolvedRequest, ValidationError> {
    let RequestSpec {
        method,
        endpoint,
        mut params,
    } = spec;

    let endpoint = bind_path(&endpoint, &mut params)?;
    normalize(&mut params);

    let mut request = ResolvedRequest {
        url: String::new(),
        method,
        headers: vec![
            ("Accept".to_string(), "*/*".to_string()),
            ("User-Agent".to_string(), user_agent.to_string()),
        ],
        body: RequestBody::Empty,
        signing: None,
    };

    let mode = if is_absolute_url(&endpoint) {
        request.url = endpoint;
        BodyMode::Query
    } else {
        let bare = endpoint.trim_start_matches('/');
        request.url = hosts.resolve(bare);
        classify(bare, method == Method::Get)
    };

    match mode {
        BodyMode::Json => {
            request.set_header("Content-Type", "application/json");
            request.body = RequestBody::Json(Value::Object(params));
        }
        BodyMode::Multipart => {
            request.body = RequestBody::Multipart(form_fields(&params));
        }
        BodyMode::Query => {
            if !params.is_empty() {
                let separator = if request.url.contains('?') { '&' } else { '?' };
                request.url = format!("{}{}{}", request.url, separator, query_string(&params));
            }
        }
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(method: Method, endpoint: &str, params: Value) -> RequestSpec {
        let params = match params {
            Value::Object(map) => map,
            _ => Params::new(),
        };
        RequestSpec::new(method, endpoint, params)
    }

    fn build_default(spec: RequestSpec) -> Result<ResolvedRequest, ValidationError> {
        build(&Hosts::default(), "twttr-api-client", spec)
    }

    #[test]
    fn method_parsing_rejects_unknown_verbs() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        let err = "PATCH".parse::<Method>().unwrap_err();
        assert_eq!(err.message, "Invalid HTTP method");
    }

    #[test]
    fn query_endpoints_encode_remaining_params() {
        let req = build_default(spec(
            Method::Get,
            "statuses/show/:id",
            json!({ "id": "20", "include_entities": true }),
        ))
        .unwrap();
        assert_eq!(
            req.url,
            "https://api.twitter.com/1.1/statuses/show/20.json?include_entities=true"
        );
        assert_eq!(req.body, RequestBody::Empty);
        assert_eq!(req.header("accept"), Some("*/*"));
        assert_eq!(req.header("user-agent"), Some("twttr-api-client"));
    }

    #[test]
    fn json_endpoints_send_a_json_body() {
        let req = build_default(spec(
            Method::Post,
            "direct_messages/events/new",
            json!({ "event": { "type": "message_create" } }),
        ))
        .unwrap();
        assert_eq!(
            req.url,
            "https://api.twitter.com/1.1/direct_messages/events/new.json"
        );
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(
            req.body,
            RequestBody::Json(json!({ "event": { "type": "message_create" } }))
        );
    }

    #[test]
    fn multipart_endpoints_send_form_fields_except_on_get() {
        let post = build_default(spec(
            Method::Post,
            "media/upload",
            json!({ "command": "FINALIZE", "media_id": "42" }),
        ))
        .unwrap();
        assert_eq!(post.url, "https://upload.twitter.com/1.1/media/upload.json");
        assert_eq!(post.form_field("command"), Some("FINALIZE"));
        assert_eq!(post.form_field("media_id"), Some("42"));

        let get = build_default(spec(
            Method::Get,
            "media/upload",
            json!({ "command": "STATUS", "media_id": "42" }),
        ))
        .unwrap();
        assert_eq!(
            get.url,
            "https://upload.twitter.com/1.1/media/upload.json?command=STATUS&media_id=42"
        );
        assert_eq!(get.body, RequestBody::Empty);
    }

    #[test]
    fn array_params_become_comma_joined_strings() {
        let req = build_default(spec(
            Method::Get,
            "users/lookup",
            json!({ "screen_name": ["a", "b", "c"] }),
        ))
        .unwrap();
        assert!(req.url.ends_with("users/lookup.json?screen_name=a%2Cb%2Cc"));
        assert_eq!(
            req.query_pairs(),
            vec![("screen_name".to_string(), "a,b,c".to_string())]
        );
    }

    #[test]
    fn missing_placeholder_fails_even_with_empty_params() {
        let err = build_default(spec(Method::Get, "statuses/show/:id", json!({}))).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("id"));
    }

    #[test]
    fn absolute_urls_bypass_catalog() {
        let req = build_default(spec(
            Method::Post,
            "https://example.com/custom/media/endpoint",
            json!({ "q": "it's" }),
        ))
        .unwrap();
        assert_eq!(req.url, "https://example.com/custom/media/endpoint?q=it%27s");
        assert_eq!(req.body, RequestBody::Empty);
        assert_eq!(req.base_url(), "https://example.com/custom/media/endpoint");
    }

    #[test]
    fn labs_endpoints_have_no_suffix() {
        let req = build_default(spec(Method::Get, "labs/2/tweets/:id", json!({ "id": "7" }))).unwrap();
        assert_eq!(req.url, "https://api.twitter.com/labs/2/tweets/7");
    }
}
