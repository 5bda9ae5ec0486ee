//! Classification of raw transport results into success values or errors.

use serde_json::Value;

use crate::{
    errors::{ApiError, Error, ProtocolError, Result, TransportError},
    transport::{RawResponse, ResponseMeta},
    RESPONSE_META_KEY,
};

/// Normalize a transport result.
///
/// Order of checks: transport failure, then JSON parsing of a non-empty body,
/// then the error test (an `error`/`errors` field or a status outside 2xx).
/// When `wants_metadata` is set the response status and headers are attached
/// to the returned body, or to the error as `raw_payload`.
pub fn normalize(result: Result<RawResponse, TransportError>, wants_metadata: bool) -> Result<Value> {
    let raw = result?;
    let meta = wants_metadata.then(|| raw.meta());

    let body = if raw.body.trim().is_empty() {
        None
    } else {
        match serde_json::from_str::<Value>(&raw.body) {
            Ok(value) => Some(value),
            Err(err) => {
                return Err(ProtocolError {
                    message: format!("Invalid JSON body: {err}"),
                    status_code: Some(raw.status),
                    body: raw.body,
                    raw_payload: meta,
                }
                .into())
            }
        }
    };

    if carries_error(body.as_ref()) || !is_success(raw.status) {
        let mut err = body_error(body.as_ref(), Some(raw.status));
        err.raw_payload = meta;
        return Err(Error::Api(err));
    }

    Ok(attach_meta(body.unwrap_or(Value::Null), meta))
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn carries_error(body: Option<&Value>) -> bool {
    let Some(obj) = body.and_then(Value::as_object) else {
        return false;
    };
    obj.get("error").is_some_and(is_truthy) || obj.get("errors").is_some_and(is_truthy)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Extract code, message and sub-errors from an error body.
///
/// Precedence: a string `error` is the message verbatim; an `error` object
/// contributes its code and message and becomes a one-element list; otherwise
/// the first entry of `errors` supplies code and message and the whole list is
/// kept.
pub fn body_error(body: Option<&Value>, status_code: Option<u16>) -> ApiError {
    let mut err = ApiError::new(status_code, None);
    let Some(body) = body else {
        return err;
    };

    let Some(obj) = body.as_object() else {
        err.message = Some(match body {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        return err;
    };

    match obj.get("error") {
        Some(Value::Object(inner)) => {
            err.code = inner.get("code").and_then(code_of);
            err.message = inner.get("message").and_then(message_of);
            err.errors = vec![Value::Object(inner.clone())];
        }
        Some(value) if is_truthy(value) => {
            err.message = message_of(value);
        }
        _ => {
            if let Some(Value::Array(list)) = obj.get("errors") {
                if let Some(first) = list.first() {
                    err.code = first.get("code").and_then(code_of);
                    err.message = first.get("message").and_then(message_of);
                }
                err.errors = list.clone();
            }
        }
    }
    err
}

fn code_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn message_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn attach_meta(body: Value, meta: Option<ResponseMeta>) -> Value {
    let Some(meta) = meta else {
        return body;
    };
    let meta = serde_json::to_value(meta).unwrap_or(Value::Null);
    match body {
        Value::Object(mut map) => {
            map.insert(RESPONSE_META_KEY.to_string(), meta);
            Value::Object(map)
        }
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_string(), other);
            map.insert(RESPONSE_META_KEY.to_string(), meta);
            Value::Object(map)
        }
    }
}
