//! Request parameter handling: `/:name` path placeholders, array flattening and
//! query-string encoding.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

use crate::errors::ValidationError;

/// Parameter bag for a single call.
pub type Params = serde_json::Map<String, Value>;

/// Everything except RFC 3986 unreserved characters. This also escapes
/// `! ' ( ) *`, which some transports pass through unescaped.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Replace each `/:name` segment of `endpoint` with the matching parameter.
///
/// Matched parameters are removed from `params` so they are not sent again in
/// the query or body.
pub fn bind_path(endpoint: &str, params: &mut Params) -> Result<String, ValidationError> {
    let mut out = String::with_capacity(endpoint.len());
    let mut rest = endpoint;

    while let Some(pos) = rest.find("/:") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if name_len == 0 {
            out.push_str("/:");
            rest = after;
            continue;
        }

        let name = &after[..name_len];
        let value = params
            .remove(name)
            .filter(is_present)
            .ok_or_else(|| {
                ValidationError::new(format!("Missing required parameter {name}")).with_field(name)
            })?;
        out.push('/');
        out.push_str(&value_to_string(&value));
        rest = &after[name_len..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Flatten array values into comma-joined strings, preserving order.
///
/// Embedded commas are not escaped.
pub fn normalize(params: &mut Params) {
    for value in params.values_mut() {
        if let Value::Array(items) = value {
            let joined = join_array(items);
            *value = Value::String(joined);
        }
    }
}

/// Percent-encode the parameters as `key=value` pairs joined by `&`.
pub fn query_string(params: &Params) -> String {
    params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                encode_component(key),
                encode_component(&value_to_string(value))
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Parameters as plain string pairs, for form bodies.
pub fn form_fields(params: &Params) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), value_to_string(value)))
        .collect()
}

pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, QUERY_ENCODE_SET).to_string()
}

/// Text form of a parameter value as it goes on the wire.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => join_array(items),
        Value::Object(_) => value.to_string(),
    }
}

fn join_array(items: &[Value]) -> String {
    items
        .iter()
        .map(value_to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
