//! Shared handling of generation API responses.
//!
//! The generation API sometimes answers with HTML error pages or empty bodies
//! (gateway timeouts, 5xx). Only `application/json` bodies are ever parsed.

use axum::http::{header, HeaderMap, StatusCode};
use serde_json::Value;

use super::error::ApiError;

/// A response body split by content type.
#[derive(Debug)]
pub enum UpstreamBody {
    Json(Value),
    NonJson(String),
}

/// Status and body of an upstream reply.
#[derive(Debug)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: UpstreamBody,
}

pub fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false)
}

/// Read the reply, parsing the body only when it is declared as JSON.
///
/// A JSON content type with an unparseable body is reported as an upstream error.
pub async fn read_reply(response: reqwest::Response) -> Result<UpstreamReply, ApiError> {
    let status = response.status();
    let json = is_json_content(response.headers());
    let text = response.text().await?;

    let body = if json {
        match serde_json::from_str(&text) {
            Ok(value) => UpstreamBody::Json(value),
            Err(e) => {
                tracing::error!(
                    status = %status,
                    error = %e,
                    body = %snippet(&text, 500),
                    "Upstream declared JSON but body did not parse"
                );
                return Err(ApiError::Upstream {
                    message: format!("Upstream API returned malformed JSON ({}).", status.as_u16()),
                    raw_snippet: None,
                });
            }
        }
    } else {
        UpstreamBody::NonJson(text)
    };

    Ok(UpstreamReply { status, body })
}

/// Error text of a JSON failure body: `message`, then `error`, then `fallback`.
pub fn error_message(body: &Value, fallback: &str) -> String {
    ["message", "error"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Null | Value::Bool(false) | Value::String(_) => None,
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// First `max_chars` characters of `text`.
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_detection_accepts_charset_suffix() {
        let mut headers = HeaderMap::new();
        assert!(!is_json_content(&headers));
        headers.insert(header::CONTENT_TYPE, "text/html".parse().unwrap());
        assert!(!is_json_content(&headers));
        headers.insert(
            header::CONTENT_TYPE,
            "application/json; charset=utf-8".parse().unwrap(),
        );
        assert!(is_json_content(&headers));
    }

    #[test]
    fn error_message_prefers_message_then_error() {
        assert_eq!(
            error_message(&json!({ "message": "m", "error": "e" }), "f"),
            "m"
        );
        assert_eq!(error_message(&json!({ "error": "e" }), "f"), "e");
        assert_eq!(error_message(&json!({ "message": "" }), "f"), "f");
        assert_eq!(
            error_message(&json!({ "error": { "code": 3 } }), "f"),
            r#"{"code":3}"#
        );
        assert_eq!(error_message(&json!([]), "f"), "f");
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        assert_eq!(snippet("héllo", 2), "hé");
        assert_eq!(snippet("abc", 10), "abc");
    }
}
