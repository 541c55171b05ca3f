//! Error taxonomy of the proxy layer.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl turns
//! each variant into a JSON `{error, ...}` payload with its status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No server key and no caller key.
    #[error("API key is not configured. Enter an API key in the client or set FREEPIK_API_KEY on the server.")]
    Unauthorized,

    /// Missing/unknown model, missing ids, malformed body.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Unsupported file format. Use JPG/PNG/WEBP for images or MP4/MOV/WEBM for videos.")]
    UnsupportedMediaType,

    #[error("File is too large. Maximum is {max_mb}MB.")]
    PayloadTooLarge { max_mb: u64 },

    /// Upstream answered with something we cannot use (non-JSON, bad URL, rejected upload).
    #[error("{message}")]
    Upstream {
        message: String,
        raw_snippet: Option<String>,
    },

    /// Upstream reported a failure with a well-formed JSON body.
    #[error("{message}")]
    UpstreamFailure {
        status: StatusCode,
        message: String,
        details: Value,
    },

    /// Status check for a task the upstream does not know.
    #[error("{message}")]
    NotFound { message: String },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_) | Self::UnsupportedMediaType | Self::PayloadTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamFailure { status, .. } => *status,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        let mut body = json!({ "error": self.to_string() });
        match self {
            Self::Upstream {
                raw_snippet: Some(snippet),
                ..
            } => {
                body["rawSnippet"] = Value::String(snippet.clone());
            }
            Self::UpstreamFailure { details, .. } => {
                body["details"] = details.clone();
            }
            Self::NotFound { .. } => {
                body["status"] = json!(StatusCode::NOT_FOUND.as_u16());
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        tracing::error!(error = %e, "Upstream request failed (network error)");
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::UnsupportedMediaType.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::PayloadTooLarge { max_mb: 200 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        let upstream = ApiError::Upstream {
            message: "bad".to_string(),
            raw_snippet: None,
        };
        assert_eq!(upstream.status_code(), StatusCode::BAD_GATEWAY);
        let failure = ApiError::UpstreamFailure {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "invalid image_url".to_string(),
            details: json!({}),
        };
        assert_eq!(failure.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn body_carries_variant_specific_fields() {
        let failure = ApiError::UpstreamFailure {
            status: StatusCode::BAD_REQUEST,
            message: "invalid image_url".to_string(),
            details: json!({ "message": "invalid image_url", "code": 7 }),
        };
        let body = failure.body();
        assert_eq!(body["error"], "invalid image_url");
        assert_eq!(body["details"]["code"], 7);

        let upstream = ApiError::Upstream {
            message: "non-JSON".to_string(),
            raw_snippet: Some("<html>".to_string()),
        };
        assert_eq!(upstream.body()["rawSnippet"], "<html>");

        let plain = ApiError::InvalidRequest("Model ID is required".to_string()).body();
        assert_eq!(plain, json!({ "error": "Model ID is required" }));
    }
}
