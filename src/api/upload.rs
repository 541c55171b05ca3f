//! Upload proxy: `POST /upload`.
//!
//! Accepts one multipart `file`, checks its type and size, and re-uploads it
//! to the anonymous file host. The host answers with a bare-text public URL.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use reqwest::multipart::{Form, Part};

use super::error::ApiError;
use super::routes::AppState;
use super::types::UploadResponse;

/// Multipart field the client sends the file in.
pub const FILE_FIELD: &str = "file";

pub(crate) async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|e| ApiError::InvalidRequest(format!("Invalid upload request: {}", e)))?;

    let max_bytes = state.config.max_upload_bytes;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        validate_media_type(&content_type)?;

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read upload: {}", e)))?
        {
            check_size(data.len() as u64 + chunk.len() as u64, max_bytes)?;
            data.extend_from_slice(&chunk);
        }

        tracing::info!(
            file_name = %file_name,
            content_type = %content_type,
            size = data.len(),
            "Forwarding upload to file host"
        );
        let url = forward_to_host(&state, file_name, &content_type, data).await?;
        return Ok(Json(UploadResponse { url }));
    }

    Err(ApiError::InvalidRequest("A file is required".to_string()))
}

/// Only images and videos are accepted.
pub fn validate_media_type(content_type: &str) -> Result<(), ApiError> {
    if content_type.starts_with("image/") || content_type.starts_with("video/") {
        Ok(())
    } else {
        Err(ApiError::UnsupportedMediaType)
    }
}

/// Reject sizes above `max_bytes`; exactly `max_bytes` is accepted.
pub fn check_size(size: u64, max_bytes: u64) -> Result<(), ApiError> {
    if size > max_bytes {
        Err(ApiError::PayloadTooLarge {
            max_mb: max_bytes / (1024 * 1024),
        })
    } else {
        Ok(())
    }
}

async fn forward_to_host(
    state: &AppState,
    file_name: String,
    content_type: &str,
    data: Vec<u8>,
) -> Result<String, ApiError> {
    let part = Part::bytes(data)
        .file_name(file_name)
        .mime_str(content_type)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid content type: {}", e)))?;
    let form = Form::new()
        .text("reqtype", "fileupload")
        .part("fileToUpload", part);

    let response = state
        .http_client
        .post(&state.config.upload_url)
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        tracing::error!(status = %status, body = %text, "Upload: file host error");
        return Err(ApiError::Upstream {
            message: format!("Upload failed ({}). Please try again.", status.as_u16()),
            raw_snippet: None,
        });
    }

    parse_host_url(&text)
}

/// The host's success body is the public URL itself.
fn parse_host_url(text: &str) -> Result<String, ApiError> {
    let url = text.trim();
    if url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        tracing::error!(body = %text, "Upload: invalid file host response");
        Err(ApiError::Upstream {
            message: "Upload failed: invalid response from file host.".to_string(),
            raw_snippet: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_UPLOAD_BYTES;

    #[test]
    fn accepts_only_images_and_videos() {
        assert!(validate_media_type("image/png").is_ok());
        assert!(validate_media_type("video/mp4").is_ok());
        assert!(matches!(
            validate_media_type("application/pdf"),
            Err(ApiError::UnsupportedMediaType)
        ));
        assert!(validate_media_type("").is_err());
    }

    #[test]
    fn size_limit_is_inclusive() {
        let max = DEFAULT_MAX_UPLOAD_BYTES;
        assert_eq!(max, 200 * 1024 * 1024);
        assert!(check_size(max, max).is_ok());
        assert!(matches!(
            check_size(max + 1, max),
            Err(ApiError::PayloadTooLarge { max_mb: 200 })
        ));
    }

    #[test]
    fn host_url_is_trimmed_and_must_be_https() {
        assert_eq!(
            parse_host_url("https://files.catbox.moe/abc.mp4\n").unwrap(),
            "https://files.catbox.moe/abc.mp4"
        );
        assert!(parse_host_url("http://files.catbox.moe/abc.mp4").is_err());
        assert!(parse_host_url("").is_err());
    }
}
