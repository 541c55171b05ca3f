//! Calls from the client to the proxy endpoints.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::error::ClientError;
use crate::api::auth::CLIENT_KEY_HEADER;
use crate::api::FILE_FIELD;

/// A local file picked for upload.
#[derive(Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Read a file from disk, deriving its MIME type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = mime_for_path(path).to_string();
        Ok(Self::new(file_name, content_type, Bytes::from(data)))
    }
}

/// MIME type for the image and video extensions the upload accepts.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "m4v" => "video/x-m4v",
        _ => "application/octet-stream",
    }
}

/// The proxy operations the controller depends on.
#[async_trait]
pub trait ProxyApi: Send + Sync {
    /// Upload a file; returns its public URL.
    async fn upload(&self, file: &UploadFile) -> Result<String, ClientError>;

    /// Submit a generation; returns the proxy's JSON body.
    async fn generate(&self, body: &Value, api_key: Option<&str>) -> Result<Value, ClientError>;

    /// Check a task; returns the proxy's JSON body.
    async fn status(
        &self,
        model_id: &str,
        task_id: &str,
        api_key: Option<&str>,
    ) -> Result<Value, ClientError>;
}

/// `ProxyApi` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProxyClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpProxyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn with_key(
        &self,
        request: reqwest::RequestBuilder,
        api_key: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match api_key.filter(|k| !k.is_empty()) {
            Some(key) => request.header(CLIENT_KEY_HEADER, key),
            None => request,
        }
    }
}

#[async_trait]
impl ProxyApi for HttpProxyClient {
    async fn upload(&self, file: &UploadFile) -> Result<String, ClientError> {
        let part = Part::bytes(file.data.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)?;
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let body = decode(response, "Upload failed").await?;

        body.get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Decode("upload response has no url".to_string()))
    }

    async fn generate(&self, body: &Value, api_key: Option<&str>) -> Result<Value, ClientError> {
        let request = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(body);
        let response = self.with_key(request, api_key).send().await?;
        decode(response, "Generation failed").await
    }

    async fn status(
        &self,
        model_id: &str,
        task_id: &str,
        api_key: Option<&str>,
    ) -> Result<Value, ClientError> {
        let url = format!(
            "{}/status?model={}&taskId={}",
            self.base_url,
            urlencoding::encode(model_id),
            urlencoding::encode(task_id)
        );
        let response = self.with_key(self.client.get(url), api_key).send().await?;
        decode(response, "Failed to check status").await
    }
}

/// Parse a proxy reply; failures carry the proxy's `error` text.
async fn decode(response: reqwest::Response, fallback: &str) -> Result<Value, ClientError> {
    let status = response.status();
    let text = response.text().await?;
    let body: Option<Value> = serde_json::from_str(&text).ok();

    if !status.is_success() {
        let message = body
            .as_ref()
            .and_then(|b| b.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} ({})", fallback, status.as_u16()));
        return Err(ClientError::Http {
            status: status.as_u16(),
            message,
        });
    }

    body.ok_or_else(|| ClientError::Decode(format!("expected JSON, got {} bytes", text.len())))
}
