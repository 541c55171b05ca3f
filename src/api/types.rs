//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::models::ModelDescriptor;

/// Query of `GET /status`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StatusQuery {
    /// Model id the task was created with
    pub model: Option<String>,

    /// Task id returned by the generate call
    #[serde(rename = "taskId")]
    pub task_id: Option<String>,
}

/// Response of a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    /// Public URL of the uploaded file
    pub url: String,
}

/// Response of `GET /models`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub models: &'static [ModelDescriptor],
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether a process-wide API key is configured
    pub server_key: bool,
}
