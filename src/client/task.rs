//! Client-held task, history and upload records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a generation task as reported by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Created,
    InProgress,
    Completed,
    Done,
    Failed,
    Error,
    Unknown,
}

impl TaskStatus {
    /// Parse a remote status string. Anything unrecognized is `Unknown`.
    pub fn from_remote(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "CREATED" => Self::Created,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETED" => Self::Completed,
            "DONE" => Self::Done,
            "FAILED" => Self::Failed,
            "ERROR" => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::Done)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }

    /// Polling stops once a task reaches one of these.
    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }

    /// Style class used when displaying the status.
    pub fn display_class(&self) -> &'static str {
        match self {
            Self::Completed | Self::Done => "completed",
            Self::Failed | Self::Error => "failed",
            Self::InProgress => "in_progress",
            Self::Created | Self::Unknown => "created",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The generation currently tracked by the client.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationTask {
    pub task_id: String,
    pub model_id: String,
    pub model_name: String,
    pub status: TaskStatus,
    /// Result URLs, empty until the remote reports some
    pub generated: Vec<String>,
    pub error: Option<String>,
    pub prompt: Option<String>,
}

impl GenerationTask {
    pub fn first_result(&self) -> Option<&str> {
        self.generated.first().map(String::as_str)
    }
}

/// A completed generation kept for the session.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub model_name: String,
    pub prompt: String,
    pub video_url: String,
    pub created_at: DateTime<Utc>,
}

/// Upload progress of one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadState {
    pub uploading: bool,
    pub progress: String,
    pub file_name: Option<String>,
    pub succeeded: bool,
}

impl UploadState {
    pub fn started(file_name: &str) -> Self {
        Self {
            uploading: true,
            progress: "Uploading...".to_string(),
            file_name: Some(file_name.to_string()),
            succeeded: false,
        }
    }

    pub fn succeeded(file_name: &str) -> Self {
        Self {
            uploading: false,
            progress: "Uploaded".to_string(),
            file_name: Some(file_name.to_string()),
            succeeded: true,
        }
    }

    pub fn failed(file_name: &str, message: String) -> Self {
        Self {
            uploading: false,
            progress: message,
            file_name: Some(file_name.to_string()),
            succeeded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_remote_statuses() {
        assert_eq!(TaskStatus::from_remote("IN_PROGRESS"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::from_remote("done"), TaskStatus::Done);
        assert_eq!(TaskStatus::from_remote("PROCESSING"), TaskStatus::Unknown);
        assert_eq!(TaskStatus::from_remote(""), TaskStatus::Unknown);
    }

    #[test]
    fn terminal_statuses() {
        for status in [
            TaskStatus::Completed,
            TaskStatus::Done,
            TaskStatus::Failed,
            TaskStatus::Error,
        ] {
            assert!(status.is_terminal(), "{} should be terminal", status);
        }
        for status in [TaskStatus::Created, TaskStatus::InProgress, TaskStatus::Unknown] {
            assert!(!status.is_terminal(), "{} should not be terminal", status);
        }
    }

    #[test]
    fn display_classes() {
        assert_eq!(TaskStatus::Done.display_class(), "completed");
        assert_eq!(TaskStatus::Error.display_class(), "failed");
        assert_eq!(TaskStatus::InProgress.display_class(), "in_progress");
        assert_eq!(TaskStatus::Unknown.display_class(), "created");
    }
}
