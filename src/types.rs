use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, Result};

/// Requester name sent when the caller does not supply one.
pub const DEFAULT_USERNAME: &str = "ios_user";

/// A request to generate one sticker from a phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub phrase: String,
    pub username: String,
}

impl GenerationRequest {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            username: DEFAULT_USERNAME.to_string(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }
}

/// Wire envelope returned by `POST /generate-sticker`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaskAccepted {
    pub success: bool,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub estimated_time: u32,
}

impl TaskAccepted {
    /// Turn an accepted envelope into a [`TaskHandle`], rejecting a failure
    /// flag or an empty task id.
    pub(crate) fn into_handle(self) -> Result<TaskHandle> {
        if !self.success {
            let message = if self.message.is_empty() {
                "Generation request was rejected".to_string()
            } else {
                self.message
            };
            return Err(ApiError::Validation(message));
        }
        let task_id = self.task_id.trim();
        if task_id.is_empty() {
            return Err(ApiError::InvalidResponse(
                "accepted task is missing task_id".into(),
            ));
        }
        Ok(TaskHandle {
            task_id: task_id.to_string(),
            message: self.message,
            estimated_seconds: self.estimated_time,
        })
    }
}

/// A server-side task accepted for generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: String,
    pub message: String,
    pub estimated_seconds: u32,
}

/// Server-side lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One snapshot from `GET /task-status/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub status: TaskState,
    /// Percent complete, 0 to 100.
    pub progress: u32,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Server's estimate of seconds left.
    #[serde(default)]
    pub estimated_remaining: Option<u32>,
}

/// Structured description of a generated sticker.
///
/// Fields the client does not know about are kept in `extra` so the value
/// reaches the caller unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub content_type: String,
    pub meaning: String,
    pub emotion: String,
    pub context: String,
    #[serde(default)]
    pub recommended_style: String,
    #[serde(default)]
    pub recommended_colors: Vec<String>,
    #[serde(default)]
    pub has_user_color_request: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Final payload from `GET /task-result/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, alias = "contentType")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub generation_time: Option<f64>,
    #[serde(default)]
    pub analysis: Option<Analysis>,
    #[serde(default)]
    pub is_islamic: Option<bool>,
}

impl TaskResult {
    /// Check the success envelope and return the asset reference.
    ///
    /// `success == true` requires a non-blank `image_url` and an `analysis`.
    pub fn asset_reference(&self) -> Result<&str> {
        if !self.success {
            let message = if self.message.is_empty() {
                "Unknown error".to_string()
            } else {
                self.message.clone()
            };
            return Err(ApiError::GenerationFailed(message));
        }
        let url = match self.image_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => return Err(ApiError::NoAssetReference),
        };
        if self.analysis.is_none() {
            return Err(ApiError::InvalidResponse(
                "successful result is missing analysis".into(),
            ));
        }
        Ok(url)
    }
}

/// A finished sticker: downloaded image plus the server's analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSticker {
    pub task_id: String,
    pub image: Vec<u8>,
    pub image_url: String,
    pub analysis: Analysis,
    pub message: String,
    pub content_type: Option<String>,
    pub generation_time: Option<f64>,
    pub is_islamic: Option<bool>,
}

/// Agent states reported by `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAgents {
    pub prompt_agent: String,
    pub image_agent: String,
    pub save_agent: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub agents: HealthAgents,
    pub version: String,
    pub islamic_compliance: String,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Response of `GET /examples`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Examples {
    pub textual_examples: Vec<String>,
    pub visual_examples: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Response of `GET /test`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub status: String,
    pub message: String,
    pub timestamp: String,
    pub cors: String,
}

/// Error body the service sends with 4xx/5xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.detail.or(self.message).or(self.error)
    }
}
