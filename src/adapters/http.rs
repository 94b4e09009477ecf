//! HTTP client for the hosted video-understanding service.
//!
//! Endpoints: POST /tasks to submit, GET /tasks/{id} to poll.
//! Auth: Bearer token

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{IndexerError, TaskState, VideoAsset, VideoIndexer};
use crate::domain::analysis::VideoAnalysis;

/// Video-understanding service client
pub struct HttpIndexer {
    base_url: String,
    token: String,
    timeout: Duration,
    client: reqwest::Client,
}

/// Payload for task submission
#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    video_id: &'a str,
    duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

/// Response from task submission
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    task_id: String,
}

/// Response from the task status endpoint
#[derive(Debug, Deserialize)]
struct TaskResponse {
    status: String,
    #[serde(default)]
    analysis: Option<VideoAnalysis>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpIndexer {
    /// Create a new client
    pub fn new(base_url: String, token: String, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn task_url(&self, task_id: &str) -> String {
        format!("{}/tasks/{}", self.base_url, task_id)
    }

    /// Map a transport-level failure onto the retry taxonomy.
    /// Timeouts and connection errors are transient; anything else
    /// (malformed URL, TLS setup) will not improve on retry.
    fn transport_error(err: reqwest::Error) -> IndexerError {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            IndexerError::Transient(err.to_string())
        } else {
            IndexerError::Rejected(err.to_string())
        }
    }

    /// Map an HTTP status onto the retry taxonomy
    async fn status_error(response: reqwest::Response) -> IndexerError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = format!("{}: {}", status, body.trim());
        if status.is_server_error() || status.as_u16() == 429 {
            IndexerError::Transient(message)
        } else {
            IndexerError::Rejected(message)
        }
    }
}

#[async_trait]
impl VideoIndexer for HttpIndexer {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(&self, asset: &VideoAsset) -> Result<String, IndexerError> {
        let payload = SubmitRequest {
            video_id: &asset.id,
            duration_secs: asset.duration_secs,
            title: asset.title.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/tasks", self.base_url))
            .header("Authorization", format!("Bearer {}", self.token))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let accepted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| IndexerError::Rejected(format!("malformed submit response: {}", e)))?;

        debug!(task_id = %accepted.task_id, video_id = %asset.id, "task accepted");
        Ok(accepted.task_id)
    }

    async fn fetch(&self, task_id: &str) -> Result<TaskState, IndexerError> {
        let response = self
            .client
            .get(self.task_url(task_id))
            .header("Authorization", format!("Bearer {}", self.token))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if response.status().as_u16() == 404 {
            return Err(IndexerError::Rejected(format!("unknown task '{}'", task_id)));
        }
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let task: TaskResponse = response
            .json()
            .await
            .map_err(|e| IndexerError::Transient(format!("malformed task response: {}", e)))?;

        match task.status.as_str() {
            "queued" | "processing" | "indexing" => Ok(TaskState::Processing),
            "ready" => {
                let analysis = task.analysis.ok_or_else(|| {
                    IndexerError::Rejected("task ready but no analysis attached".to_string())
                })?;
                Ok(TaskState::Ready(analysis))
            }
            "failed" => Ok(TaskState::Failed(
                task.error.unwrap_or_else(|| "unspecified upstream failure".to_string()),
            )),
            other => Err(IndexerError::Rejected(format!("unknown task status '{}'", other))),
        }
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .header("Authorization", format!("Bearer {}", self.token))
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to reach indexer health endpoint")?;

        if !response.status().is_success() {
            anyhow::bail!("Indexer health check failed: {}", response.status());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let indexer = HttpIndexer::new(
            "https://api.example.com/v1/".to_string(),
            "secret".to_string(),
            Duration::from_secs(10),
        );
        assert_eq!(indexer.task_url("t-1"), "https://api.example.com/v1/tasks/t-1");
    }

    #[test]
    fn test_task_response_parsing() {
        let raw = r#"{"status": "ready", "analysis": {"detections": []}}"#;
        let task: TaskResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(task.status, "ready");
        assert!(task.analysis.is_some());

        let raw = r#"{"status": "failed", "error": "unreadable codec"}"#;
        let task: TaskResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(task.error.as_deref(), Some("unreadable codec"));
    }
}
