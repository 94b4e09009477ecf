//! Adapter interfaces for external systems.
//!
//! Adapters provide a unified interface for the video-understanding
//! service and the video storage backend, so the tracker never knows
//! whether it is talking to a live HTTP service or a local fixture.

pub mod fixture;
pub mod http;
pub mod storage;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::analysis::VideoAnalysis;

// Re-export the concrete adapters
pub use fixture::FixtureIndexer;
pub use http::HttpIndexer;
pub use storage::LocalVideoStore;

pub use crate::domain::video::VideoAsset;

/// Errors from the video-understanding service.
///
/// `Rejected` is final: resubmitting the same asset will not help.
/// `Transient` is worth retrying with backoff.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("indexer rejected the request: {0}")]
    Rejected(String),

    #[error("transient indexer failure: {0}")]
    Transient(String),
}

impl IndexerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexerError::Transient(_))
    }
}

/// State of an analysis task on the external service
#[derive(Debug, Clone)]
pub enum TaskState {
    /// Still indexing; ask again later
    Processing,
    /// Finished; raw detections attached
    Ready(VideoAnalysis),
    /// The service gave up on this task
    Failed(String),
}

/// Trait for video-understanding services
#[async_trait]
pub trait VideoIndexer: Send + Sync {
    /// Human-readable indexer name
    fn name(&self) -> &str;

    /// Submit an asset for analysis, returning the upstream task id
    async fn submit(&self, asset: &VideoAsset) -> Result<String, IndexerError>;

    /// Fetch the current state of a previously submitted task
    async fn fetch(&self, task_id: &str) -> Result<TaskState, IndexerError>;

    /// Health check (for the doctor command)
    async fn health_check(&self) -> Result<()>;
}

/// Errors from the video storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no video found for reference '{0}'")]
    NotFound(String),

    #[error("invalid video reference '{reference}': {reason}")]
    Invalid { reference: String, reason: String },

    #[error("storage i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for resolving video references to concrete assets
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Resolve a user-supplied reference (path, id) to an asset
    async fn resolve(&self, reference: &str) -> Result<VideoAsset, StoreError>;
}
