//! Fixture-backed indexer for demos and offline runs.
//!
//! Reads canned analyses from a fixtures directory instead of calling the
//! hosted service. Which fixture applies is decided purely by the asset id
//! (`<fixtures_dir>/<video_id>.json`), so scenario selection lives in
//! configuration and asset naming, not in claim-text sniffing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::{IndexerError, TaskState, VideoAsset, VideoIndexer};
use crate::domain::analysis::{VideoAnalysis, VideoDetection};

const TASK_PREFIX: &str = "fx-";

/// Indexer that serves canned analyses from disk
pub struct FixtureIndexer {
    fixtures_dir: PathBuf,

    /// How many fetches return `Processing` before a task turns ready
    polls_until_ready: u32,

    /// Fetch counts per task id
    polls: Mutex<HashMap<String, u32>>,
}

/// On-disk fixture shape: either a detection list or a canned failure
#[derive(Debug, Deserialize)]
struct FixtureFile {
    /// When set, the task reports upstream failure with this message
    #[serde(default)]
    fail: Option<String>,

    #[serde(default)]
    detections: Vec<VideoDetection>,
}

impl FixtureIndexer {
    /// Create an indexer reading from the given fixtures directory
    pub fn new(fixtures_dir: impl Into<PathBuf>) -> Self {
        Self {
            fixtures_dir: fixtures_dir.into(),
            polls_until_ready: 0,
            polls: Mutex::new(HashMap::new()),
        }
    }

    /// Make tasks report `Processing` for the first `n` fetches
    pub fn with_polls_until_ready(mut self, n: u32) -> Self {
        self.polls_until_ready = n;
        self
    }

    fn fixture_path(&self, video_id: &str) -> PathBuf {
        self.fixtures_dir.join(format!("{}.json", video_id))
    }

    fn load_fixture(&self, path: &Path) -> Result<FixtureFile, IndexerError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IndexerError::Rejected(format!("cannot read fixture {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            IndexerError::Rejected(format!("malformed fixture {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl VideoIndexer for FixtureIndexer {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn submit(&self, asset: &VideoAsset) -> Result<String, IndexerError> {
        let path = self.fixture_path(&asset.id);
        if !path.exists() {
            return Err(IndexerError::Rejected(format!(
                "no fixture for video '{}' (expected {})",
                asset.id,
                path.display()
            )));
        }

        let task_id = format!("{}{}", TASK_PREFIX, asset.id);
        debug!(%task_id, "fixture task accepted");
        Ok(task_id)
    }

    async fn fetch(&self, task_id: &str) -> Result<TaskState, IndexerError> {
        let video_id = task_id
            .strip_prefix(TASK_PREFIX)
            .ok_or_else(|| IndexerError::Rejected(format!("unknown task '{}'", task_id)))?;

        let seen = {
            let mut polls = self.polls.lock().await;
            let count = polls.entry(task_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if seen <= self.polls_until_ready {
            return Ok(TaskState::Processing);
        }

        let fixture = self.load_fixture(&self.fixture_path(video_id))?;
        if let Some(message) = fixture.fail {
            return Ok(TaskState::Failed(message));
        }

        let mut analysis = VideoAnalysis::from_detections(fixture.detections);
        analysis.task_id = Some(task_id.to_string());
        Ok(TaskState::Ready(analysis))
    }

    async fn health_check(&self) -> Result<()> {
        if !self.fixtures_dir.is_dir() {
            anyhow::bail!("fixtures directory {} does not exist", self.fixtures_dir.display());
        }
        Ok(())
    }
}
