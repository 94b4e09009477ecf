//! Job Tracker Integration Tests
//!
//! Exercise the submission lifecycle against scripted upstream
//! responses: acknowledgement, retries, rejection, reconciliation,
//! idempotent completion and journal replay after restart.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use alibi::adapters::{IndexerError, StoreError, TaskState, VideoIndexer, VideoStore};
use alibi::core::tracker::TrackerError;
use alibi::core::{JobJournal, JobTracker, RetryPolicy};
use alibi::domain::{FailureKind, JobStatus, VideoAnalysis, VideoAsset, VideoDetection};

/// Indexer that replays canned responses in order. An exhausted script
/// rejects, so a test fails loudly if the tracker calls upstream more
/// than scripted.
struct ScriptedIndexer {
    submits: Mutex<VecDeque<Result<String, IndexerError>>>,
    fetches: Mutex<VecDeque<Result<TaskState, IndexerError>>>,
}

impl ScriptedIndexer {
    fn new(
        submits: Vec<Result<String, IndexerError>>,
        fetches: Vec<Result<TaskState, IndexerError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            submits: Mutex::new(submits.into()),
            fetches: Mutex::new(fetches.into()),
        })
    }
}

#[async_trait]
impl VideoIndexer for ScriptedIndexer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, _asset: &VideoAsset) -> Result<String, IndexerError> {
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(IndexerError::Rejected("submit script exhausted".to_string())))
    }

    async fn fetch(&self, _task_id: &str) -> Result<TaskState, IndexerError> {
        self.fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(IndexerError::Rejected("fetch script exhausted".to_string())))
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

struct MemoryStore {
    assets: HashMap<String, VideoAsset>,
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn resolve(&self, reference: &str) -> Result<VideoAsset, StoreError> {
        self.assets
            .get(reference)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))
    }
}

fn dock_asset() -> VideoAsset {
    VideoAsset {
        id: "dock-cam".to_string(),
        title: Some("Dock 4 overnight".to_string()),
        duration_secs: 3600.0,
        recorded_at: Some("2024-03-01T20:30:00Z".parse().unwrap()),
        uploaded_at: Utc::now(),
    }
}

fn store_with_dock() -> Arc<MemoryStore> {
    let mut assets = HashMap::new();
    assets.insert("dock-cam".to_string(), dock_asset());
    Arc::new(MemoryStore { assets })
}

/// Millisecond delays so retry tests run fast
fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        backoff_multiplier: 1.0,
    }
}

fn journal_at(temp: &TempDir) -> (JobJournal, PathBuf) {
    let path = temp.path().join("jobs.jsonl");
    (JobJournal::open(&path).unwrap(), path)
}

fn transient(message: &str) -> IndexerError {
    IndexerError::Transient(message.to_string())
}

fn dock_analysis() -> VideoAnalysis {
    VideoAnalysis::from_detections(vec![
        VideoDetection::visual("subject location: warehouse loading dock", 1794.0, 0.91),
        VideoDetection::visual("person loading crates onto truck", 1812.0, 0.86)
            .with_end(1890.0),
        VideoDetection::speech("hurry up with those crates", 1830.0, 0.9)
            .with_speaker("foreman"),
    ])
}

#[tokio::test]
async fn test_submit_acknowledged() {
    let temp = TempDir::new().unwrap();
    let (journal, path) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(vec![Ok("tsk-1".to_string())], vec![]);
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let record = tracker.submit("dock-cam").await.unwrap();

    assert_eq!(record.status, JobStatus::Running);
    assert_eq!(record.attempts, 1);
    assert_eq!(record.upstream_task_id.as_deref(), Some("tsk-1"));
    assert_eq!(record.video_id(), "dock-cam");

    // Submission and acknowledgement both journaled
    let journal_text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(journal_text.lines().count(), 2);
    assert!(journal_text.contains("\"event\":\"submitted\""));
    assert!(journal_text.contains("\"event\":\"accepted\""));
}

#[tokio::test]
async fn test_submit_retries_transient_then_succeeds() {
    let temp = TempDir::new().unwrap();
    let (journal, _) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(
        vec![
            Err(transient("503 service unavailable")),
            Err(transient("connection reset")),
            Ok("tsk-9".to_string()),
        ],
        vec![],
    );
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let record = tracker.submit("dock-cam").await.unwrap();

    assert_eq!(record.status, JobStatus::Running);
    assert_eq!(record.attempts, 3);
    assert_eq!(record.upstream_task_id.as_deref(), Some("tsk-9"));
}

#[tokio::test]
async fn test_submit_rejection_fails_without_retry() {
    let temp = TempDir::new().unwrap();
    let (journal, _) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(
        vec![Err(IndexerError::Rejected("unsupported codec".to_string()))],
        vec![],
    );
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let err = tracker.submit("dock-cam").await.unwrap_err();
    assert!(matches!(err, TrackerError::UpstreamRejected(_)));

    // The job exists and is terminal; no second submit was attempted
    let jobs = tracker.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Failed);
    let failure = jobs[0].error.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::UpstreamRejected);
    assert!(failure.message.contains("unsupported codec"));
}

#[tokio::test]
async fn test_submit_exhausts_retries() {
    let temp = TempDir::new().unwrap();
    let (journal, _) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(
        vec![
            Err(transient("timeout")),
            Err(transient("timeout")),
            Err(transient("timeout")),
        ],
        vec![],
    );
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let err = tracker.submit("dock-cam").await.unwrap_err();
    match err {
        TrackerError::UpstreamTimeout { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected UpstreamTimeout, got {:?}", other),
    }

    let jobs = tracker.jobs().await;
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert_eq!(jobs[0].error.as_ref().unwrap().kind, FailureKind::UpstreamTimeout);
}

#[tokio::test]
async fn test_submit_unknown_video_leaves_no_trace() {
    let temp = TempDir::new().unwrap();
    let (journal, path) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(vec![], vec![]);
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let err = tracker.submit("missing-cam").await.unwrap_err();
    assert!(matches!(err, TrackerError::Submission(_)));

    // Resolution failed before any record was created
    assert!(tracker.jobs().await.is_empty());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_poll_is_pure_and_unknown_is_not_found() {
    let temp = TempDir::new().unwrap();
    let (journal, path) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(vec![Ok("tsk-1".to_string())], vec![]);
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let record = tracker.submit("dock-cam").await.unwrap();
    let lines_before = std::fs::read_to_string(&path).unwrap().lines().count();

    let first = tracker.poll(record.id).await.unwrap();
    let second = tracker.poll(record.id).await.unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    // Polling wrote nothing
    let lines_after = std::fs::read_to_string(&path).unwrap().lines().count();
    assert_eq!(lines_before, lines_after);

    let err = tracker.poll(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, TrackerError::NotFound(_)));
}

#[tokio::test]
async fn test_reconcile_drives_job_to_completion() {
    let temp = TempDir::new().unwrap();
    let (journal, _) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(
        vec![Ok("tsk-1".to_string())],
        vec![Ok(TaskState::Processing), Ok(TaskState::Ready(dock_analysis()))],
    );
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let record = tracker.submit("dock-cam").await.unwrap();

    // Still processing: no transition
    let still_running = tracker.reconcile(record.id).await.unwrap();
    assert_eq!(still_running.status, JobStatus::Running);

    // Ready: normalized evidence attached
    let done = tracker.reconcile(record.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Succeeded);
    let pack = done.evidence.as_ref().unwrap();
    assert!(!pack.events.is_empty());
    assert_eq!(pack.quotes.len(), 1);
    assert_eq!(pack.source.video_id, "dock-cam");
}

#[tokio::test]
async fn test_reconcile_upstream_failure_fails_job() {
    let temp = TempDir::new().unwrap();
    let (journal, _) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(
        vec![Ok("tsk-1".to_string())],
        vec![Ok(TaskState::Failed("gpu meltdown".to_string()))],
    );
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let record = tracker.submit("dock-cam").await.unwrap();
    let failed = tracker.reconcile(record.id).await.unwrap();

    assert_eq!(failed.status, JobStatus::Failed);
    let failure = failed.error.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::UpstreamRejected);
    assert!(failure.message.contains("gpu meltdown"));
}

#[tokio::test]
async fn test_reconcile_transient_error_leaves_record_untouched() {
    let temp = TempDir::new().unwrap();
    let (journal, path) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(
        vec![Ok("tsk-1".to_string())],
        vec![Err(transient("upstream timed out"))],
    );
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let record = tracker.submit("dock-cam").await.unwrap();
    let err = tracker.reconcile(record.id).await.unwrap_err();
    assert!(matches!(err, TrackerError::UpstreamTimeout { .. }));

    // Job is still running and nothing extra was journaled
    let after = tracker.poll(record.id).await.unwrap();
    assert_eq!(after.status, JobStatus::Running);
    let journal_text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(journal_text.lines().count(), 2);
}

#[tokio::test]
async fn test_duplicate_completion_normalizes_once() {
    let temp = TempDir::new().unwrap();
    let (journal, path) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(vec![Ok("tsk-1".to_string())], vec![]);
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let record = tracker.submit("dock-cam").await.unwrap();

    let first = tracker.complete(record.id, &dock_analysis()).await.unwrap();
    assert_eq!(first.status, JobStatus::Succeeded);
    let events_before = first.evidence.as_ref().unwrap().events.len();

    // A second completion, even with different content, changes nothing
    let replay = VideoAnalysis::from_detections(vec![VideoDetection::visual(
        "something else entirely",
        5.0,
        0.9,
    )]);
    let second = tracker.complete(record.id, &replay).await.unwrap();
    assert_eq!(second.status, JobStatus::Succeeded);
    assert_eq!(second.evidence.as_ref().unwrap().events.len(), events_before);

    let journal_text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(journal_text.matches("\"event\":\"completed\"").count(), 1);
}

#[tokio::test]
async fn test_normalization_failure_recorded_not_raised() {
    let temp = TempDir::new().unwrap();
    let (journal, _) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(vec![Ok("tsk-1".to_string())], vec![]);
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let record = tracker.submit("dock-cam").await.unwrap();

    // Every detection is unusable, so normalization fails
    let garbage =
        VideoAnalysis::from_detections(vec![VideoDetection::visual("", 10.0, 0.5)]);
    let finished = tracker.complete(record.id, &garbage).await.unwrap();

    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(
        finished.error.as_ref().unwrap().kind,
        FailureKind::NormalizationFailure
    );
    assert!(finished.evidence.is_none());
}

#[tokio::test]
async fn test_unusable_detections_dropped_job_still_succeeds() {
    let temp = TempDir::new().unwrap();
    let (journal, _) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(vec![Ok("tsk-1".to_string())], vec![]);
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let record = tracker.submit("dock-cam").await.unwrap();

    // Two detections the pack cannot represent, mixed into good ones
    let mut analysis = dock_analysis();
    analysis.detections.push(VideoDetection::visual("person falling", -4.0, 0.9));
    analysis.detections.push(VideoDetection::visual("truck leaving", 9000.0, 0.8));

    let finished = tracker.complete(record.id, &analysis).await.unwrap();

    assert_eq!(finished.status, JobStatus::Succeeded);
    let pack = finished.evidence.as_ref().unwrap();
    assert_eq!(pack.events.len(), 2);
    assert!(pack.events.iter().all(|e| e.start >= 0.0 && e.start <= 3600.0));
    assert!(pack.events.iter().all(|e| !e.label.contains("falling")));
}

#[tokio::test]
async fn test_fail_aborts_running_job_and_ignores_terminal() {
    let temp = TempDir::new().unwrap();
    let (journal, _) = journal_at(&temp);
    let indexer = ScriptedIndexer::new(vec![Ok("tsk-1".to_string())], vec![]);
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let record = tracker.submit("dock-cam").await.unwrap();

    let aborted = tracker.fail(record.id, "court order withdrawn").await.unwrap();
    assert_eq!(aborted.status, JobStatus::Failed);
    let failure = aborted.error.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Aborted);
    assert!(failure.message.contains("court order withdrawn"));

    // Failing again keeps the first reason
    let again = tracker.fail(record.id, "second reason").await.unwrap();
    assert!(again.error.as_ref().unwrap().message.contains("court order withdrawn"));
}

#[tokio::test]
async fn test_restart_replays_journal() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jobs.jsonl");

    let (done_id, open_id) = {
        let journal = JobJournal::open(&path).unwrap();
        let indexer =
            ScriptedIndexer::new(vec![Ok("tsk-1".to_string()), Ok("tsk-2".to_string())], vec![]);
        let tracker =
            JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

        let done = tracker.submit("dock-cam").await.unwrap();
        tracker.complete(done.id, &dock_analysis()).await.unwrap();
        let open = tracker.submit("dock-cam").await.unwrap();
        (done.id, open.id)
    };

    // Fresh tracker over the same journal; the empty script proves no
    // upstream calls happen during replay or terminal reconcile
    let journal = JobJournal::open(&path).unwrap();
    let indexer = ScriptedIndexer::new(vec![], vec![]);
    let tracker = JobTracker::new(journal, indexer, store_with_dock(), fast_retry()).unwrap();

    let jobs = tracker.jobs().await;
    assert_eq!(jobs.len(), 2);

    let done = tracker.poll(done_id).await.unwrap();
    assert_eq!(done.status, JobStatus::Succeeded);
    assert!(done.evidence.is_some());

    let open = tracker.poll(open_id).await.unwrap();
    assert_eq!(open.status, JobStatus::Running);
    assert_eq!(open.upstream_task_id.as_deref(), Some("tsk-2"));

    // Terminal jobs stay settled without touching upstream
    let reconciled = tracker.reconcile(done_id).await.unwrap();
    assert_eq!(reconciled.status, JobStatus::Succeeded);

    let unsettled = tracker.unsettled().await;
    assert_eq!(unsettled.len(), 1);
    assert_eq!(unsettled[0].id, open_id);
}
