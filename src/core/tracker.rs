//! Job tracker: owns the lifecycle of video analysis requests.
//!
//! Coordinates video resolution, upstream submission with retry,
//! journal persistence, and evidence normalization on completion.
//!
//! Writes to one job are serialized through a per-job async lock;
//! `poll` never takes the writer path and reads a consistent snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{IndexerError, TaskState, VideoIndexer, VideoStore};
use crate::domain::analysis::VideoAnalysis;
use crate::domain::evidence::EvidencePackSource;
use crate::domain::job::{FailureKind, JobEvent, JobEventKind, JobFailure, JobRecord};

use super::journal::{JobJournal, JournalError};
use super::normalizer;

/// Tracker failures surfaced to callers.
///
/// Normalization failures are deliberately absent: they are recorded on
/// the job and never raised from `complete`.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("submission failed: {0}")]
    Submission(String),

    #[error("upstream rejected the job: {0}")]
    UpstreamRejected(String),

    #[error("upstream unavailable after {attempts} attempts: {message}")]
    UpstreamTimeout { attempts: u32, message: String },

    #[error("no job found with id {0}")]
    NotFound(Uuid),

    #[error("journal failure: {0}")]
    Journal(#[from] JournalError),
}

/// Retry policy for transient upstream failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Calculate delay for a specific attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Tracks analysis jobs from submission to their terminal state
pub struct JobTracker {
    journal: JobJournal,
    indexer: Arc<dyn VideoIndexer>,
    store: Arc<dyn VideoStore>,
    retry: RetryPolicy,

    /// Snapshot map rebuilt from the journal at startup
    records: RwLock<HashMap<Uuid, JobRecord>>,

    /// Per-job writer locks
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl JobTracker {
    /// Open the tracker, replaying the journal into the record map
    pub fn new(
        journal: JobJournal,
        indexer: Arc<dyn VideoIndexer>,
        store: Arc<dyn VideoStore>,
        retry: RetryPolicy,
    ) -> Result<Self, TrackerError> {
        let mut records: HashMap<Uuid, JobRecord> = HashMap::new();
        for event in journal.replay()? {
            match records.get_mut(&event.job_id) {
                Some(record) => record.apply_event(&event),
                None => {
                    if let JobEventKind::Submitted { video } = &event.kind {
                        records.insert(
                            event.job_id,
                            JobRecord::submitted(event.job_id, video.clone(), event.at),
                        );
                    } else {
                        warn!(job_id = %event.job_id, "journal event for unknown job, skipping");
                    }
                }
            }
        }

        if !records.is_empty() {
            info!(jobs = records.len(), "job journal replayed");
        }

        Ok(Self {
            journal,
            indexer,
            store,
            retry,
            records: RwLock::new(records),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Submit a video reference for analysis.
    ///
    /// The reference is resolved through the store before any record is
    /// created; an unresolvable reference leaves no trace. Transient
    /// upstream errors are retried with exponential backoff.
    #[instrument(skip(self))]
    pub async fn submit(&self, reference: &str) -> Result<JobRecord, TrackerError> {
        let asset = self
            .store
            .resolve(reference)
            .await
            .map_err(|e| TrackerError::Submission(e.to_string()))?;

        let job_id = Uuid::new_v4();
        let lock = self.writer_lock(job_id).await;
        let _guard = lock.lock().await;

        self.apply(JobEvent::new(job_id, JobEventKind::Submitted { video: asset.clone() }))
            .await?;
        info!(%job_id, video_id = %asset.id, "job submitted");

        let mut attempt = 0u32;
        let outcome = loop {
            attempt += 1;
            match self.indexer.submit(&asset).await {
                Ok(task_id) => break Ok(task_id),
                Err(e) if e.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        %job_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient submit failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => break Err(e),
            }
        };

        match outcome {
            Ok(task_id) => {
                let record = self
                    .apply(JobEvent::new(
                        job_id,
                        JobEventKind::Accepted { task_id, attempts: attempt },
                    ))
                    .await?;
                info!(%job_id, attempts = attempt, "upstream accepted task");
                Ok(record)
            }
            Err(IndexerError::Rejected(message)) => {
                self.apply(JobEvent::new(
                    job_id,
                    JobEventKind::Failed {
                        failure: JobFailure::new(FailureKind::UpstreamRejected, message.clone()),
                    },
                ))
                .await?;
                error!(%job_id, error = %message, "upstream rejected submission");
                Err(TrackerError::UpstreamRejected(message))
            }
            Err(IndexerError::Transient(message)) => {
                self.apply(JobEvent::new(
                    job_id,
                    JobEventKind::Failed {
                        failure: JobFailure::new(FailureKind::UpstreamTimeout, message.clone()),
                    },
                ))
                .await?;
                error!(%job_id, attempts = attempt, "upstream unavailable, job failed");
                Err(TrackerError::UpstreamTimeout { attempts: attempt, message })
            }
        }
    }

    /// Snapshot of one job. Pure read: repeated polls without an
    /// intervening transition return identical records.
    pub async fn poll(&self, job_id: Uuid) -> Result<JobRecord, TrackerError> {
        let records = self.records.read().await;
        records.get(&job_id).cloned().ok_or(TrackerError::NotFound(job_id))
    }

    /// All known jobs, newest first
    pub async fn jobs(&self) -> Vec<JobRecord> {
        let records = self.records.read().await;
        let mut jobs: Vec<JobRecord> = records.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Feed a raw analysis result to the job and run normalization.
    ///
    /// A normalization failure is recorded as the job's terminal state,
    /// never raised to the caller. Completing an already-terminal job is
    /// a no-op returning the existing snapshot, so duplicate completion
    /// notifications normalize at most once.
    #[instrument(skip(self, analysis), fields(job_id = %job_id))]
    pub async fn complete(
        &self,
        job_id: Uuid,
        analysis: &VideoAnalysis,
    ) -> Result<JobRecord, TrackerError> {
        let lock = self.writer_lock(job_id).await;
        let _guard = lock.lock().await;

        let current = self.poll(job_id).await?;
        if current.is_terminal() {
            debug!(%job_id, status = %current.status, "completion for terminal job ignored");
            return Ok(current);
        }

        self.finish(&current, analysis).await
    }

    /// Force a job into `Failed` (deadline or operator cancellation).
    /// Already-terminal jobs are returned unchanged.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn fail(&self, job_id: Uuid, reason: &str) -> Result<JobRecord, TrackerError> {
        let lock = self.writer_lock(job_id).await;
        let _guard = lock.lock().await;

        let current = self.poll(job_id).await?;
        if current.is_terminal() {
            debug!(%job_id, status = %current.status, "fail for terminal job ignored");
            return Ok(current);
        }

        let record = self
            .apply(JobEvent::new(
                job_id,
                JobEventKind::Failed {
                    failure: JobFailure::new(FailureKind::Aborted, reason),
                },
            ))
            .await?;
        warn!(%job_id, reason, "job failed by operator");
        Ok(record)
    }

    /// Re-poll the external service for a running job and apply whatever
    /// transition its task state implies. No-op while the task is still
    /// processing or the job is already terminal.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn reconcile(&self, job_id: Uuid) -> Result<JobRecord, TrackerError> {
        let lock = self.writer_lock(job_id).await;
        let _guard = lock.lock().await;

        let current = self.poll(job_id).await?;
        if current.is_terminal() {
            return Ok(current);
        }

        let Some(task_id) = current.upstream_task_id.clone() else {
            // Pending with no acknowledged task: nothing upstream to ask
            warn!(%job_id, "job has no upstream task to reconcile");
            return Ok(current);
        };

        match self.indexer.fetch(&task_id).await {
            Ok(TaskState::Processing) => {
                debug!(%job_id, %task_id, "upstream still processing");
                Ok(current)
            }
            Ok(TaskState::Ready(analysis)) => self.finish(&current, &analysis).await,
            Ok(TaskState::Failed(message)) => {
                let record = self
                    .apply(JobEvent::new(
                        job_id,
                        JobEventKind::Failed {
                            failure: JobFailure::new(
                                FailureKind::UpstreamRejected,
                                message.clone(),
                            ),
                        },
                    ))
                    .await?;
                error!(%job_id, error = %message, "upstream task failed");
                Ok(record)
            }
            Err(IndexerError::Transient(message)) => {
                // Record untouched; the caller can reconcile again later
                warn!(%job_id, error = %message, "upstream unreachable during reconcile");
                Err(TrackerError::UpstreamTimeout { attempts: 1, message })
            }
            Err(IndexerError::Rejected(message)) => {
                let record = self
                    .apply(JobEvent::new(
                        job_id,
                        JobEventKind::Failed {
                            failure: JobFailure::new(
                                FailureKind::UpstreamRejected,
                                message.clone(),
                            ),
                        },
                    ))
                    .await?;
                error!(%job_id, error = %message, "upstream no longer recognizes task");
                Ok(record)
            }
        }
    }

    /// Jobs stuck in a non-terminal state (candidates for reconcile)
    pub async fn unsettled(&self) -> Vec<JobRecord> {
        let records = self.records.read().await;
        let mut jobs: Vec<JobRecord> = records
            .values()
            .filter(|r| !r.is_terminal())
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    /// Normalize a raw analysis and record the outcome.
    /// Caller must hold the job's writer lock.
    async fn finish(
        &self,
        current: &JobRecord,
        analysis: &VideoAnalysis,
    ) -> Result<JobRecord, TrackerError> {
        let source = EvidencePackSource::from_asset(&current.video);
        match normalizer::normalize(analysis, source) {
            Ok(pack) => {
                let record = self
                    .apply(JobEvent::new(
                        current.id,
                        JobEventKind::Completed { pack: Box::new(pack) },
                    ))
                    .await?;
                let evidence = record.evidence.as_ref();
                info!(
                    job_id = %current.id,
                    chapters = evidence.map(|p| p.chapters.len()).unwrap_or(0),
                    events = evidence.map(|p| p.events.len()).unwrap_or(0),
                    quotes = evidence.map(|p| p.quotes.len()).unwrap_or(0),
                    "evidence pack attached"
                );
                Ok(record)
            }
            Err(e) => {
                warn!(job_id = %current.id, error = %e, "normalization failed, recording on job");
                let record = self
                    .apply(JobEvent::new(
                        current.id,
                        JobEventKind::Failed {
                            failure: JobFailure::new(
                                FailureKind::NormalizationFailure,
                                e.to_string(),
                            ),
                        },
                    ))
                    .await?;
                Ok(record)
            }
        }
    }

    /// Journal an event, then fold it into the in-memory map.
    /// Append happens first so an acknowledged transition is durable.
    async fn apply(&self, event: JobEvent) -> Result<JobRecord, TrackerError> {
        self.journal.append(&event)?;

        let mut records = self.records.write().await;
        match records.get_mut(&event.job_id) {
            Some(record) => {
                record.apply_event(&event);
                Ok(record.clone())
            }
            None => {
                if let JobEventKind::Submitted { video } = &event.kind {
                    let record = JobRecord::submitted(event.job_id, video.clone(), event.at);
                    records.insert(event.job_id, record.clone());
                    Ok(record)
                } else {
                    Err(TrackerError::NotFound(event.job_id))
                }
            }
        }
    }

    async fn writer_lock(&self, job_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(job_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_delays() {
        let policy = RetryPolicy {
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 10000,
            ..Default::default()
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(8000));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(10000)); // Capped
    }

    #[test]
    fn test_retry_policy_attempt_budget() {
        let policy = RetryPolicy { max_attempts: 3, ..Default::default() };

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }
}
