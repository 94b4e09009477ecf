//! Job records and the journal events that rebuild them.
//!
//! A `JobRecord` is never persisted directly. The journal stores an
//! append-only sequence of `JobEvent`s and the record is reconstructed by
//! replaying them in order, so a crash can never leave a half-written state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::evidence::EvidencePack;
use crate::domain::video::VideoAsset;

/// Lifecycle of one analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Record created, upstream submission not yet acknowledged
    Pending,
    /// Upstream accepted the task and is processing
    Running,
    /// Analysis finished and the evidence pack is attached
    Succeeded,
    /// Submission rejected, upstream failed, or normalization failed
    Failed,
}

impl JobStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Why a job ended up `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The external service refused the submission outright
    UpstreamRejected,
    /// Transient upstream errors exhausted the retry budget
    UpstreamTimeout,
    /// The raw analysis came back but could not be normalized
    NormalizationFailure,
    /// An operator forced the transition (deadline or cancellation)
    Aborted,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::UpstreamRejected => "upstream_rejected",
            FailureKind::UpstreamTimeout => "upstream_timeout",
            FailureKind::NormalizationFailure => "normalization_failure",
            FailureKind::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// Structured failure recorded on the job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// One entry in the job journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Job the event belongs to
    pub job_id: Uuid,

    /// When the event was appended
    pub at: DateTime<Utc>,

    #[serde(flatten)]
    pub kind: JobEventKind,
}

impl JobEvent {
    pub fn new(job_id: Uuid, kind: JobEventKind) -> Self {
        Self { job_id, at: Utc::now(), kind }
    }
}

/// The transitions a job can go through, in journal form.
///
/// `Submitted` carries the full resolved asset so a replayed journal is
/// self-contained: reconciliation after a restart needs the duration and
/// recording anchor without consulting the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEventKind {
    /// Record created for a resolved video asset
    Submitted { video: VideoAsset },

    /// Upstream acknowledged the task
    Accepted { task_id: String, attempts: u32 },

    /// Normalization produced an evidence pack
    Completed { pack: Box<EvidencePack> },

    /// The job failed with a structured reason
    Failed { failure: JobFailure },
}

/// Tracks one video analysis request from submission to its terminal state.
///
/// Terminal records are final: `apply_event` ignores any event arriving
/// after `Succeeded` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job id
    pub id: Uuid,

    /// The video asset under analysis
    pub video: VideoAsset,

    pub status: JobStatus,

    /// Task handle issued by the external service, once acknowledged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_task_id: Option<String>,

    /// Upstream submission attempts spent so far
    pub attempts: u32,

    /// Failure details, once failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,

    /// Normalized evidence, once succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<EvidencePack>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Fresh pending record, as created by a `Submitted` event
    pub fn submitted(id: Uuid, video: VideoAsset, at: DateTime<Utc>) -> Self {
        Self {
            id,
            video,
            status: JobStatus::Pending,
            upstream_task_id: None,
            attempts: 0,
            error: None,
            evidence: None,
            created_at: at,
            updated_at: at,
        }
    }

    /// Shorthand for the tracked video's id
    pub fn video_id(&self) -> &str {
        &self.video.id
    }

    /// Rebuild a record by replaying its events in journal order.
    ///
    /// Returns `None` when the slice holds no `Submitted` event, which is
    /// the only event that can create a record.
    pub fn from_events(id: Uuid, events: &[JobEvent]) -> Option<Self> {
        let mut record: Option<JobRecord> = None;
        for event in events {
            if event.job_id != id {
                continue;
            }
            match &mut record {
                None => {
                    if let JobEventKind::Submitted { video } = &event.kind {
                        record = Some(JobRecord::submitted(id, video.clone(), event.at));
                    }
                }
                Some(r) => r.apply_event(event),
            }
        }
        record
    }

    /// Apply one event to the record. Events after a terminal state are
    /// ignored so replayed journals can never resurrect a finished job.
    pub fn apply_event(&mut self, event: &JobEvent) {
        if self.status.is_terminal() {
            return;
        }
        match &event.kind {
            JobEventKind::Submitted { .. } => {}
            JobEventKind::Accepted { task_id, attempts } => {
                self.status = JobStatus::Running;
                self.upstream_task_id = Some(task_id.clone());
                self.attempts = *attempts;
                self.updated_at = event.at;
            }
            JobEventKind::Completed { pack } => {
                self.status = JobStatus::Succeeded;
                self.evidence = Some((**pack).clone());
                self.updated_at = event.at;
            }
            JobEventKind::Failed { failure } => {
                self.status = JobStatus::Failed;
                self.error = Some(failure.clone());
                self.updated_at = event.at;
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Wire shape answering a status query at the crate boundary.
///
/// A trimmed view of [`JobRecord`]: internals like attempt counts and the
/// upstream task handle stay out of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,

    /// Failure details, present once the job failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,

    /// Normalized evidence, present once the job succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_pack: Option<EvidencePack>,
}

impl From<&JobRecord> for JobStatusResponse {
    fn from(record: &JobRecord) -> Self {
        Self {
            status: record.status,
            error: record.error.clone(),
            evidence_pack: record.evidence.clone(),
        }
    }
}
