//! Append-only job journal with file-based persistence.
//!
//! Events are stored as newline-delimited JSON (JSONL) for simplicity
//! and easy debugging/inspection. Appends take an exclusive file lock so
//! concurrent processes cannot interleave partial lines.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::warn;

use crate::domain::job::JobEvent;

/// Journal failures surfaced to the tracker
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode journal event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("corrupt journal line {line}: {message}")]
    Corrupt { line: usize, message: String },
}

/// File-based job journal using JSONL format
pub struct JobJournal {
    path: PathBuf,
}

impl JobJournal {
    /// Create or open a journal at the given path
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Path to the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event to the journal.
    ///
    /// The write happens under an exclusive lock and is flushed before
    /// returning, so an acknowledged append survives a crash.
    pub fn append(&self, event: &JobEvent) -> Result<(), JournalError> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;

        // Acquire exclusive lock; released when the file is dropped
        file.lock_exclusive()?;

        let json = serde_json::to_string(event)?;
        let mut file = file;
        writeln!(file, "{}", json)?;
        file.flush()?;

        Ok(())
    }

    /// Replay all events in append order.
    ///
    /// A torn final line (crash mid-append) is skipped with a warning;
    /// corruption anywhere else is an error.
    pub fn replay(&self) -> Result<Vec<JobEvent>, JournalError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
        let last = lines.len().saturating_sub(1);

        let mut events = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JobEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) if idx == last => {
                    warn!(line = idx + 1, error = %e, "skipping torn final journal line");
                }
                Err(e) => {
                    return Err(JournalError::Corrupt { line: idx + 1, message: e.to_string() });
                }
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::{FailureKind, JobEventKind, JobFailure};
    use crate::domain::video::VideoAsset;
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn journal_in(temp: &TempDir) -> JobJournal {
        JobJournal::open(temp.path().join("jobs.jsonl")).unwrap()
    }

    fn asset(id: &str) -> VideoAsset {
        VideoAsset {
            id: id.to_string(),
            title: None,
            duration_secs: 60.0,
            recorded_at: None,
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_replay_order() {
        let temp = TempDir::new().unwrap();
        let journal = journal_in(&temp);
        let id = Uuid::new_v4();

        journal
            .append(&JobEvent::new(id, JobEventKind::Submitted { video: asset("vid-1") }))
            .unwrap();
        journal
            .append(&JobEvent::new(
                id,
                JobEventKind::Accepted { task_id: "t-1".to_string(), attempts: 1 },
            ))
            .unwrap();
        journal
            .append(&JobEvent::new(
                id,
                JobEventKind::Failed {
                    failure: JobFailure::new(FailureKind::Aborted, "deadline"),
                },
            ))
            .unwrap();

        let events = journal.replay().unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0].kind, JobEventKind::Submitted { .. }));
        assert!(matches!(events[1].kind, JobEventKind::Accepted { .. }));
        assert!(matches!(events[2].kind, JobEventKind::Failed { .. }));
    }

    #[test]
    fn test_replay_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let journal = journal_in(&temp);
        assert!(journal.replay().unwrap().is_empty());
    }

    #[test]
    fn test_torn_final_line_skipped() {
        let temp = TempDir::new().unwrap();
        let journal = journal_in(&temp);
        let id = Uuid::new_v4();

        journal
            .append(&JobEvent::new(id, JobEventKind::Submitted { video: asset("vid-1") }))
            .unwrap();

        // Simulate a crash mid-append
        let mut file = OpenOptions::new().append(true).open(journal.path()).unwrap();
        file.write_all(b"{\"job_id\": \"trunc").unwrap();

        let events = journal.replay().unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_corrupt_middle_line_is_error() {
        let temp = TempDir::new().unwrap();
        let journal = journal_in(&temp);
        let id = Uuid::new_v4();

        journal
            .append(&JobEvent::new(id, JobEventKind::Submitted { video: asset("vid-1") }))
            .unwrap();

        let mut file = OpenOptions::new().append(true).open(journal.path()).unwrap();
        file.write_all(b"not json at all\n").unwrap();

        journal
            .append(&JobEvent::new(
                id,
                JobEventKind::Accepted { task_id: "t-1".to_string(), attempts: 1 },
            ))
            .unwrap();

        let err = journal.replay().unwrap_err();
        assert!(matches!(err, JournalError::Corrupt { line: 2, .. }));
    }
}
