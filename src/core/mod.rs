//! Core pipeline logic.
//!
//! This module contains:
//! - Journal: Append-only job event logging
//! - Tracker: Async job lifecycle against the video indexer
//! - Normalizer: Raw detections into evidence packs
//! - Comparator: Witness claims against evidence
//! - Aggregator: Comparisons into credibility reports

pub mod aggregator;
pub mod comparator;
pub mod journal;
pub mod normalizer;
pub mod tracker;

// Re-export commonly used types
pub use aggregator::{aggregate, assess};
pub use comparator::{compare, CompareError};
pub use journal::{JobJournal, JournalError};
pub use normalizer::{normalize, NormalizeError};
pub use tracker::{JobTracker, RetryPolicy, TrackerError};
