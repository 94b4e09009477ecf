//! Domain types for the alibi pipeline.
//!
//! This module contains the core data structures:
//! - Claim: What a witness says happened
//! - Video: Resolved video assets
//! - Analysis: Raw detections from the video-understanding service
//! - Evidence: The normalized, immutable evidence pack
//! - Job: Analysis job records and their journal events
//! - Report: Comparison results and the credibility report

pub mod analysis;
pub mod claim;
pub mod evidence;
pub mod job;
pub mod report;
pub mod video;

// Re-export commonly used types
pub use analysis::{DetectionKind, VideoAnalysis, VideoDetection};
pub use claim::{TimeWindow, WitnessClaim};
pub use video::VideoAsset;
pub use evidence::{
    EvidenceChapter, EvidenceEvent, EvidenceKeyQuote, EvidencePack, EvidencePackSource,
    EvidenceRef,
};
pub use job::{
    FailureKind, JobEvent, JobEventKind, JobFailure, JobRecord, JobStatus, JobStatusResponse,
};
pub use report::{AssertionKind, AssertionVerdict, ComparisonResult, CredibilityReport, Verdict};
