//! alibi - Footage-backed witness claim assessment
//!
//! A Rust pipeline that turns surveillance footage into queryable
//! evidence and checks witness statements against it.
//!
//! # Architecture
//!
//! The system is built around event sourcing:
//! - Every job state change is recorded as an immutable journal event
//! - Current job state is derived by replaying the journal
//! - Interrupted jobs are reconciled against the upstream service
//!
//! # Modules
//!
//! - `adapters`: External system integrations (video indexer, media store)
//! - `core`: Pipeline logic (journal, tracker, normalizer, comparator,
//!   aggregator)
//! - `domain`: Data structures (jobs, evidence, claims, reports)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Submit footage for analysis
//! alibi submit dock-cam --wait
//!
//! # Check job status
//! alibi status <job-id>
//!
//! # Assess a witness claim against completed analysis
//! alibi assess <job-id> "I was at the warehouse around 9pm"
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{
    FixtureIndexer, HttpIndexer, IndexerError, LocalVideoStore, StoreError, TaskState,
    VideoIndexer, VideoStore,
};
pub use config::{Config, IndexerMode};
pub use crate::core::{JobJournal, JobTracker, RetryPolicy};
pub use domain::{
    CredibilityReport, EvidencePack, JobRecord, JobStatus, Verdict, VideoAsset, WitnessClaim,
};
