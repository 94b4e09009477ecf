//! The Evidence Pack: normalized, immutable view of one analyzed video.
//!
//! A pack is produced once by the normalizer and never mutated afterwards.
//! Entries carry deterministic ids so reports can cite them stably across
//! re-runs of the same input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Reference to the originating video asset. One per pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePackSource {
    /// Stable identifier of the video asset
    pub video_id: String,

    /// Human-readable title, if the store had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Full duration of the footage in seconds
    pub duration_secs: f64,

    /// Wall-clock instant the recording started, when known.
    /// Anchors the video timeline so claim times can be mapped onto it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,

    /// When the asset was uploaded/registered
    pub uploaded_at: DateTime<Utc>,
}

impl EvidencePackSource {
    /// Describe the asset an evidence pack was derived from
    pub fn from_asset(asset: &crate::domain::video::VideoAsset) -> Self {
        Self {
            video_id: asset.id.clone(),
            title: asset.title.clone(),
            duration_secs: asset.duration_secs,
            recorded_at: asset.recorded_at,
            uploaded_at: asset.uploaded_at,
        }
    }

    /// Map a wall-clock instant onto the video timeline.
    ///
    /// Returns `None` when the source has no recording anchor or the
    /// instant falls outside the footage.
    pub fn offset_of(&self, instant: DateTime<Utc>) -> Option<f64> {
        let anchor = self.recorded_at?;
        let offset = (instant - anchor).num_milliseconds() as f64 / 1000.0;
        if offset < 0.0 || offset > self.duration_secs {
            return None;
        }
        Some(offset)
    }
}

/// An ordered segment of the video with a time range and a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceChapter {
    /// Chapter id ("ch-01", "ch-02", ...)
    pub id: String,

    /// Start offset in seconds
    pub start: f64,

    /// End offset in seconds
    pub end: f64,

    /// What happens in this stretch of footage
    pub summary: String,
}

impl EvidenceChapter {
    /// True when the chapter's range intersects [start, end]
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.start <= end && self.end >= start
    }
}

/// A detected occurrence: actor/action/object with time and confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceEvent {
    /// Deterministic event id derived from label and timestamp
    pub id: String,

    /// What was detected
    pub label: String,

    /// Anchor timestamp in seconds (highest-confidence member when merged)
    pub start: f64,

    /// End of the occurrence, when it spans a range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// How many raw detections were merged into this event
    pub sources: u32,
}

impl EvidenceEvent {
    /// True when the event's occurrence intersects [start, end]
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        let event_end = self.end.unwrap_or(self.start);
        self.start <= end && event_end >= start
    }
}

/// A transcribed or notable utterance with timestamp and speaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceKeyQuote {
    /// Deterministic quote id
    pub id: String,

    /// Offset into the video in seconds
    pub start: f64,

    /// Speaker attribution; `"unknown"` when the service could not attribute
    pub speaker: String,

    /// The utterance or on-screen text
    pub text: String,
}

/// Typed reference into a pack, cited by comparison results and reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum EvidenceRef {
    Chapter(String),
    Event(String),
    Quote(String),
}

impl std::fmt::Display for EvidenceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceRef::Chapter(id) | EvidenceRef::Event(id) | EvidenceRef::Quote(id) => {
                write!(f, "{}", id)
            }
        }
    }
}

/// Normalized, structured representation of a video's analyzed content.
///
/// Invariants (established by the normalizer, relied on everywhere else):
/// - every timestamp lies within [0, source.duration_secs]
/// - chapters are ordered by non-decreasing start
/// - events and quotes are ordered by (timestamp, label/text)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePack {
    /// The video this pack describes
    pub source: EvidencePackSource,

    /// Ordered chapters partitioning the duration
    pub chapters: Vec<EvidenceChapter>,

    /// Detected occurrences, ordered by timestamp then label
    pub events: Vec<EvidenceEvent>,

    /// Key quotes, ordered by timestamp
    pub quotes: Vec<EvidenceKeyQuote>,
}

impl EvidencePack {
    /// Events whose occurrence intersects [start, end]
    pub fn events_in(&self, start: f64, end: f64) -> Vec<&EvidenceEvent> {
        self.events.iter().filter(|e| e.overlaps(start, end)).collect()
    }

    /// Quotes spoken within [start, end]
    pub fn quotes_in(&self, start: f64, end: f64) -> Vec<&EvidenceKeyQuote> {
        self.quotes
            .iter()
            .filter(|q| q.start >= start && q.start <= end)
            .collect()
    }

    /// Chapters overlapping [start, end]
    pub fn chapters_in(&self, start: f64, end: f64) -> Vec<&EvidenceChapter> {
        self.chapters.iter().filter(|c| c.overlaps(start, end)).collect()
    }

    /// True when the pack holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty() && self.events.is_empty() && self.quotes.is_empty()
    }
}

/// Deterministic short id for an evidence entry.
///
/// sha256 over the discriminating fields, first 8 hex chars, prefixed by
/// kind. Same input always produces the same id.
pub fn evidence_id(prefix: &str, label: &str, start: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update(format!("{:.3}", start).as_bytes());
    let digest = hasher.finalize();
    format!("{}-{}", prefix, hex::encode(&digest[..4]))
}

/// Render a video offset as `HH:MM:SS`
pub fn format_offset(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
