//! Resolved video assets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A video reference resolved against the store, ready for submission.
///
/// Carried on the job record so completion and reconciliation never need
/// to consult the store again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAsset {
    /// Stable asset id
    pub id: String,

    /// Human-readable title, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Footage duration in seconds
    pub duration_secs: f64,

    /// Wall-clock start of the recording, when the metadata had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,

    /// When the asset entered the store
    pub uploaded_at: DateTime<Utc>,
}
