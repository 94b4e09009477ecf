//! Witness claims submitted for verification against footage.
//!
//! A claim is immutable once created; the comparator only ever reads it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A free-text statement from a witness, plus optional structured hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessClaim {
    /// Unique identifier for this claim
    pub id: Uuid,

    /// The claim as the witness stated it
    pub text: String,

    /// Case this claim belongs to (if the caller tracks cases)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,

    /// Window the witness says the events happened in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_window: Option<TimeWindow>,

    /// Location the witness says they were at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_location: Option<String>,

    /// When the claim was recorded
    pub recorded_at: DateTime<Utc>,
}

/// A closed wall-clock interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WitnessClaim {
    /// Create a new claim from raw witness text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            case_id: None,
            claimed_window: None,
            claimed_location: None,
            recorded_at: Utc::now(),
        }
    }

    /// Attach a case identifier
    pub fn with_case_id(mut self, case_id: impl Into<String>) -> Self {
        self.case_id = Some(case_id.into());
        self
    }

    /// Attach a claimed time window
    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.claimed_window = Some(TimeWindow { start, end });
        self
    }

    /// Attach a claimed location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.claimed_location = Some(location.into());
        self
    }

    /// True when the claim carries no usable text
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_creation() {
        let claim = WitnessClaim::new("I was at the Blue Note jazz club at 9pm")
            .with_case_id("case-042");

        assert!(!claim.is_blank());
        assert_eq!(claim.case_id.as_deref(), Some("case-042"));
        assert!(claim.claimed_window.is_none());
    }

    #[test]
    fn test_blank_claim() {
        assert!(WitnessClaim::new("   ").is_blank());
        assert!(WitnessClaim::new("").is_blank());
    }

    #[test]
    fn test_claim_serialization_skips_empty_hints() {
        let claim = WitnessClaim::new("short claim");
        let json = serde_json::to_string(&claim).unwrap();

        assert!(!json.contains("claimed_window"));
        assert!(!json.contains("claimed_location"));

        let parsed: WitnessClaim = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.text, "short claim");
    }
}
