//! Comparison results and the credibility report.
//!
//! A report is created once per comparison run and never mutated. It
//! references the claim and video by id only; the evidence itself stays
//! owned by the job record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::evidence::EvidenceRef;

/// Category of an atomic assertion extracted from a witness claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    /// When something happened ("around 9pm", "for two hours")
    Time,
    /// Where it happened ("at the warehouse")
    Location,
    /// What happened ("loading crates", "left in a hurry")
    Action,
    /// Who was involved ("with Marcus", "alone")
    Participant,
}

impl std::fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AssertionKind::Time => "time",
            AssertionKind::Location => "location",
            AssertionKind::Action => "action",
            AssertionKind::Participant => "participant",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of checking one assertion against the evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionVerdict {
    /// Evidence corroborates the assertion
    Match,
    /// Evidence in the same category conflicts with the assertion
    Mismatch,
    /// Nothing in the relevant window speaks to the assertion
    NoEvidence,
}

impl std::fmt::Display for AssertionVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AssertionVerdict::Match => "match",
            AssertionVerdict::Mismatch => "mismatch",
            AssertionVerdict::NoEvidence => "no_evidence",
        };
        write!(f, "{}", s)
    }
}

/// One assertion checked against the evidence pack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// The assertion text as extracted from the claim
    pub assertion: String,

    pub kind: AssertionKind,

    pub verdict: AssertionVerdict,

    /// Confidence in the verdict, in [0, 1]
    pub confidence: f64,

    /// Evidence entries the verdict rests on. Empty for `no_evidence`.
    pub evidence: Vec<EvidenceRef>,

    /// Short human-readable account of what the evidence shows
    pub explanation: String,
}

/// Overall credibility verdict across all assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// At least one match and nothing contradicted
    Supported,
    /// At least one mismatch and nothing corroborated
    Contradicted,
    /// Corroboration and contradiction both present
    Mixed,
    /// The evidence speaks to none of the assertions
    Inconclusive,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Supported => "supported",
            Verdict::Contradicted => "contradicted",
            Verdict::Mixed => "mixed",
            Verdict::Inconclusive => "inconclusive",
        };
        write!(f, "{}", s)
    }
}

/// Final product of a comparison run: verdict, score, and narrative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibilityReport {
    /// Case the claim belongs to, when the claim carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,

    /// The claim that was checked
    pub claim_id: Uuid,

    /// The video whose evidence was used
    pub video_id: String,

    /// Per-assertion results in claim text order
    pub comparisons: Vec<ComparisonResult>,

    pub verdict: Verdict,

    /// Evidence-weighted overall confidence, in [0, 1]
    pub confidence: f64,

    /// Narrative summary citing evidence ids from `comparisons`
    pub summary: String,

    /// Suggested next investigative step for the verdict
    pub recommendation: String,

    pub generated_at: DateTime<Utc>,
}

impl CredibilityReport {
    /// All evidence ids cited anywhere in the report, in result order
    pub fn cited_evidence(&self) -> Vec<&EvidenceRef> {
        self.comparisons.iter().flat_map(|c| c.evidence.iter()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_serialization() {
        assert_eq!(serde_json::to_string(&Verdict::Inconclusive).unwrap(), "\"inconclusive\"");
        assert_eq!(
            serde_json::to_string(&AssertionVerdict::NoEvidence).unwrap(),
            "\"no_evidence\""
        );
        assert_eq!(serde_json::to_string(&AssertionKind::Participant).unwrap(), "\"participant\"");
    }

    #[test]
    fn test_cited_evidence_collects_in_order() {
        let report = CredibilityReport {
            case_id: None,
            claim_id: Uuid::new_v4(),
            video_id: "vid-1".to_string(),
            comparisons: vec![
                ComparisonResult {
                    assertion: "at the warehouse".to_string(),
                    kind: AssertionKind::Location,
                    verdict: AssertionVerdict::Match,
                    confidence: 0.8,
                    evidence: vec![EvidenceRef::Event("ev-aaaa".to_string())],
                    explanation: "seen on camera".to_string(),
                },
                ComparisonResult {
                    assertion: "around 9pm".to_string(),
                    kind: AssertionKind::Time,
                    verdict: AssertionVerdict::NoEvidence,
                    confidence: 0.0,
                    evidence: vec![],
                    explanation: "no coverage".to_string(),
                },
                ComparisonResult {
                    assertion: "loading crates".to_string(),
                    kind: AssertionKind::Action,
                    verdict: AssertionVerdict::Match,
                    confidence: 0.7,
                    evidence: vec![EvidenceRef::Quote("q-bbbb".to_string())],
                    explanation: "matching quote".to_string(),
                },
            ],
            verdict: Verdict::Supported,
            confidence: 0.75,
            summary: "two of three assertions corroborated".to_string(),
            recommendation: "treat the account as reliable".to_string(),
            generated_at: Utc::now(),
        };

        let cited = report.cited_evidence();
        assert_eq!(cited.len(), 2);
        assert_eq!(cited[0], &EvidenceRef::Event("ev-aaaa".to_string()));
        assert_eq!(cited[1], &EvidenceRef::Quote("q-bbbb".to_string()));
    }
}
