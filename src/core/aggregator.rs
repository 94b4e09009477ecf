//! Credibility aggregation: per-assertion comparisons rolled up into a
//! single report with a verdict, a weighted confidence and a narrative.
//!
//! The verdict follows from the comparison verdicts alone:
//! corroboration without conflict is `supported`, conflict without
//! corroboration is `contradicted`, both at once is `mixed`, and a claim
//! the footage never speaks to is `inconclusive`. Confidence weighs each
//! comparison by how much evidence it cites, so a verdict resting on
//! three detections counts for more than one resting on none.

use std::collections::HashSet;

use chrono::Utc;

use crate::core::comparator::{compare, CompareError};
use crate::domain::claim::WitnessClaim;
use crate::domain::evidence::EvidencePack;
use crate::domain::report::{AssertionVerdict, ComparisonResult, CredibilityReport, Verdict};

/// Compare a claim against a pack and aggregate the results in one step.
pub fn assess(
    claim: &WitnessClaim,
    pack: &EvidencePack,
) -> Result<CredibilityReport, CompareError> {
    let comparisons = compare(claim, pack)?;
    Ok(aggregate(claim, pack, comparisons))
}

/// Roll per-assertion comparisons into a credibility report.
///
/// Deterministic apart from the generation timestamp; the narrative only
/// names evidence ids that exist in the pack.
pub fn aggregate(
    claim: &WitnessClaim,
    pack: &EvidencePack,
    comparisons: Vec<ComparisonResult>,
) -> CredibilityReport {
    let verdict = decide(&comparisons);
    let confidence = weighted_confidence(&comparisons);
    let summary = summarize(&comparisons, verdict, pack);
    let recommendation = recommend(verdict).to_string();

    CredibilityReport {
        case_id: claim.case_id.clone(),
        claim_id: claim.id,
        video_id: pack.source.video_id.clone(),
        comparisons,
        verdict,
        confidence,
        summary,
        recommendation,
        generated_at: Utc::now(),
    }
}

fn decide(comparisons: &[ComparisonResult]) -> Verdict {
    let matches = comparisons.iter().filter(|c| c.verdict == AssertionVerdict::Match).count();
    let mismatches =
        comparisons.iter().filter(|c| c.verdict == AssertionVerdict::Mismatch).count();

    match (matches, mismatches) {
        (0, 0) => Verdict::Inconclusive,
        (_, 0) => Verdict::Supported,
        (0, _) => Verdict::Contradicted,
        (_, _) => Verdict::Mixed,
    }
}

/// Mean of comparison confidences, each weighted by 1 plus the number of
/// evidence entries it cites. Unverifiable assertions carry weight 1 and
/// confidence 0, pulling the figure down.
fn weighted_confidence(comparisons: &[ComparisonResult]) -> f64 {
    if comparisons.is_empty() {
        return 0.0;
    }

    let mut num = 0.0;
    let mut denom = 0.0;
    for c in comparisons {
        let weight = 1.0 + c.evidence.len() as f64;
        num += weight * c.confidence;
        denom += weight;
    }
    num / denom
}

fn recommend(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Supported => {
            "statement is consistent with the reviewed footage; no follow-up required"
        }
        Verdict::Contradicted => {
            "statement conflicts with the reviewed footage; re-interview recommended"
        }
        Verdict::Mixed => {
            "statement partially conflicts with the footage; follow up on the contradicted points"
        }
        Verdict::Inconclusive => {
            "the reviewed footage cannot assess this statement; seek additional sources"
        }
    }
}

/// Narrative summary of the verdict distribution. Evidence ids are
/// checked against the pack before being named.
fn summarize(comparisons: &[ComparisonResult], verdict: Verdict, pack: &EvidencePack) -> String {
    let total = comparisons.len();
    let corroborated: Vec<&ComparisonResult> =
        comparisons.iter().filter(|c| c.verdict == AssertionVerdict::Match).collect();
    let contradicted: Vec<&ComparisonResult> =
        comparisons.iter().filter(|c| c.verdict == AssertionVerdict::Mismatch).collect();
    let unverifiable = total - corroborated.len() - contradicted.len();

    let known: HashSet<&str> = pack
        .chapters
        .iter()
        .map(|c| c.id.as_str())
        .chain(pack.events.iter().map(|e| e.id.as_str()))
        .chain(pack.quotes.iter().map(|q| q.id.as_str()))
        .collect();

    let cite = |results: &[&ComparisonResult]| -> String {
        let mut seen = HashSet::new();
        let ids: Vec<String> = results
            .iter()
            .flat_map(|r| r.evidence.iter())
            .map(|e| e.to_string())
            .filter(|id| known.contains(id.as_str()) && seen.insert(id.clone()))
            .collect();
        if ids.is_empty() {
            String::new()
        } else {
            format!(" ({})", ids.join(", "))
        }
    };

    let mut parts = Vec::new();
    match verdict {
        Verdict::Supported => parts.push(format!(
            "The footage corroborates {} of {} assertion{} drawn from the statement{}.",
            corroborated.len(),
            total,
            if total == 1 { "" } else { "s" },
            cite(&corroborated)
        )),
        Verdict::Contradicted => parts.push(format!(
            "The footage contradicts {} of {} assertion{} drawn from the statement{}.",
            contradicted.len(),
            total,
            if total == 1 { "" } else { "s" },
            cite(&contradicted)
        )),
        Verdict::Mixed => {
            parts.push(format!(
                "The footage corroborates {} assertion{}{} but contradicts {}{}.",
                corroborated.len(),
                if corroborated.len() == 1 { "" } else { "s" },
                cite(&corroborated),
                contradicted.len(),
                cite(&contradicted)
            ));
        }
        Verdict::Inconclusive => parts.push(
            "The reviewed footage neither corroborates nor contradicts the statement."
                .to_string(),
        ),
    }

    if unverifiable > 0 && verdict != Verdict::Inconclusive {
        parts.push(format!(
            "{} assertion{} found no relevant footage.",
            unverifiable,
            if unverifiable == 1 { "" } else { "s" }
        ));
    }

    parts.join(" ")
}
