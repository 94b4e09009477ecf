//! Claim comparison: witness statements checked against evidence packs.
//!
//! The claim text is decomposed into atomic assertions (time, location,
//! action, participants) by deterministic lexical scanning, then each
//! assertion is searched against the pack's events, chapters and quotes.
//! No external NLP: plain token analysis keeps results reproducible and
//! explainable in court.
//!
//! # Design Decisions (V1)
//!
//! - **Assertions are never dropped**: an unparsable fragment still
//!   produces a `no_evidence` result with confidence 0
//! - **Conflicts need category markers**: only evidence that explicitly
//!   speaks to a category (a location-bearing label, an alone/accompanied
//!   marker, an absence marker) can contradict an assertion; silence is
//!   `no_evidence`, never `mismatch`
//! - **Wall-clock times** are mapped onto the video timeline through the
//!   source's recording anchor; without an anchor the whole timeline is
//!   in scope and time assertions are unanswerable

use chrono::Timelike;
use thiserror::Error;

use crate::domain::claim::WitnessClaim;
use crate::domain::evidence::{format_offset, EvidencePack, EvidencePackSource, EvidenceRef};
use crate::domain::report::{AssertionKind, AssertionVerdict, ComparisonResult};

/// Half-width of the window a claimed clock time opens, in seconds
const TIME_TOLERANCE_SECS: f64 = 900.0;

/// Proximity scale: evidence this many seconds from the claimed instant
/// weighs half of evidence at the instant itself
const PROXIMITY_SCALE_SECS: f64 = 30.0;

/// Smoothing constant keeping confidence below 1 and damping single-item
/// verdicts
const SCORE_SMOOTHING: f64 = 0.5;

/// Fixed weight of a key quote (quotes carry no confidence of their own)
const QUOTE_WEIGHT: f64 = 0.75;

/// Fixed weight of a chapter summary hit
const CHAPTER_WEIGHT: f64 = 0.6;

/// Confidence assigned when the footage provably covers a claimed time
const TIME_COVERAGE_CONFIDENCE: f64 = 0.85;

/// Most evidence references cited per result
const MAX_CITED: usize = 4;

/// Input failures; nothing was compared
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("claim text is empty")]
    EmptyClaim,

    #[error("evidence pack for video '{0}' holds no entries to compare against")]
    EmptyEvidence(String),
}

/// One atomic assertion extracted from the claim text
#[derive(Debug)]
struct Assertion {
    kind: AssertionKind,
    text: String,
    /// (clause index, byte offset) for claim-order sorting
    pos: (usize, usize),
    /// Content terms used for evidence overlap
    terms: Vec<String>,
    /// Minutes of day, for time assertions
    clock: Option<u32>,
    /// True for "alone" style participant assertions
    alone: bool,
}

/// The slice of the video timeline an assertion is checked against
#[derive(Debug, Clone, Copy)]
struct Scope {
    start: f64,
    end: f64,
    /// Claimed instant, when the scope came from a clock time
    center: Option<f64>,
}

/// A piece of evidence contributing to a verdict
struct Contribution {
    evidence: EvidenceRef,
    time: f64,
    weight: f64,
    description: String,
}

/// Compare a witness claim against an evidence pack.
///
/// Results come back in claim text order, one per assertion, and every
/// cited evidence id exists in the pack. Deterministic: same claim and
/// pack always produce identical results.
pub fn compare(
    claim: &WitnessClaim,
    pack: &EvidencePack,
) -> Result<Vec<ComparisonResult>, CompareError> {
    if claim.is_blank() {
        return Err(CompareError::EmptyClaim);
    }
    if pack.is_empty() {
        return Err(CompareError::EmptyEvidence(pack.source.video_id.clone()));
    }

    let assertions = decompose(claim);
    if assertions.is_empty() {
        // The claim said nothing checkable; report that rather than nothing
        return Ok(vec![ComparisonResult {
            assertion: normalize_text(&claim.text),
            kind: AssertionKind::Action,
            verdict: AssertionVerdict::NoEvidence,
            confidence: 0.0,
            evidence: vec![],
            explanation: "the statement could not be broken into checkable assertions"
                .to_string(),
        }]);
    }

    let scope = claim_scope(claim, &assertions, &pack.source);
    Ok(assertions.iter().map(|a| check(a, pack, scope)).collect())
}

// ---------------------------------------------------------------------------
// Decomposition
// ---------------------------------------------------------------------------

const STOPWORDS: &[&str] = &[
    "i", "we", "he", "she", "they", "you", "it", "me", "us", "them", "my", "our", "his", "her",
    "their", "your", "a", "an", "the", "was", "were", "am", "is", "are", "be", "been", "being",
    "had", "have", "has", "do", "did", "does", "and", "or", "but", "then", "that", "this",
    "there", "here", "to", "of", "for", "on", "at", "in", "with", "by", "from", "about",
    "around", "just", "really", "very", "so", "not", "no", "when", "while", "as", "all",
    "some", "went", "got",
];

const LOCATION_PREPOSITIONS: &[&str] =
    &["at", "in", "near", "outside", "inside", "behind", "beside", "by"];

const DETERMINERS: &[&str] = &["the", "a", "an", "my", "our", "his", "her", "their", "that"];

const NP_STOPPERS: &[&str] = &[
    "and", "with", "at", "in", "on", "when", "while", "then", "about", "around", "to", "for",
    "before", "after", "until", "till",
];

/// Nouns that look like objects of a location preposition but talk about
/// time ("at night", "in the evening")
const TIME_NOUNS: &[&str] = &[
    "night", "morning", "afternoon", "evening", "noon", "midnight", "time", "hour", "hours",
    "minute", "minutes", "moment", "oclock", "o'clock",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Collapse whitespace runs, keeping original casing
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased word tokens with their byte spans
fn tokenize_spans(text: &str) -> Vec<(String, usize, usize)> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        if ch.is_alphanumeric() || ch == '\'' {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            tokens.push((text[s..i].to_lowercase(), s, i));
        }
    }
    if let Some(s) = start {
        tokens.push((text[s..].to_lowercase(), s, text.len()));
    }
    tokens
}

/// Content terms of a piece of text (lowercased, stopwords removed)
fn content_terms(text: &str) -> Vec<String> {
    tokenize_spans(text)
        .into_iter()
        .map(|(w, _, _)| w)
        .filter(|w| !is_stopword(w))
        .collect()
}

/// Loose term equality: exact, or one is a prefix extension of the other
/// ("crate" matches "crates", "load" matches "loading")
fn terms_match(a: &str, b: &str) -> bool {
    a == b || (a.len() >= 4 && b.len() >= 4 && (a.starts_with(b) || b.starts_with(a)))
}

fn any_term_overlap(assertion_terms: &[String], evidence_terms: &[String]) -> bool {
    assertion_terms
        .iter()
        .any(|a| evidence_terms.iter().any(|e| terms_match(a, e)))
}

/// A clock reading found in text
#[derive(Debug, Clone, Copy)]
struct ClockHit {
    start: usize,
    end: usize,
    minutes: u32,
}

/// Scan for clock times: "9pm", "9:30 pm", "21:03".
///
/// Bare numbers without a colon or meridiem are not times; "9 crates"
/// must not parse. Byte arithmetic is safe because every matched
/// character is ASCII.
fn scan_clocks(text: &str) -> Vec<ClockHit> {
    let bytes = text.as_bytes();
    let mut hits = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() || (i > 0 && bytes[i - 1].is_ascii_alphanumeric()) {
            i += 1;
            continue;
        }

        let num_start = i;
        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        let hour: u32 = text[num_start..j].parse().unwrap_or(99);

        // Optional ":MM"
        let mut minute = 0u32;
        let mut has_colon = false;
        let mut k = j;
        if k + 1 < bytes.len() && bytes[k] == b':' && bytes[k + 1].is_ascii_digit() {
            let m_start = k + 1;
            let mut m_end = m_start;
            while m_end < bytes.len() && bytes[m_end].is_ascii_digit() {
                m_end += 1;
            }
            if m_end - m_start == 2 {
                minute = text[m_start..m_end].parse().unwrap_or(99);
                has_colon = true;
                k = m_end;
            }
        }

        // Optional meridiem, possibly after one space
        let mut m = k;
        if m < bytes.len() && bytes[m] == b' ' {
            m += 1;
        }
        let rest = &text[m..];
        let meridiem = if starts_word(rest, "pm") {
            Some(true)
        } else if starts_word(rest, "am") {
            Some(false)
        } else {
            None
        };

        match meridiem {
            Some(is_pm) if (1..=12).contains(&hour) && minute <= 59 => {
                let minutes = (hour % 12) * 60 + minute + if is_pm { 720 } else { 0 };
                hits.push(ClockHit { start: num_start, end: m + 2, minutes });
                i = m + 2;
            }
            None if has_colon && hour <= 23 && minute <= 59 => {
                hits.push(ClockHit { start: num_start, end: k, minutes: hour * 60 + minute });
                i = k;
            }
            _ => {
                i = j;
            }
        }
    }

    hits
}

fn starts_word(text: &str, word: &str) -> bool {
    let lower = text.get(..word.len()).map(|s| s.to_lowercase());
    if lower.as_deref() != Some(word) {
        return false;
    }
    text.as_bytes().get(word.len()).map(|b| !b.is_ascii_alphanumeric()).unwrap_or(true)
}

/// Break a claim into atomic assertions, in claim text order.
fn decompose(claim: &WitnessClaim) -> Vec<Assertion> {
    let mut assertions = Vec::new();

    for (clause_idx, clause) in split_clauses(&claim.text).into_iter().enumerate() {
        decompose_clause(&clause, clause_idx, &mut assertions);
    }

    // Structured location hint, when the text itself named no place
    if !assertions.iter().any(|a| a.kind == AssertionKind::Location) {
        if let Some(location) = &claim.claimed_location {
            let terms = content_terms(location);
            if !terms.is_empty() {
                assertions.push(Assertion {
                    kind: AssertionKind::Location,
                    text: format!("at {}", normalize_text(location)),
                    pos: (usize::MAX, 0),
                    terms,
                    clock: None,
                    alone: false,
                });
            }
        }
    }

    assertions.sort_by_key(|a| a.pos);
    assertions
}

/// Clause boundaries: sentence punctuation and commas
fn split_clauses(text: &str) -> Vec<String> {
    text.split(['.', ';', '!', '?', ','])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn decompose_clause(clause: &str, clause_idx: usize, out: &mut Vec<Assertion>) {
    let tokens = tokenize_spans(clause);
    let mut consumed: Vec<(usize, usize)> = Vec::new();

    // 1. Clock times
    for hit in scan_clocks(clause) {
        let text = clock_phrase(clause, &hit);
        consumed.push((hit.start, hit.end));
        out.push(Assertion {
            kind: AssertionKind::Time,
            text,
            pos: (clause_idx, hit.start),
            terms: vec![],
            clock: Some(hit.minutes),
            alone: false,
        });
    }
    for (word, s, e) in &tokens {
        let minutes = match word.as_str() {
            "noon" => Some(720),
            "midnight" => Some(0),
            _ => None,
        };
        if let Some(minutes) = minutes {
            consumed.push((*s, *e));
            out.push(Assertion {
                kind: AssertionKind::Time,
                text: word.clone(),
                pos: (clause_idx, *s),
                terms: vec![],
                clock: Some(minutes),
                alone: false,
            });
        }
    }

    // 2. "alone" style participant phrases
    let mut i = 0;
    while i < tokens.len() {
        let alone_len = match tokens[i].0.as_str() {
            "alone" | "solo" => Some(1),
            "by" if matches!(tokens.get(i + 1), Some(t) if t.0 == "myself") => Some(2),
            "on" if phrase_at(&tokens, i, &["on", "my", "own"]) => Some(3),
            "nobody" | "noone" => Some(1),
            "no" if matches!(tokens.get(i + 1), Some(t) if t.0 == "one") => Some(2),
            _ => None,
        };
        if let Some(len) = alone_len {
            let span = (tokens[i].1, tokens[i + len - 1].2);
            if !overlaps_any(span, &consumed) {
                consumed.push(span);
                out.push(Assertion {
                    kind: AssertionKind::Participant,
                    text: clause[span.0..span.1].to_lowercase(),
                    pos: (clause_idx, span.0),
                    terms: vec!["alone".to_string()],
                    clock: None,
                    alone: true,
                });
                i += len;
                continue;
            }
        }
        i += 1;
    }

    // 3. "with <someone>" participant phrases
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].0 == "with" && !overlaps_any((tokens[i].1, tokens[i].2), &consumed) {
            if let Some((phrase_end, terms)) = noun_phrase(&tokens, i + 1, &consumed) {
                let span = (tokens[i].1, phrase_end);
                consumed.push(span);
                out.push(Assertion {
                    kind: AssertionKind::Participant,
                    text: normalize_text(&clause[span.0..span.1]),
                    pos: (clause_idx, span.0),
                    terms,
                    clock: None,
                    alone: false,
                });
                i += 1;
                continue;
            }
        }
        i += 1;
    }

    // 4. Location phrases: preposition + noun phrase
    let mut i = 0;
    while i < tokens.len() {
        let word = tokens[i].0.as_str();
        if LOCATION_PREPOSITIONS.contains(&word)
            && !overlaps_any((tokens[i].1, tokens[i].2), &consumed)
        {
            if let Some((phrase_end, terms)) = noun_phrase(&tokens, i + 1, &consumed) {
                let is_time_noun = terms.first().map(|t| TIME_NOUNS.contains(&t.as_str()));
                if is_time_noun == Some(false) {
                    let span = (tokens[i].1, phrase_end);
                    consumed.push(span);
                    out.push(Assertion {
                        kind: AssertionKind::Location,
                        text: normalize_text(&clause[span.0..span.1]),
                        pos: (clause_idx, span.0),
                        terms,
                        clock: None,
                        alone: false,
                    });
                    i += 1;
                    continue;
                }
            }
        }
        i += 1;
    }

    // 5. Whatever remains with content is an action assertion
    let leftover: Vec<&(String, usize, usize)> = tokens
        .iter()
        .filter(|(_, s, e)| !overlaps_any((*s, *e), &consumed))
        .collect();
    let terms: Vec<String> =
        leftover.iter().map(|(w, _, _)| w.clone()).filter(|w| !is_stopword(w)).collect();
    if !terms.is_empty() {
        let first = leftover
            .iter()
            .find(|(w, _, _)| !is_stopword(w))
            .map(|(_, s, _)| *s)
            .unwrap_or(0);
        let text = leftover
            .iter()
            .skip_while(|(w, _, _)| is_stopword(w))
            .map(|(w, _, _)| w.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        out.push(Assertion {
            kind: AssertionKind::Action,
            text,
            pos: (clause_idx, first),
            terms,
            clock: None,
            alone: false,
        });
    }
}

/// Expand a clock hit to include an immediately preceding qualifier word
fn clock_phrase(clause: &str, hit: &ClockHit) -> String {
    let prefix = clause[..hit.start].trim_end();
    let qualifier = prefix
        .rsplit(' ')
        .next()
        .map(|w| w.to_lowercase())
        .filter(|w| {
            matches!(w.as_str(), "at" | "around" | "about" | "by" | "before" | "after" | "until")
        });

    let time_text = clause[hit.start..hit.end.min(clause.len())].to_lowercase();
    match qualifier {
        Some(q) => format!("{} {}", q, time_text),
        None => time_text,
    }
}

fn phrase_at(tokens: &[(String, usize, usize)], i: usize, words: &[&str]) -> bool {
    words
        .iter()
        .enumerate()
        .all(|(off, w)| matches!(tokens.get(i + off), Some(t) if t.0 == *w))
}

fn overlaps_any(span: (usize, usize), consumed: &[(usize, usize)]) -> bool {
    consumed.iter().any(|&(s, e)| span.0 < e && span.1 > s)
}

/// Walk a noun phrase starting at `from`: skip determiners, then take up
/// to four content tokens. Returns the phrase's end byte and its terms.
fn noun_phrase(
    tokens: &[(String, usize, usize)],
    from: usize,
    consumed: &[(usize, usize)],
) -> Option<(usize, Vec<String>)> {
    let mut idx = from;
    while idx < tokens.len() && DETERMINERS.contains(&tokens[idx].0.as_str()) {
        idx += 1;
    }

    let mut terms = Vec::new();
    let mut end = None;
    while idx < tokens.len() && terms.len() < 4 {
        let (word, s, e) = &tokens[idx];
        if NP_STOPPERS.contains(&word.as_str())
            || overlaps_any((*s, *e), consumed)
            || word.chars().all(|c| c.is_ascii_digit())
        {
            break;
        }
        // Connectives inside the phrase ("back of the warehouse") extend the
        // span but do not become matchable terms.
        if !is_stopword(word) {
            terms.push(word.clone());
        }
        end = Some(*e);
        idx += 1;
    }

    if terms.is_empty() {
        return None;
    }
    end.map(|e| (e, terms))
}

// ---------------------------------------------------------------------------
// Scope resolution
// ---------------------------------------------------------------------------

/// Seconds between a claimed clock time and the recording anchor,
/// interpreted across midnight in the nearest direction
fn clock_to_offset(minutes: u32, anchor: chrono::DateTime<chrono::Utc>) -> f64 {
    let anchor_secs = anchor.num_seconds_from_midnight() as f64;
    let mut delta = minutes as f64 * 60.0 - anchor_secs;
    if delta < -43200.0 {
        delta += 86400.0;
    } else if delta > 43200.0 {
        delta -= 86400.0;
    }
    delta
}

/// Resolve the window every assertion is checked in.
///
/// Priority: the claim's structured window, then parsed clock times,
/// then the whole timeline.
fn claim_scope(
    claim: &WitnessClaim,
    assertions: &[Assertion],
    source: &EvidencePackSource,
) -> Scope {
    let duration = source.duration_secs;
    let whole = Scope { start: 0.0, end: duration, center: None };

    let Some(anchor) = source.recorded_at else {
        return whole;
    };

    if let Some(window) = &claim.claimed_window {
        let s = (window.start - anchor).num_milliseconds() as f64 / 1000.0;
        let e = (window.end - anchor).num_milliseconds() as f64 / 1000.0;
        let start = s.max(0.0);
        let end = e.min(duration);
        if end > start {
            return Scope { start, end, center: Some((start + end) / 2.0) };
        }
    }

    let offsets: Vec<f64> = assertions
        .iter()
        .filter_map(|a| a.clock)
        .map(|m| clock_to_offset(m, anchor))
        .filter(|o| *o >= -TIME_TOLERANCE_SECS && *o <= duration + TIME_TOLERANCE_SECS)
        .collect();

    if offsets.is_empty() {
        return whole;
    }

    let lo = offsets.iter().cloned().fold(f64::MAX, f64::min);
    let hi = offsets.iter().cloned().fold(f64::MIN, f64::max);
    let start = (lo - TIME_TOLERANCE_SECS).max(0.0);
    let end = (hi + TIME_TOLERANCE_SECS).min(duration);
    let center = offsets.iter().sum::<f64>() / offsets.len() as f64;
    Scope { start, end, center: Some(center.clamp(0.0, duration)) }
}

// ---------------------------------------------------------------------------
// Checking
// ---------------------------------------------------------------------------

/// Evidence labels that explicitly state a location
fn is_location_bearing(label_terms: &[String]) -> bool {
    label_terms.iter().any(|t| {
        matches!(t.as_str(), "location" | "entering" | "leaving" | "arriving" | "premises")
    })
}

/// Evidence labels asserting a lone subject
fn is_alone_marker(label_terms: &[String]) -> bool {
    label_terms
        .iter()
        .any(|t| matches!(t.as_str(), "alone" | "single" | "solitary" | "lone" | "unaccompanied"))
}

/// Evidence labels asserting company
fn is_accompanied_marker(label_terms: &[String]) -> bool {
    label_terms.iter().any(|t| {
        matches!(
            t.as_str(),
            "two" | "three" | "several" | "group" | "people" | "persons" | "pair" | "crowd"
                | "together" | "accompanied"
        )
    })
}

/// Evidence labels asserting absence of activity
fn is_absence_marker(label_terms: &[String]) -> bool {
    label_terms.iter().any(|t| {
        matches!(t.as_str(), "empty" | "vacant" | "deserted" | "unoccupied" | "nobody")
    })
}

fn proximity(time: f64, scope: Scope) -> f64 {
    let delta = match scope.center {
        Some(center) => (time - center).abs(),
        None => 0.0,
    };
    1.0 / (1.0 + delta / PROXIMITY_SCALE_SECS)
}

fn check(assertion: &Assertion, pack: &EvidencePack, scope: Scope) -> ComparisonResult {
    if assertion.kind == AssertionKind::Time {
        return check_time(assertion, pack);
    }
    if assertion.terms.is_empty() {
        return ComparisonResult {
            assertion: assertion.text.clone(),
            kind: assertion.kind,
            verdict: AssertionVerdict::NoEvidence,
            confidence: 0.0,
            evidence: vec![],
            explanation: "this fragment carried nothing checkable".to_string(),
        };
    }

    let mut support: Vec<Contribution> = Vec::new();
    let mut conflict: Vec<Contribution> = Vec::new();

    for event in pack.events_in(scope.start, scope.end) {
        let label_terms = content_terms(&event.label);
        let weight = event.confidence * proximity(event.start, scope);
        let contribution = |description: &str| Contribution {
            evidence: EvidenceRef::Event(event.id.clone()),
            time: event.start,
            weight,
            description: description.to_string(),
        };

        let overlap = any_term_overlap(&assertion.terms, &label_terms);
        let conflicting = match assertion.kind {
            AssertionKind::Location => !overlap && is_location_bearing(&label_terms),
            AssertionKind::Participant => {
                !overlap
                    && if assertion.alone {
                        is_accompanied_marker(&label_terms)
                    } else {
                        is_alone_marker(&label_terms)
                    }
            }
            // Absence evidence outranks shared wording ("empty loading
            // dock" contradicts "loading crates"), but only when the
            // claim pins a time; a quiet stretch elsewhere in the
            // footage contradicts nothing
            AssertionKind::Action => scope.center.is_some() && is_absence_marker(&label_terms),
            AssertionKind::Time => false,
        };

        if conflicting {
            conflict.push(contribution(&event.label));
        } else if overlap {
            support.push(contribution(&event.label));
        } else if assertion.kind == AssertionKind::Participant
            && !assertion.alone
            && is_accompanied_marker(&label_terms)
        {
            // "with Marcus" is weakly supported by any sign of company
            support.push(Contribution { weight: weight * 0.5, ..contribution(&event.label) });
        }
    }

    for quote in pack.quotes_in(scope.start, scope.end) {
        let quote_terms = content_terms(&quote.text);
        if any_term_overlap(&assertion.terms, &quote_terms) {
            support.push(Contribution {
                evidence: EvidenceRef::Quote(quote.id.clone()),
                time: quote.start,
                weight: QUOTE_WEIGHT * proximity(quote.start, scope),
                description: format!("\"{}\"", quote.text),
            });
        }
    }

    for chapter in pack.chapters_in(scope.start, scope.end) {
        let summary_terms = content_terms(&chapter.summary);
        if any_term_overlap(&assertion.terms, &summary_terms) {
            let midpoint = (chapter.start + chapter.end) / 2.0;
            support.push(Contribution {
                evidence: EvidenceRef::Chapter(chapter.id.clone()),
                time: chapter.start,
                weight: CHAPTER_WEIGHT * proximity(midpoint, scope),
                description: chapter.summary.clone(),
            });
        }
    }

    build_result(assertion, support, conflict)
}

/// Time assertions are answered by coverage: does the footage provably
/// include the claimed instant?
fn check_time(assertion: &Assertion, pack: &EvidencePack) -> ComparisonResult {
    let base = |verdict, confidence, evidence, explanation: String| ComparisonResult {
        assertion: assertion.text.clone(),
        kind: AssertionKind::Time,
        verdict,
        confidence,
        evidence,
        explanation,
    };

    let Some(minutes) = assertion.clock else {
        return base(
            AssertionVerdict::NoEvidence,
            0.0,
            vec![],
            "no readable time in this fragment".to_string(),
        );
    };

    let Some(anchor) = pack.source.recorded_at else {
        return base(
            AssertionVerdict::NoEvidence,
            0.0,
            vec![],
            "the footage carries no wall-clock anchor to place this time".to_string(),
        );
    };

    let duration = pack.source.duration_secs;
    let offset = clock_to_offset(minutes, anchor);
    if offset < -TIME_TOLERANCE_SECS || offset > duration + TIME_TOLERANCE_SECS {
        return base(
            AssertionVerdict::NoEvidence,
            0.0,
            vec![],
            "the footage does not cover the claimed time".to_string(),
        );
    }

    let at = offset.clamp(0.0, duration);
    let covering = pack
        .chapters
        .iter()
        .find(|c| c.overlaps(at, at))
        .map(|c| EvidenceRef::Chapter(c.id.clone()));

    base(
        AssertionVerdict::Match,
        TIME_COVERAGE_CONFIDENCE,
        covering.into_iter().collect(),
        format!("the footage covers the claimed time (video offset {})", format_offset(at)),
    )
}

/// Score gathered contributions into a verdict.
///
/// Confidence is monotone: more or stronger corroboration never lowers a
/// match score, more conflict never raises it.
fn build_result(
    assertion: &Assertion,
    mut support: Vec<Contribution>,
    mut conflict: Vec<Contribution>,
) -> ComparisonResult {
    let s: f64 = support.iter().map(|c| c.weight).sum();
    let c: f64 = conflict.iter().map(|c| c.weight).sum();

    let order = |list: &mut Vec<Contribution>| {
        list.sort_by(|a, b| {
            b.weight.total_cmp(&a.weight).then(a.time.total_cmp(&b.time))
        });
    };

    if support.is_empty() && conflict.is_empty() {
        return ComparisonResult {
            assertion: assertion.text.clone(),
            kind: assertion.kind,
            verdict: AssertionVerdict::NoEvidence,
            confidence: 0.0,
            evidence: vec![],
            explanation: "nothing in the reviewed footage speaks to this".to_string(),
        };
    }

    if s >= c {
        order(&mut support);
        let strongest = &support[0];
        let extra = support.len() - 1;
        let explanation = if extra == 0 {
            format!("footage at {} shows {}", format_offset(strongest.time), strongest.description)
        } else {
            format!(
                "footage at {} shows {} ({} further corroborating detail{})",
                format_offset(strongest.time),
                strongest.description,
                extra,
                if extra == 1 { "" } else { "s" }
            )
        };
        ComparisonResult {
            assertion: assertion.text.clone(),
            kind: assertion.kind,
            verdict: AssertionVerdict::Match,
            confidence: s / (s + c + SCORE_SMOOTHING),
            evidence: support.into_iter().take(MAX_CITED).map(|x| x.evidence).collect(),
            explanation,
        }
    } else {
        order(&mut conflict);
        let strongest = &conflict[0];
        let explanation = format!(
            "footage at {} instead shows {}",
            format_offset(strongest.time),
            strongest.description
        );
        ComparisonResult {
            assertion: assertion.text.clone(),
            kind: assertion.kind,
            verdict: AssertionVerdict::Mismatch,
            confidence: c / (s + c + SCORE_SMOOTHING),
            evidence: conflict.into_iter().take(MAX_CITED).map(|x| x.evidence).collect(),
            explanation,
        }
    }
}
