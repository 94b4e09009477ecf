//! Evidence normalization: raw detections to a structured evidence pack.
//!
//! The normalizer is pure and deterministic: the same raw analysis and
//! source always produce a byte-identical pack. It merges near-duplicate
//! detections, derives chapters from event density, extracts key quotes,
//! and enforces the pack's timestamp invariants.
//!
//! # Design Decisions (V1)
//!
//! - **Drop, don't repair**: detections with unusable timestamps or scores
//!   are dropped with a data-quality warning, never guessed at
//! - **Anchor timestamps**: a merged event sits at its highest-confidence
//!   member's timestamp, with the cluster envelope as its range
//! - **Quotes are not events**: transcript-bearing detections become key
//!   quotes only, so spoken content is never counted twice

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

use crate::domain::analysis::{DetectionKind, VideoAnalysis, VideoDetection};
use crate::domain::evidence::{
    evidence_id, EvidenceChapter, EvidenceEvent, EvidenceKeyQuote, EvidencePack,
    EvidencePackSource,
};

/// Two detections of the same thing within this many seconds merge
const MERGE_WINDOW_SECS: f64 = 2.0;

/// Preferred chapter bucket length in seconds
const CHAPTER_BUCKET_SECS: f64 = 30.0;

/// Minimum number of density buckets per video
const MIN_BUCKETS: usize = 4;

/// Fatal normalization failures; recorded on the job by the tracker
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("video duration must be positive, got {0}")]
    BadDuration(f64),

    #[error("analysis contained {total} detections but none were usable")]
    NoUsableDetections { total: usize },
}

/// A detection that survived sanitization
struct CleanDetection {
    label: String,
    start: f64,
    end: Option<f64>,
    confidence: f64,
    kind: DetectionKind,
    transcript: Option<String>,
    speaker: Option<String>,
}

/// Normalize a raw analysis into an evidence pack.
///
/// Invariants established here and relied on by the comparator:
/// - every timestamp lies within [0, source.duration_secs]
/// - chapters are ordered by non-decreasing start
/// - events are ordered by (start, label), quotes by (start, text)
pub fn normalize(
    analysis: &VideoAnalysis,
    source: EvidencePackSource,
) -> Result<EvidencePack, NormalizeError> {
    let duration = source.duration_secs;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(NormalizeError::BadDuration(duration));
    }

    let total = analysis.detections.len();
    let clean = sanitize(&analysis.detections, duration);
    if clean.is_empty() && total > 0 {
        return Err(NormalizeError::NoUsableDetections { total });
    }

    let (speech, visual): (Vec<_>, Vec<_>) = clean.into_iter().partition(|d| {
        d.transcript.is_some()
            && matches!(d.kind, DetectionKind::Speech | DetectionKind::OnScreenText)
    });

    let events = merge_events(visual);
    let quotes = extract_quotes(speech);
    let chapters = derive_chapters(&events, &quotes, duration);

    Ok(EvidencePack { source, chapters, events, quotes })
}

/// Collapse whitespace runs and lowercase, so label variants spelled
/// differently by the service still merge
fn normalize_label(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Drop detections the pack cannot represent, clamping what it can.
///
/// - non-finite or negative timestamps: dropped
/// - timestamps beyond the footage: dropped
/// - end times are clamped into [start, duration]; a nonsensical end
///   (before start) degrades the detection to a point in time
/// - confidences are clamped into [0, 1]
fn sanitize(detections: &[VideoDetection], duration: f64) -> Vec<CleanDetection> {
    let mut clean = Vec::with_capacity(detections.len());

    for detection in detections {
        let label = normalize_label(&detection.label);
        if label.is_empty() {
            warn!(start = detection.start, "dropping detection with empty label");
            continue;
        }

        if !detection.start.is_finite() || detection.start < 0.0 || detection.start > duration {
            warn!(
                label = %label,
                start = detection.start,
                duration,
                "dropping detection with out-of-range timestamp"
            );
            continue;
        }

        if !detection.confidence.is_finite() {
            warn!(label = %label, "dropping detection with unusable confidence");
            continue;
        }
        let confidence = detection.confidence.clamp(0.0, 1.0);
        if confidence != detection.confidence {
            warn!(
                label = %label,
                confidence = detection.confidence,
                "clamping out-of-range confidence"
            );
        }

        let end = detection
            .end
            .filter(|e| e.is_finite())
            .map(|e| e.min(duration))
            .filter(|&e| e > detection.start);

        let transcript = detection
            .transcript
            .as_deref()
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty());

        clean.push(CleanDetection {
            label,
            start: detection.start,
            end,
            confidence,
            kind: detection.kind,
            transcript,
            speaker: detection.speaker.clone(),
        });
    }

    clean
}

/// Merge same-label detections within the proximity window into events.
///
/// Clusters chain: a detection joins the open cluster when its timestamp
/// is within `MERGE_WINDOW_SECS` of the previous member. The merged event
/// takes the highest-confidence member's timestamp (ties break to the
/// earlier member), the maximum confidence, and the cluster's full span.
fn merge_events(detections: Vec<CleanDetection>) -> Vec<EvidenceEvent> {
    // Group by label; BTreeMap keeps label iteration deterministic
    let mut by_label: BTreeMap<String, Vec<CleanDetection>> = BTreeMap::new();
    for d in detections {
        by_label.entry(d.label.clone()).or_default().push(d);
    }

    let mut events = Vec::new();
    for (label, mut members) in by_label {
        members.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut cluster: Vec<CleanDetection> = Vec::new();
        let flush = |cluster: &mut Vec<CleanDetection>, events: &mut Vec<EvidenceEvent>| {
            if cluster.is_empty() {
                return;
            }
            let anchor = cluster
                .iter()
                .max_by(|a, b| {
                    a.confidence
                        .total_cmp(&b.confidence)
                        .then(b.start.total_cmp(&a.start))
                })
                .map(|d| d.start)
                .unwrap_or(cluster[0].start);
            let confidence = cluster.iter().map(|d| d.confidence).fold(0.0, f64::max);
            let envelope_end = cluster
                .iter()
                .map(|d| d.end.unwrap_or(d.start))
                .fold(f64::MIN, f64::max);
            let end = if envelope_end > anchor { Some(envelope_end) } else { None };

            events.push(EvidenceEvent {
                id: evidence_id("ev", &label, anchor),
                label: label.clone(),
                start: anchor,
                end,
                confidence,
                sources: cluster.len() as u32,
            });
            cluster.clear();
        };

        for member in members {
            let chained = cluster
                .last()
                .map(|prev| member.start - prev.start <= MERGE_WINDOW_SECS)
                .unwrap_or(false);
            if !chained {
                flush(&mut cluster, &mut events);
            }
            cluster.push(member);
        }
        flush(&mut cluster, &mut events);
    }

    events.sort_by(|a, b| a.start.total_cmp(&b.start).then_with(|| a.label.cmp(&b.label)));
    events
}

/// Turn transcript-bearing detections into key quotes
fn extract_quotes(detections: Vec<CleanDetection>) -> Vec<EvidenceKeyQuote> {
    let mut quotes: Vec<EvidenceKeyQuote> = Vec::new();

    for d in detections {
        let text = match d.transcript {
            Some(t) => t,
            None => continue,
        };
        let speaker = d
            .speaker
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        quotes.push(EvidenceKeyQuote {
            id: evidence_id("q", &text, d.start),
            start: d.start,
            speaker,
            text,
        });
    }

    quotes.sort_by(|a, b| a.start.total_cmp(&b.start).then_with(|| a.text.cmp(&b.text)));
    quotes.dedup_by(|a, b| a.id == b.id);
    quotes
}

/// Derive chapters from event density.
///
/// The timeline is cut into fixed buckets, and a chapter boundary opens
/// where a bucket's activity jumps to at least double (or falls to at most
/// half) of the running chapter mean, with an absolute change of one. When
/// density is uniform the whole video is split into equal quarters.
fn derive_chapters(
    events: &[EvidenceEvent],
    quotes: &[EvidenceKeyQuote],
    duration: f64,
) -> Vec<EvidenceChapter> {
    let bucket_len = (duration / MIN_BUCKETS as f64).min(CHAPTER_BUCKET_SECS);
    let n_buckets = ((duration / bucket_len).ceil() as usize).max(1);

    let mut counts = vec![0u32; n_buckets];
    let bucket_of = |start: f64| ((start / bucket_len) as usize).min(n_buckets - 1);
    for e in events {
        counts[bucket_of(e.start)] += 1;
    }
    for q in quotes {
        counts[bucket_of(q.start)] += 1;
    }

    // Walk buckets, cutting where density shifts significantly
    let mut boundaries = vec![0usize];
    let mut chapter_sum = counts[0] as f64;
    let mut chapter_len = 1usize;
    for (i, &count) in counts.iter().enumerate().skip(1) {
        let mean = chapter_sum / chapter_len as f64;
        let c = count as f64;
        let jumped = c >= 2.0 * mean && c - mean >= 1.0;
        let dropped = c <= mean / 2.0 && mean - c >= 1.0;
        if jumped || dropped {
            boundaries.push(i);
            chapter_sum = c;
            chapter_len = 1;
        } else {
            chapter_sum += c;
            chapter_len += 1;
        }
    }

    // Uniform density: fall back to fixed windows
    if boundaries.len() == 1 {
        let step = n_buckets / MIN_BUCKETS;
        boundaries = (0..MIN_BUCKETS).map(|i| i * step).collect();
    }

    let mut chapters = Vec::with_capacity(boundaries.len());
    for (idx, &bucket) in boundaries.iter().enumerate() {
        let start = (bucket as f64 * bucket_len).clamp(0.0, duration);
        let end = match boundaries.get(idx + 1) {
            Some(&next) => (next as f64 * bucket_len).clamp(0.0, duration),
            None => duration,
        };
        if end <= start {
            continue;
        }
        chapters.push(EvidenceChapter {
            id: format!("ch-{:02}", chapters.len() + 1),
            start,
            end,
            summary: summarize_window(events, quotes, start, end, idx + 1 == boundaries.len()),
        });
    }

    chapters
}

/// Describe a chapter by its most prominent activity
fn summarize_window(
    events: &[EvidenceEvent],
    quotes: &[EvidenceKeyQuote],
    start: f64,
    end: f64,
    inclusive_end: bool,
) -> String {
    let in_window = |t: f64| t >= start && (t < end || (inclusive_end && t <= end));

    // Rank labels by occurrence count, then peak confidence, then name
    let mut labels: BTreeMap<&str, (u32, f64)> = BTreeMap::new();
    for e in events.iter().filter(|e| in_window(e.start)) {
        let entry = labels.entry(&e.label).or_insert((0, 0.0));
        entry.0 += e.sources;
        entry.1 = entry.1.max(e.confidence);
    }

    let mut ranked: Vec<(&str, (u32, f64))> = labels.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1 .0
            .cmp(&a.1 .0)
            .then(b.1 .1.total_cmp(&a.1 .1))
            .then(a.0.cmp(b.0))
    });

    let quote_count = quotes.iter().filter(|q| in_window(q.start)).count();

    let mut parts: Vec<String> =
        ranked.iter().take(3).map(|(label, _)| label.to_string()).collect();
    if parts.is_empty() {
        if quote_count > 0 {
            return format!(
                "{} recorded remark{}",
                quote_count,
                if quote_count == 1 { "" } else { "s" }
            );
        }
        return "no notable activity".to_string();
    }
    if quote_count > 0 {
        parts.push(format!(
            "{} recorded remark{}",
            quote_count,
            if quote_count == 1 { "" } else { "s" }
        ));
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn source(duration: f64) -> EvidencePackSource {
        EvidencePackSource {
            video_id: "vid-test".to_string(),
            title: None,
            duration_secs: duration,
            recorded_at: None,
            uploaded_at: "2024-03-01T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_label_normalization() {
        assert_eq!(normalize_label("  Person   Walking\t"), "person walking");
        assert_eq!(normalize_label("CAR"), "car");
    }

    #[test]
    fn test_out_of_range_detections_dropped() {
        let analysis = VideoAnalysis::from_detections(vec![
            VideoDetection::visual("ok", 10.0, 0.5),
            VideoDetection::visual("negative", -3.0, 0.5),
            VideoDetection::visual("beyond", 500.0, 0.5),
            VideoDetection::visual("nan", f64::NAN, 0.5),
        ]);

        let pack = normalize(&analysis, source(100.0)).unwrap();
        assert_eq!(pack.events.len(), 1);
        assert_eq!(pack.events[0].label, "ok");
    }

    #[test]
    fn test_all_detections_unusable_is_fatal() {
        let analysis =
            VideoAnalysis::from_detections(vec![VideoDetection::visual("bad", -1.0, 0.5)]);

        let err = normalize(&analysis, source(100.0)).unwrap_err();
        assert!(matches!(err, NormalizeError::NoUsableDetections { total: 1 }));
    }

    #[test]
    fn test_bad_duration_is_fatal() {
        let analysis = VideoAnalysis::from_detections(vec![]);
        assert!(matches!(
            normalize(&analysis, source(0.0)),
            Err(NormalizeError::BadDuration(_))
        ));
    }

    #[test]
    fn test_same_label_merging() {
        let analysis = VideoAnalysis::from_detections(vec![
            VideoDetection::visual("person walking", 10.0, 0.6),
            VideoDetection::visual("person walking", 11.5, 0.9),
            VideoDetection::visual("person walking", 12.5, 0.7),
            // Outside the chain window: separate event
            VideoDetection::visual("person walking", 30.0, 0.8),
        ]);

        let pack = normalize(&analysis, source(100.0)).unwrap();
        assert_eq!(pack.events.len(), 2);

        // Highest-confidence member anchors the merged event
        assert_eq!(pack.events[0].start, 11.5);
        assert_eq!(pack.events[0].confidence, 0.9);
        assert_eq!(pack.events[0].sources, 3);
        assert_eq!(pack.events[1].start, 30.0);
        assert_eq!(pack.events[1].sources, 1);
    }

    #[test]
    fn test_merge_envelope_becomes_range() {
        let analysis = VideoAnalysis::from_detections(vec![
            VideoDetection::visual("truck idling", 5.0, 0.9).with_end(8.0),
            VideoDetection::visual("truck idling", 6.5, 0.4).with_end(12.0),
        ]);

        let pack = normalize(&analysis, source(100.0)).unwrap();
        assert_eq!(pack.events.len(), 1);
        assert_eq!(pack.events[0].start, 5.0);
        assert_eq!(pack.events[0].end, Some(12.0));
    }

    #[test]
    fn test_quotes_extracted_not_duplicated_as_events() {
        let analysis = VideoAnalysis::from_detections(vec![
            VideoDetection::speech("Get out of here", 42.0, 0.8),
            VideoDetection::visual("door opens", 41.0, 0.7),
        ]);

        let pack = normalize(&analysis, source(100.0)).unwrap();
        assert_eq!(pack.events.len(), 1);
        assert_eq!(pack.quotes.len(), 1);
        assert_eq!(pack.quotes[0].text, "Get out of here");
        assert_eq!(pack.quotes[0].speaker, "unknown");
    }

    #[test]
    fn test_speaker_attribution_kept() {
        let analysis = VideoAnalysis::from_detections(vec![
            VideoDetection::speech("I said stop", 10.0, 0.8).with_speaker("guard")
        ]);

        let pack = normalize(&analysis, source(60.0)).unwrap();
        assert_eq!(pack.quotes[0].speaker, "guard");
    }

    #[test]
    fn test_chapters_cover_timeline_in_order() {
        let mut detections = Vec::new();
        // Quiet opening, burst in the middle
        for i in 0..6 {
            detections.push(VideoDetection::visual(
                "crate moved",
                130.0 + (i as f64) * 4.0,
                0.8,
            ));
        }
        let analysis = VideoAnalysis::from_detections(detections);

        let pack = normalize(&analysis, source(240.0)).unwrap();
        assert!(!pack.chapters.is_empty());

        for pair in pack.chapters.windows(2) {
            assert!(pair[0].start <= pair[1].start);
            assert!((pair[0].end - pair[1].start).abs() < 1e-9);
        }
        assert_eq!(pack.chapters.first().unwrap().start, 0.0);
        assert_eq!(pack.chapters.last().unwrap().end, 240.0);
    }

    #[test]
    fn test_uniform_density_falls_back_to_quarters() {
        let analysis = VideoAnalysis::from_detections(vec![]);
        let pack = normalize(&analysis, source(400.0)).unwrap();

        assert_eq!(pack.chapters.len(), 4);
        assert_eq!(pack.chapters[0].summary, "no notable activity");
    }

    #[test]
    fn test_deterministic_output() {
        let analysis = VideoAnalysis::from_detections(vec![
            VideoDetection::visual("person walking", 10.0, 0.6),
            VideoDetection::visual("car arrives", 50.0, 0.9).with_end(55.0),
            VideoDetection::speech("over here", 51.0, 0.7),
            VideoDetection::visual("person walking", 11.0, 0.8),
        ]);

        let a = normalize(&analysis, source(120.0)).unwrap();
        let b = normalize(&analysis, source(120.0)).unwrap();

        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }
}
