//! Raw output of the external video-understanding service.
//!
//! This is the wire shape before normalization: a flat list of detections
//! with labels, timestamps and confidences. The normalizer turns it into an
//! [`EvidencePack`](super::evidence::EvidencePack).

use serde::{Deserialize, Serialize};

/// The kind of signal a detection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    /// Visual detection (object, person, scene)
    Visual,

    /// Speech transcription segment
    Speech,

    /// Text read off the frame (signs, documents, screens)
    OnScreenText,
}

impl Default for DetectionKind {
    fn default() -> Self {
        Self::Visual
    }
}

/// One raw detection record from the indexing service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDetection {
    /// What the service saw ("subject location: warehouse", "person: tall figure")
    pub label: String,

    /// Offset into the video in seconds
    pub start: f64,

    /// End of the detection range, when the service reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,

    /// Service-reported confidence in [0, 1]
    pub confidence: f64,

    /// Signal kind
    #[serde(default)]
    pub kind: DetectionKind,

    /// Transcribed or read text, for speech/on-screen detections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    /// Speaker attribution, when the service diarized the audio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

impl VideoDetection {
    /// A visual detection with just label/time/confidence
    pub fn visual(label: impl Into<String>, start: f64, confidence: f64) -> Self {
        Self {
            label: label.into(),
            start,
            end: None,
            confidence,
            kind: DetectionKind::Visual,
            transcript: None,
            speaker: None,
        }
    }

    /// A transcribed speech segment
    pub fn speech(transcript: impl Into<String>, start: f64, confidence: f64) -> Self {
        let transcript = transcript.into();
        Self {
            label: format!("speech: {}", transcript),
            start,
            end: None,
            confidence,
            kind: DetectionKind::Speech,
            transcript: Some(transcript),
            speaker: None,
        }
    }

    /// Set the end of the detection range
    pub fn with_end(mut self, end: f64) -> Self {
        self.end = Some(end);
        self
    }

    /// Attach a speaker attribution
    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    /// True when the detection carries text the normalizer can quote
    pub fn bears_transcript(&self) -> bool {
        self.transcript.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// Complete raw analysis for one video, as returned by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAnalysis {
    /// Upstream task identifier, when the result came from a live service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// All detections, in no guaranteed order
    #[serde(default)]
    pub detections: Vec<VideoDetection>,
}

impl VideoAnalysis {
    /// Wrap a detection list (fixture and test construction)
    pub fn from_detections(detections: Vec<VideoDetection>) -> Self {
        Self {
            task_id: None,
            detections,
        }
    }
}
