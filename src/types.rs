//! Values passed between pipeline stages.
//!
//! Every score leaving a stage goes through [`clamp_score`], so downstream
//! code can assume the 0..=100 range.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize, Serializer};

/// Clamp a score to 0..=100; NaN becomes 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Round half up and clamp into a whole-number score.
pub fn round_score(value: f64) -> u8 {
    clamp_score(value).round() as u8
}

/// One still image captured from the analysis window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Capture position in seconds
    pub timestamp: f64,
    /// JPEG bytes, serialized as a data URL
    #[serde(rename = "image", serialize_with = "serialize_data_url")]
    pub encoded_image: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// `data:image/jpeg;base64,...` form sent to the visual scorer
    pub fn data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", STANDARD.encode(&self.encoded_image))
    }

    /// Length of [`Frame::data_url`] without building it
    pub fn data_url_len(&self) -> usize {
        "data:image/jpeg;base64,".len() + self.encoded_image.len().div_ceil(3) * 4
    }
}

fn serialize_data_url<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
}

/// Trimmed mono clip in a RIFF/WAVE container. May be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_seconds: f64,
}

impl AudioClip {
    pub fn empty(sample_rate: u32) -> Self {
        Self {
            bytes: Vec::new(),
            sample_rate,
            channels: 1,
            duration_seconds: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        "audio/wav"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    /// 0..=1
    pub confidence: f64,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl TranscriptResult {
    pub fn empty(window_seconds: f64) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            start_time: 0.0,
            end_time: window_seconds,
            language: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualBreakdown {
    pub sharpness: f64,
    pub exposure: f64,
    pub stability: f64,
    pub composition: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioBreakdown {
    pub audio_clarity: f64,
    pub engagement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualStageResult {
    pub score: f64,
    pub breakdown: VisualBreakdown,
    pub comments: Vec<String>,
    pub confidence: f64,
}

impl VisualStageResult {
    /// Substitute used when visual scoring fails
    pub fn fallback() -> Self {
        Self {
            score: 65.0,
            breakdown: VisualBreakdown {
                sharpness: 70.0,
                exposure: 65.0,
                stability: 60.0,
                composition: 65.0,
            },
            comments: vec![
                "Visual analysis failed".to_string(),
                "Using fallback scoring".to_string(),
                "Try again later".to_string(),
            ],
            confidence: 30.0,
        }
    }

    pub fn clamped(self) -> Self {
        Self {
            score: clamp_score(self.score),
            breakdown: VisualBreakdown {
                sharpness: clamp_score(self.breakdown.sharpness),
                exposure: clamp_score(self.breakdown.exposure),
                stability: clamp_score(self.breakdown.stability),
                composition: clamp_score(self.breakdown.composition),
            },
            comments: self.comments,
            confidence: clamp_score(self.confidence),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStageResult {
    pub score: f64,
    pub breakdown: AudioBreakdown,
    pub comments: Vec<String>,
    pub confidence: f64,
}

impl AudioStageResult {
    /// Substitute used when audio hook scoring fails
    pub fn fallback() -> Self {
        Self {
            score: 50.0,
            breakdown: AudioBreakdown {
                audio_clarity: 60.0,
                engagement: 40.0,
            },
            comments: vec![
                "Audio analysis failed".to_string(),
                "Using fallback scoring".to_string(),
                "Consider adding clear audio".to_string(),
            ],
            confidence: 25.0,
        }
    }

    pub fn clamped(self) -> Self {
        Self {
            score: clamp_score(self.score),
            breakdown: AudioBreakdown {
                audio_clarity: clamp_score(self.breakdown.audio_clarity),
                engagement: clamp_score(self.breakdown.engagement),
            },
            comments: self.comments,
            confidence: clamp_score(self.confidence),
        }
    }
}

/// Union of the visual and audio breakdowns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub sharpness: f64,
    pub exposure: f64,
    pub stability: f64,
    pub composition: f64,
    pub audio_clarity: f64,
    pub engagement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub overall_score: u8,
    pub breakdown: Breakdown,
    pub comments: Vec<String>,
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<TranscriptResult>,
    pub visual_score: f64,
    pub audio_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score_bounds() {
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(140.0), 100.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }

    #[test]
    fn test_round_score_half_up() {
        assert_eq!(round_score(76.5), 77);
        assert_eq!(round_score(76.49), 76);
        assert_eq!(round_score(120.0), 100);
    }

    #[test]
    fn test_stage_results_are_clamped() {
        let visual = VisualStageResult {
            score: 130.0,
            breakdown: VisualBreakdown { sharpness: -5.0, exposure: 50.0, stability: 101.0, composition: 0.0 },
            comments: vec![],
            confidence: 200.0,
        }
        .clamped();

        assert_eq!(visual.score, 100.0);
        assert_eq!(visual.breakdown.sharpness, 0.0);
        assert_eq!(visual.breakdown.stability, 100.0);
        assert_eq!(visual.confidence, 100.0);
    }

    #[test]
    fn test_data_url_len_matches_encoding() {
        for len in [0usize, 1, 2, 3, 4, 1000] {
            let frame = Frame { timestamp: 0.0, encoded_image: vec![7; len], width: 1, height: 1 };
            assert_eq!(frame.data_url_len(), frame.data_url().len());
        }
    }

    #[test]
    fn test_empty_clip_is_wav_typed() {
        let clip = AudioClip::empty(16_000);
        assert!(clip.is_empty());
        assert_eq!(clip.channels, 1);
        assert_eq!(clip.mime_type(), "audio/wav");
    }
}
