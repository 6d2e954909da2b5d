use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{interpret, AudioHookScorer, ScoreEnvelope, ScoreOutcome};
use crate::config::ServicesConfig;
use crate::error::Result;
use crate::remote::ServiceClient;
use crate::types::{AudioBreakdown, AudioStageResult};

#[derive(Debug, Clone, Serialize)]
struct AudioHookRequest<'a> {
    transcription: &'a str,
    analysis_type: &'static str,
}

/// Audio scorer reply body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioHookWire {
    pub audio_hook_score: f64,
    pub audio_breakdown: AudioBreakdown,
    #[serde(default)]
    pub audio_comments: Vec<String>,
    pub confidence: f64,
}

impl From<AudioHookWire> for AudioStageResult {
    fn from(wire: AudioHookWire) -> Self {
        AudioStageResult {
            score: wire.audio_hook_score,
            breakdown: wire.audio_breakdown,
            comments: wire.audio_comments,
            confidence: wire.confidence,
        }
        .clamped()
    }
}

pub struct HttpAudioScorer {
    client: ServiceClient,
    url: String,
}

impl HttpAudioScorer {
    pub fn new(config: &ServicesConfig, client: ServiceClient) -> Self {
        Self {
            client,
            url: config.audio_hook_url.clone(),
        }
    }
}

#[async_trait]
impl AudioHookScorer for HttpAudioScorer {
    async fn score(&self, transcript: &str) -> Result<ScoreOutcome<AudioStageResult>> {
        debug!("Scoring audio hook from {} chars of transcript", transcript.len());
        let request = AudioHookRequest {
            transcription: transcript,
            analysis_type: "audio_hook",
        };
        let envelope: ScoreEnvelope<AudioHookWire> = self.client.post_json(&self.url, &request).await?;
        Ok(interpret(envelope, "Audio hook")?.map(AudioStageResult::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(AudioHookRequest {
            transcription: "Wait for it",
            analysis_type: "audio_hook",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"transcription": "Wait for it", "analysis_type": "audio_hook"}));
    }

    #[test]
    fn test_service_fallback_is_read_from_envelope() {
        let envelope: ScoreEnvelope<AudioHookWire> = serde_json::from_str(
            r#"{
                "success": false,
                "error": "Rate limit reached",
                "fallback": {
                    "audio_hook_score": 45,
                    "audio_breakdown": {"audio_clarity": 55, "engagement": 35},
                    "audio_comments": ["Audio analysis unavailable"],
                    "confidence": 20
                }
            }"#,
        )
        .unwrap();

        match interpret(envelope, "Audio hook").unwrap().map(AudioStageResult::from) {
            ScoreOutcome::ServiceFallback { result, reason } => {
                assert_eq!(result.score, 45.0);
                assert_eq!(result.breakdown.engagement, 35.0);
                assert_eq!(reason, "Rate limit reached");
            }
            other => panic!("expected service fallback, got {:?}", other),
        }
    }
}
