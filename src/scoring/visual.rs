use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::{interpret, ScoreEnvelope, ScoreOutcome, VisualHookScorer};
use crate::config::ServicesConfig;
use crate::error::Result;
use crate::remote::ServiceClient;
use crate::types::{Frame, VisualBreakdown, VisualStageResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualHookRequest {
    /// JPEG data URLs in capture order
    pub frames: Vec<String>,
    pub analysis_type: String,
}

/// Visual scorer reply body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualHookWire {
    pub visual_hook_score: f64,
    pub visual_breakdown: VisualBreakdown,
    #[serde(default)]
    pub visual_comments: Vec<String>,
    pub confidence: f64,
}

impl From<VisualHookWire> for VisualStageResult {
    fn from(wire: VisualHookWire) -> Self {
        VisualStageResult {
            score: wire.visual_hook_score,
            breakdown: wire.visual_breakdown,
            comments: wire.visual_comments,
            confidence: wire.confidence,
        }
        .clamped()
    }
}

/// Build the visual request, keeping only the first `keep` frames when the
/// serialized body would exceed `hard_limit` bytes. Returns the request and
/// whether it was truncated.
pub fn build_visual_payload(frames: &[Arc<Frame>], hard_limit: usize, keep: usize) -> Result<(VisualHookRequest, bool)> {
    let mut request = VisualHookRequest {
        frames: frames.iter().map(|f| f.data_url()).collect(),
        analysis_type: "visual_hook".to_string(),
    };

    let size = serde_json::to_vec(&request)?.len();
    info!("Sending visual hook payload of size: {:.2}MB", size as f64 / 1024.0 / 1024.0);

    if size > hard_limit {
        warn!("Visual hook payload over {} bytes, keeping first {} frames", hard_limit, keep);
        request.frames.truncate(keep);
        return Ok((request, true));
    }

    Ok((request, false))
}

pub struct HttpVisualScorer {
    client: ServiceClient,
    url: String,
    hard_limit: usize,
    truncate_to: usize,
}

impl HttpVisualScorer {
    pub fn new(config: &ServicesConfig, client: ServiceClient) -> Self {
        Self {
            client,
            url: config.visual_hook_url.clone(),
            hard_limit: config.visual_payload_hard_limit,
            truncate_to: config.visual_truncate_frames,
        }
    }
}

#[async_trait]
impl VisualHookScorer for HttpVisualScorer {
    async fn score(&self, frames: &[Arc<Frame>]) -> Result<ScoreOutcome<VisualStageResult>> {
        let (request, _) = build_visual_payload(frames, self.hard_limit, self.truncate_to)?;
        let envelope: ScoreEnvelope<VisualHookWire> = self.client.post_json(&self.url, &request).await?;
        Ok(interpret(envelope, "Visual hook")?.map(VisualStageResult::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(count: usize, bytes: usize) -> Vec<Arc<Frame>> {
        (0..count)
            .map(|i| {
                Arc::new(Frame {
                    timestamp: i as f64 / 12.0,
                    encoded_image: vec![0xAB; bytes],
                    width: 400,
                    height: 712,
                })
            })
            .collect()
    }

    #[test]
    fn test_small_payload_is_sent_whole() {
        let (request, truncated) = build_visual_payload(&frames(12, 1_000), 4_000_000, 3).unwrap();
        assert!(!truncated);
        assert_eq!(request.frames.len(), 12);
        assert_eq!(request.analysis_type, "visual_hook");
        assert!(request.frames[0].starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_oversized_payload_keeps_first_frames() {
        let input = frames(12, 400_000);
        let (request, truncated) = build_visual_payload(&input, 4_000_000, 3).unwrap();
        assert!(truncated);
        assert_eq!(request.frames, input[..3].iter().map(|f| f.data_url()).collect::<Vec<_>>());
    }

    #[test]
    fn test_wire_reply_is_clamped() {
        let wire: VisualHookWire = serde_json::from_str(
            r#"{
                "visual_hook_score": 120,
                "visual_breakdown": {"sharpness": 90, "exposure": -4, "stability": 70, "composition": 65},
                "visual_comments": ["Strong opening shot"],
                "confidence": 85
            }"#,
        )
        .unwrap();

        let result = VisualStageResult::from(wire);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.breakdown.exposure, 0.0);
        assert_eq!(result.comments, vec!["Strong opening shot".to_string()]);
    }
}
