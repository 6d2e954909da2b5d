// Remote hook scoring
//
// Two independent services score the opening window:
// - Visual: sampled frames -> sharpness/exposure/stability/composition
// - Audio: transcript text -> audio_clarity/engagement
//
// Both reply with the same envelope. A reply can carry a service-side
// fallback object, which is used as-is instead of the local constants.

pub mod audio;
pub mod visual;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use audio::{AudioHookWire, HttpAudioScorer};
pub use visual::{build_visual_payload, HttpVisualScorer, VisualHookRequest, VisualHookWire};

use crate::config::ServicesConfig;
use crate::error::{HookError, Result};
use crate::remote::ServiceClient;
use crate::types::{AudioStageResult, Frame, VisualStageResult};

/// Reply envelope shared by the scoring services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    pub fallback: Option<T>,
}

/// What a scorer produced
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome<T> {
    Scored(T),
    /// The service failed but supplied its own substitute
    ServiceFallback { result: T, reason: String },
}

impl<T> ScoreOutcome<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ScoreOutcome<U> {
        match self {
            ScoreOutcome::Scored(value) => ScoreOutcome::Scored(f(value)),
            ScoreOutcome::ServiceFallback { result, reason } => ScoreOutcome::ServiceFallback {
                result: f(result),
                reason,
            },
        }
    }
}

/// Read an envelope: data on success, else the embedded fallback, else an error
pub fn interpret<T>(envelope: ScoreEnvelope<T>, service: &str) -> Result<ScoreOutcome<T>> {
    if envelope.success && envelope.error.is_none() {
        if let Some(data) = envelope.data {
            return Ok(ScoreOutcome::Scored(data));
        }
    }

    let reason = envelope
        .error
        .unwrap_or_else(|| format!("{} API request failed", service));

    match envelope.fallback {
        Some(result) => Ok(ScoreOutcome::ServiceFallback { result, reason }),
        None => Err(HookError::Remote(reason)),
    }
}

#[async_trait]
pub trait VisualHookScorer: Send + Sync {
    async fn score(&self, frames: &[Arc<Frame>]) -> Result<ScoreOutcome<VisualStageResult>>;
}

#[async_trait]
pub trait AudioHookScorer: Send + Sync {
    async fn score(&self, transcript: &str) -> Result<ScoreOutcome<AudioStageResult>>;
}

/// Factory for the HTTP scoring clients
pub struct ScorerFactory;

impl ScorerFactory {
    pub fn create_visual(config: &ServicesConfig, client: ServiceClient) -> Arc<dyn VisualHookScorer> {
        Arc::new(HttpVisualScorer::new(config, client))
    }

    pub fn create_audio(config: &ServicesConfig, client: ServiceClient) -> Arc<dyn AudioHookScorer> {
        Arc::new(HttpAudioScorer::new(config, client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> ScoreEnvelope<u32> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_success_returns_data() {
        let outcome = interpret(envelope(r#"{"success":true,"data":7}"#), "Visual hook").unwrap();
        assert_eq!(outcome, ScoreOutcome::Scored(7));
    }

    #[test]
    fn test_failure_with_fallback_uses_it() {
        let outcome = interpret(
            envelope(r#"{"success":false,"error":"model timeout","fallback":3}"#),
            "Visual hook",
        )
        .unwrap();
        assert_eq!(
            outcome,
            ScoreOutcome::ServiceFallback { result: 3, reason: "model timeout".to_string() }
        );
    }

    #[test]
    fn test_error_field_overrides_success_flag() {
        let outcome = interpret(envelope(r#"{"success":true,"data":7,"error":"partial","fallback":1}"#), "Audio hook");
        assert!(matches!(outcome, Ok(ScoreOutcome::ServiceFallback { result: 1, .. })));
    }

    #[test]
    fn test_failure_without_fallback_is_an_error() {
        let err = interpret(envelope(r#"{"success":false}"#), "Audio hook").unwrap_err();
        assert!(err.to_string().contains("Audio hook API request failed"));

        let err = interpret(envelope(r#"{"success":false,"error":"quota exceeded"}"#), "Audio hook").unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_success_without_data_is_an_error() {
        assert!(interpret(envelope(r#"{"success":true}"#), "Visual hook").is_err());
    }
}
