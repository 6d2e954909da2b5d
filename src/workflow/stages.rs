//! Stage functions. Each returns the stage output or a [`FallbackUsed`];
//! the orchestrator decides what to substitute.

use std::sync::Arc;
use tracing::{info, warn};

use crate::audio::{AudioExtractor, ClipOrigin};
use crate::media::VideoSource;
use crate::scoring::{AudioHookScorer, ScoreOutcome, VisualHookScorer};
use crate::transcribe::TranscriptionService;
use crate::types::{AudioClip, AudioStageResult, Frame, TranscriptResult, VisualStageResult};

/// A stage did not produce a real result
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackUsed<T> {
    pub reason: String,
    /// Replacement supplied by the failing collaborator itself
    pub substitute: Option<T>,
}

impl<T> FallbackUsed<T> {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
            substitute: None,
        }
    }

    pub fn with_substitute<S: Into<String>>(reason: S, substitute: T) -> Self {
        Self {
            reason: reason.into(),
            substitute: Some(substitute),
        }
    }
}

pub type StageOutput<T> = std::result::Result<T, FallbackUsed<T>>;

/// Resolved value of a stage and whether it is a substitute
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    pub fell_back: bool,
}

/// Take the real output, else the collaborator's substitute, else `default`
pub fn resolve<T, F: FnOnce() -> T>(stage: &str, output: StageOutput<T>, default: F) -> Resolved<T> {
    match output {
        Ok(value) => Resolved { value, fell_back: false },
        Err(FallbackUsed { reason, substitute }) => {
            warn!("{} failed, using fallback: {}", stage, reason);
            Resolved {
                value: substitute.unwrap_or_else(default),
                fell_back: true,
            }
        }
    }
}

fn from_outcome<T>(outcome: crate::error::Result<ScoreOutcome<T>>) -> StageOutput<T> {
    match outcome {
        Ok(ScoreOutcome::Scored(result)) => Ok(result),
        Ok(ScoreOutcome::ServiceFallback { result, reason }) => Err(FallbackUsed::with_substitute(reason, result)),
        Err(e) => Err(FallbackUsed::new(e.to_string())),
    }
}

pub async fn score_visual(scorer: &dyn VisualHookScorer, frames: &[Arc<Frame>]) -> StageOutput<VisualStageResult> {
    from_outcome(scorer.score(frames).await)
}

/// An empty clip because both backends failed is a fallback; a silent video is not
pub async fn extract_audio(extractor: &AudioExtractor, source: &VideoSource) -> StageOutput<AudioClip> {
    let extraction = extractor.extract(source).await;
    match extraction.origin {
        ClipOrigin::Empty => Err(FallbackUsed::with_substitute(
            extraction.failure.unwrap_or_else(|| "audio extraction failed".to_string()),
            extraction.clip,
        )),
        _ => Ok(extraction.clip),
    }
}

/// Empty clips are not sent; they transcribe to empty text
pub async fn transcribe(
    service: &dyn TranscriptionService,
    clip: &AudioClip,
    window_seconds: f64,
) -> StageOutput<TranscriptResult> {
    if clip.is_empty() {
        info!("Empty audio clip, skipping transcription");
        return Ok(TranscriptResult::empty(window_seconds));
    }

    service
        .transcribe(clip)
        .await
        .map_err(|e| FallbackUsed::with_substitute(e.to_string(), TranscriptResult::empty(window_seconds)))
}

pub async fn score_audio(scorer: &dyn AudioHookScorer, transcript: &str) -> StageOutput<AudioStageResult> {
    from_outcome(scorer.score(transcript).await)
}
