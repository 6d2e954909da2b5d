// Audio extraction for the analysis window
//
// Backends are tried in order and the first success wins:
// - Transcoder: shared ffmpeg process backend (trim, resample, downmix, WAV)
// - Decoder: in-memory symphonia decode, trim, downmix, rubato resample, WAV
// If both fail the result is an empty WAV clip, never an error.

pub mod decoder;
pub mod transcoder;
pub mod wav;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub use decoder::SymphoniaDecoder;
pub use transcoder::FfmpegTranscoder;

use crate::config::Config;
use crate::error::{HookError, Result};
use crate::media::VideoSource;
use crate::types::AudioClip;

/// One way of producing the trimmed mono WAV clip
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extract at most `window_seconds` of audio at `target_rate` Hz (or lower).
    /// Returns [`HookError::NoAudioTrack`] when the source has no audio.
    async fn extract(&self, source: &VideoSource, window_seconds: f64, target_rate: u32) -> Result<AudioClip>;
}

/// Which backend produced a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOrigin {
    Primary,
    Fallback,
    /// Neither backend succeeded; the clip is empty
    Empty,
    /// The source has no audio track; the clip is empty
    NoAudio,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub clip: AudioClip,
    pub origin: ClipOrigin,
    /// Last backend failure, when the clip is empty because of one
    pub failure: Option<String>,
}

pub struct AudioExtractor {
    primary: Arc<dyn AudioBackend>,
    fallback: Arc<dyn AudioBackend>,
    window_seconds: f64,
    target_rate: u32,
}

impl AudioExtractor {
    pub fn new(
        primary: Arc<dyn AudioBackend>,
        fallback: Arc<dyn AudioBackend>,
        window_seconds: f64,
        target_rate: u32,
    ) -> Self {
        Self {
            primary,
            fallback,
            window_seconds,
            target_rate,
        }
    }

    /// Default chain: the given shared transcoder, then in-memory decoding
    pub fn from_config(config: &Config, transcoder: Arc<FfmpegTranscoder>) -> Self {
        Self::new(
            transcoder,
            Arc::new(SymphoniaDecoder::new()),
            config.sampling.window_seconds,
            config.audio.target_sample_rate,
        )
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Run the fallback chain. Never fails.
    pub async fn extract(&self, source: &VideoSource) -> Extraction {
        let primary_error = match self.attempt(&*self.primary, source).await {
            Ok(clip) => return self.finish(clip, ClipOrigin::Primary),
            Err(HookError::NoAudioTrack) => return self.no_audio(self.primary.name()),
            Err(e) => {
                warn!("{} audio extraction failed, trying {}: {}", self.primary.name(), self.fallback.name(), e);
                e
            }
        };

        match self.attempt(&*self.fallback, source).await {
            Ok(clip) => self.finish(clip, ClipOrigin::Fallback),
            Err(HookError::NoAudioTrack) => self.no_audio(self.fallback.name()),
            Err(e) => {
                warn!("All audio extraction methods failed: {}; {}", primary_error, e);
                Extraction {
                    clip: AudioClip::empty(self.target_rate),
                    origin: ClipOrigin::Empty,
                    failure: Some(e.to_string()),
                }
            }
        }
    }

    async fn attempt(&self, backend: &dyn AudioBackend, source: &VideoSource) -> Result<AudioClip> {
        backend.extract(source, self.window_seconds, self.target_rate).await
    }

    fn finish(&self, mut clip: AudioClip, origin: ClipOrigin) -> Extraction {
        clip.duration_seconds = clip.duration_seconds.min(self.window_seconds);
        info!(
            "Extracted audio via {:?} backend: {} bytes, {}Hz, {:.2}s",
            origin,
            clip.bytes.len(),
            clip.sample_rate,
            clip.duration_seconds
        );
        Extraction { clip, origin, failure: None }
    }

    fn no_audio(&self, backend: &str) -> Extraction {
        info!("{} reports no audio track; continuing with an empty clip", backend);
        Extraction {
            clip: AudioClip::empty(self.target_rate),
            origin: ClipOrigin::NoAudio,
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::encode_wav;

    fn source() -> VideoSource {
        VideoSource::new("clip.mp4", "video/mp4", vec![0; 16]).unwrap()
    }

    fn clip(seconds: f64) -> AudioClip {
        let samples = vec![0.0f32; (seconds * 16_000.0) as usize];
        AudioClip {
            bytes: encode_wav(&samples, 16_000, 1),
            sample_rate: 16_000,
            channels: 1,
            duration_seconds: seconds,
        }
    }

    fn backend(name: &'static str) -> MockAudioBackend {
        let mut mock = MockAudioBackend::new();
        mock.expect_name().return_const(name);
        mock
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let mut primary = backend("ffmpeg");
        primary.expect_extract().times(1).returning(|_, _, _| Ok(clip(3.0)));
        let mut fallback = backend("symphonia");
        fallback.expect_extract().never();

        let extractor = AudioExtractor::new(Arc::new(primary), Arc::new(fallback), 3.0, 16_000);
        let result = extractor.extract(&source()).await;

        assert_eq!(result.origin, ClipOrigin::Primary);
        assert_eq!(result.clip.duration_seconds, 3.0);
    }

    #[tokio::test]
    async fn test_primary_failure_invokes_fallback_once() {
        let mut primary = backend("ffmpeg");
        primary
            .expect_extract()
            .times(1)
            .returning(|_, _, _| Err(HookError::Media("ffmpeg exited with 1".to_string())));
        let mut fallback = backend("symphonia");
        fallback.expect_extract().times(1).returning(|_, _, _| Ok(clip(2.0)));

        let extractor = AudioExtractor::new(Arc::new(primary), Arc::new(fallback), 3.0, 16_000);
        let result = extractor.extract(&source()).await;

        assert_eq!(result.origin, ClipOrigin::Fallback);
        assert!(!result.clip.is_empty());
    }

    #[tokio::test]
    async fn test_both_failing_yields_empty_clip() {
        let mut primary = backend("ffmpeg");
        primary
            .expect_extract()
            .times(1)
            .returning(|_, _, _| Err(HookError::Media("not loaded".to_string())));
        let mut fallback = backend("symphonia");
        fallback
            .expect_extract()
            .times(1)
            .returning(|_, _, _| Err(HookError::Audio("unsupported codec".to_string())));

        let extractor = AudioExtractor::new(Arc::new(primary), Arc::new(fallback), 3.0, 16_000);
        let result = extractor.extract(&source()).await;

        assert_eq!(result.origin, ClipOrigin::Empty);
        assert!(result.clip.is_empty());
        assert_eq!(result.clip.sample_rate, 16_000);
        assert!(result.failure.unwrap().contains("unsupported codec"));
    }

    #[tokio::test]
    async fn test_missing_audio_track_skips_fallback() {
        let mut primary = backend("ffmpeg");
        primary.expect_extract().times(1).returning(|_, _, _| Err(HookError::NoAudioTrack));
        let mut fallback = backend("symphonia");
        fallback.expect_extract().never();

        let extractor = AudioExtractor::new(Arc::new(primary), Arc::new(fallback), 3.0, 16_000);
        let result = extractor.extract(&source()).await;

        assert_eq!(result.origin, ClipOrigin::NoAudio);
        assert!(result.clip.is_empty());
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn test_clip_duration_is_capped_to_window() {
        let mut primary = backend("ffmpeg");
        primary.expect_extract().returning(|_, _, _| Ok(clip(3.2)));
        let fallback = backend("symphonia");

        let extractor = AudioExtractor::new(Arc::new(primary), Arc::new(fallback), 3.0, 16_000);
        assert_eq!(extractor.extract(&source()).await.clip.duration_seconds, 3.0);
    }
}
