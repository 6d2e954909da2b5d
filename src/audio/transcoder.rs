use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use super::wav::read_wav_info;
use super::AudioBackend;
use crate::config::MediaConfig;
use crate::error::{HookError, Result};
use crate::media::{MediaCommandBuilder, VideoSource};
use crate::types::AudioClip;

/// ffmpeg stderr fragments meaning the input has nothing to extract
const NO_AUDIO_MARKERS: &[&str] = &[
    "does not contain any stream",
    "matches no streams",
    "Output file is empty",
];

/// Primary audio backend: one ffmpeg working area shared by every run.
///
/// The working area is created lazily on first use, after checking that
/// ffmpeg runs, and lives as long as the last handle. Calls are serialized
/// because they share fixed file names inside it.
pub struct FfmpegTranscoder {
    builder: MediaCommandBuilder,
    workspace: OnceCell<TempDir>,
    lock: Mutex<()>,
}

impl FfmpegTranscoder {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            builder: MediaCommandBuilder::new(config.ffmpeg_path, config.ffprobe_path),
            workspace: OnceCell::new(),
            lock: Mutex::new(()),
        }
    }

    /// Handle to share between orchestrators
    pub fn shared(config: MediaConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn is_initialized(&self) -> bool {
        self.workspace.initialized()
    }

    async fn workspace(&self) -> Result<&TempDir> {
        self.workspace
            .get_or_try_init(|| async {
                self.builder.version_check().execute().await?;
                let dir = tempfile::Builder::new()
                    .prefix("hookscore-transcoder-")
                    .tempdir()
                    .map_err(|e| HookError::Media(format!("Failed to create transcoder workspace: {}", e)))?;
                info!("Audio transcoder initialized in {}", dir.path().display());
                Ok::<TempDir, HookError>(dir)
            })
            .await
    }

    async fn transcode(&self, input: &Path, output: &Path, window_seconds: f64, target_rate: u32) -> Result<Vec<u8>> {
        self.builder
            .extract_audio(input, output, window_seconds, target_rate)
            .execute()
            .await
            .map_err(|e| match e {
                HookError::Media(message) if NO_AUDIO_MARKERS.iter().any(|m| message.contains(m)) => {
                    HookError::NoAudioTrack
                }
                other => other,
            })?;

        Ok(tokio::fs::read(output).await?)
    }
}

#[async_trait]
impl AudioBackend for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn extract(&self, source: &VideoSource, window_seconds: f64, target_rate: u32) -> Result<AudioClip> {
        let _guard = self.lock.lock().await;
        let workspace = self.workspace().await?;

        let input = workspace.path().join(format!("input.{}", source.extension()));
        let output = workspace.path().join("output.wav");

        tokio::fs::write(&input, source.bytes()).await?;
        let result = self.transcode(&input, &output, window_seconds, target_rate).await;

        for path in [&input, &output] {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!("Could not remove {}: {}", path.display(), e);
            }
        }

        let bytes = result?;
        let info = read_wav_info(&bytes)?;
        if info.data_len == 0 {
            return Err(HookError::Audio("ffmpeg produced no audio samples".to_string()));
        }

        debug!("ffmpeg-extracted audio: {} bytes, {}Hz", bytes.len(), info.sample_rate);

        Ok(AudioClip {
            duration_seconds: info.duration_seconds().min(window_seconds),
            sample_rate: info.sample_rate,
            channels: info.channels,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_ffmpeg() -> FfmpegTranscoder {
        FfmpegTranscoder::new(MediaConfig {
            ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
            ffprobe_path: "/nonexistent/ffprobe".to_string(),
        })
    }

    #[tokio::test]
    async fn test_failed_initialization_is_reported_and_retryable() {
        let transcoder = missing_ffmpeg();
        let source = VideoSource::new("clip.mp4", "video/mp4", vec![0; 16]).unwrap();

        let first = transcoder.extract(&source, 3.0, 16_000).await;
        assert!(matches!(first, Err(HookError::Media(_))));
        assert!(!transcoder.is_initialized());

        let second = transcoder.extract(&source, 3.0, 16_000).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_serialized_without_deadlock() {
        let transcoder = Arc::new(missing_ffmpeg());
        let source = VideoSource::new("clip.mp4", "video/mp4", vec![0; 16]).unwrap();

        let a = {
            let t = Arc::clone(&transcoder);
            let s = source.clone();
            tokio::spawn(async move { t.extract(&s, 3.0, 16_000).await.is_err() })
        };
        let b = {
            let t = Arc::clone(&transcoder);
            let s = source.clone();
            tokio::spawn(async move { t.extract(&s, 3.0, 16_000).await.is_err() })
        };

        assert!(a.await.unwrap());
        assert!(b.await.unwrap());
    }
}
