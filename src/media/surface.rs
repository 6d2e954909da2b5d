use async_trait::async_trait;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::{debug, info};

use super::{parse_probe_output, DecodeSurface, FrameDecoder, MediaCommandBuilder, VideoMetadata, VideoSource};
use crate::config::MediaConfig;
use crate::error::{Result, HookError};

/// Map a JPEG quality percentage onto ffmpeg's mjpeg quality scale (2 best, 31 worst)
pub fn jpeg_qscale(quality_percent: u8) -> u8 {
    let quality = quality_percent.clamp(1, 100) as u32;
    (2 + ((100 - quality) * 29 + 49) / 99) as u8
}

/// Frame decoder that stages the source in a private temp dir and drives ffmpeg
pub struct FfmpegFrameDecoder {
    builder: MediaCommandBuilder,
}

impl FfmpegFrameDecoder {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            builder: MediaCommandBuilder::new(config.ffmpeg_path, config.ffprobe_path),
        }
    }
}

#[async_trait]
impl FrameDecoder for FfmpegFrameDecoder {
    async fn open(&self, source: &VideoSource) -> Result<Box<dyn DecodeSurface>> {
        let dir = tempfile::Builder::new()
            .prefix("hookscore-frames-")
            .tempdir()
            .map_err(|e| HookError::Media(format!("Failed to create decode directory: {}", e)))?;

        let video_path = dir.path().join(format!("source.{}", source.extension()));
        tokio::fs::write(&video_path, source.bytes()).await?;

        let probe = self.builder.probe(&video_path).execute_capture().await?;
        let metadata = parse_probe_output(&probe)?;

        info!(
            "Opened {} ({}x{}, {:.2}s, audio: {})",
            source.name(),
            metadata.width,
            metadata.height,
            metadata.duration_seconds,
            metadata.has_audio
        );

        Ok(Box::new(FfmpegSurface {
            builder: self.builder.clone(),
            video_path,
            metadata,
            _dir: dir,
        }))
    }
}

/// Staged copy of the source; the temp dir is removed when the surface drops
struct FfmpegSurface {
    builder: MediaCommandBuilder,
    video_path: PathBuf,
    metadata: VideoMetadata,
    _dir: TempDir,
}

#[async_trait]
impl DecodeSurface for FfmpegSurface {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    async fn capture(&mut self, time: f64, width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
        let image = self
            .builder
            .capture_frame(&self.video_path, time, width, height, jpeg_qscale(quality))
            .execute_capture()
            .await?;

        if image.is_empty() {
            return Err(HookError::Media(format!("No frame decoded at {:.3}s", time)));
        }

        debug!("Captured frame at {:.3}s ({} bytes)", time, image.len());
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_qscale_mapping() {
        assert_eq!(jpeg_qscale(100), 2);
        assert_eq!(jpeg_qscale(1), 31);
        assert_eq!(jpeg_qscale(50), 17);
        assert_eq!(jpeg_qscale(0), 31);
    }

    #[tokio::test]
    async fn test_missing_ffprobe_fails_to_open() {
        let decoder = FfmpegFrameDecoder::new(MediaConfig {
            ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
            ffprobe_path: "/nonexistent/ffprobe".to_string(),
        });
        let source = VideoSource::new("clip.mp4", "video/mp4", vec![0; 64]).unwrap();

        assert!(decoder.open(&source).await.is_err());
    }

    /// Fails like ffprobe on a corrupt file, printing only when not silenced
    #[cfg(unix)]
    fn corrupt_input_ffprobe(dir: &std::path::Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("ffprobe");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             for arg in \"$@\"; do [ \"$arg\" = quiet ] && exit 1; done\n\
             echo \"source.mp4: Invalid data found when processing input\" >&2\n\
             exit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_failure_keeps_ffprobe_message() {
        let dir = TempDir::new().unwrap();
        let decoder = FfmpegFrameDecoder::new(MediaConfig {
            ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
            ffprobe_path: corrupt_input_ffprobe(dir.path()).to_string_lossy().to_string(),
        });
        let source = VideoSource::new("clip.mp4", "video/mp4", vec![0; 64]).unwrap();

        let err = match decoder.open(&source).await {
            Ok(_) => panic!("corrupt input should not open"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("Invalid data found when processing input"), "{}", err);
    }
}
