// Media access for the pipeline
//
// - VideoSource: immutable in-memory handle to the uploaded video
// - FrameDecoder / DecodeSurface: scoped frame decoding, released on drop
// - Commands: ffmpeg/ffprobe command builders
// - Probe: container metadata parsing
// - Surface: ffmpeg-backed decoder implementation

pub mod commands;
pub mod probe;
pub mod surface;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use commands::*;
pub use probe::*;
pub use surface::*;

use crate::config::MediaConfig;
use crate::error::{Result, HookError};

/// Immutable handle to the video under analysis
#[derive(Debug, Clone)]
pub struct VideoSource {
    name: String,
    media_type: String,
    bytes: Arc<[u8]>,
}

impl VideoSource {
    /// Wrap bytes with a declared media type; anything but `video/*` is rejected
    pub fn new<S1: Into<String>, S2: Into<String>>(name: S1, media_type: S2, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let media_type = media_type.into();

        if !media_type.starts_with("video/") {
            return Err(HookError::FatalInput(format!(
                "{} is not a video (media type {})",
                name, media_type
            )));
        }
        if bytes.is_empty() {
            return Err(HookError::FatalInput(format!("{} is empty", name)));
        }

        Ok(Self {
            name,
            media_type,
            bytes: Arc::from(bytes),
        })
    }

    /// Wrap bytes, sniffing the media type from their content
    pub fn from_bytes<S: Into<String>>(name: S, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let media_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .ok_or_else(|| HookError::FatalInput(format!("Unrecognised file format: {}", name)))?;

        Self::new(name, media_type, bytes)
    }

    /// Read a video file from disk
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| HookError::FatalInput(format!("Failed to read {}: {}", path.display(), e)))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Self::from_bytes(name, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the raw bytes
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension used when the bytes have to be staged on disk
    pub fn extension(&self) -> &str {
        match self.media_type.as_str() {
            "video/mp4" => "mp4",
            "video/quicktime" => "mov",
            "video/webm" => "webm",
            "video/x-matroska" => "mkv",
            "video/x-msvideo" => "avi",
            "video/x-m4v" => "m4v",
            _ => Path::new(&self.name)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin"),
        }
    }
}

/// Properties read from the container before sampling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

/// Opens decode surfaces over a video source
#[async_trait]
pub trait FrameDecoder: Send + Sync {
    /// Acquire a decode surface; fails if metadata cannot be read
    async fn open(&self, source: &VideoSource) -> Result<Box<dyn DecodeSurface>>;
}

/// A seekable decoder over one source. Resources are released on drop.
#[async_trait]
pub trait DecodeSurface: Send {
    fn metadata(&self) -> &VideoMetadata;

    /// Render the image at `time` scaled to `width`x`height` and JPEG-encode it
    async fn capture(&mut self, time: f64, width: u32, height: u32, quality: u8) -> Result<Vec<u8>>;
}

/// Factory for creating media backends
pub struct MediaFactory;

impl MediaFactory {
    /// Create the default frame decoder implementation (FFmpeg-based)
    pub fn create_decoder(config: MediaConfig) -> Arc<dyn FrameDecoder> {
        Arc::new(surface::FfmpegFrameDecoder::new(config))
    }
}
