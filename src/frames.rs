//! Frame sampling over the analysis window.
//!
//! Frames are captured at `i / frame_rate` for `i` in `0..planned`, scaled to a
//! capped width and JPEG-encoded. The serialized payload is tracked as frames
//! arrive; once it exceeds the budget sampling stops and the frames captured so
//! far are returned.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SamplingConfig;
use crate::error::{Result, HookError};
use crate::media::{FrameDecoder, VideoMetadata, VideoSource};
use crate::types::Frame;

#[derive(Debug, Clone)]
pub struct SamplingOptions {
    pub frame_rate: f64,
    pub max_frames: usize,
    pub window_seconds: f64,
    pub max_width: u32,
    pub jpeg_quality: u8,
    pub payload_budget_bytes: usize,
    pub payload_overhead_bytes: usize,
    pub budget_check_interval: usize,
}

impl From<&SamplingConfig> for SamplingOptions {
    fn from(config: &SamplingConfig) -> Self {
        Self {
            frame_rate: config.frame_rate,
            max_frames: config.max_frames,
            window_seconds: config.window_seconds,
            max_width: config.max_width,
            jpeg_quality: config.jpeg_quality,
            payload_budget_bytes: config.payload_budget_bytes,
            payload_overhead_bytes: config.payload_overhead_bytes,
            budget_check_interval: config.budget_check_interval.max(1),
        }
    }
}

impl SamplingOptions {
    /// `min(max_frames, ceil(min(duration, window) * frame_rate))`
    pub fn planned_frame_count(&self, duration_seconds: f64) -> usize {
        let window = duration_seconds.min(self.window_seconds).max(0.0);
        let wanted = (window * self.frame_rate).ceil() as usize;
        wanted.min(self.max_frames)
    }
}

/// Output size preserving aspect ratio, width capped, both sides even
pub fn scaled_size(metadata: &VideoMetadata, max_width: u32) -> (u32, u32) {
    let width = metadata.width.min(max_width).max(2) & !1;
    let height = (width as f64 * metadata.height as f64 / metadata.width as f64 / 2.0).round() as u32 * 2;
    (width, height.max(2))
}

/// Serialized size of a frame batch as sent to the visual scorer
pub fn estimate_payload_size(frames: &[Arc<Frame>], overhead: usize) -> usize {
    frames.iter().map(|f| f.data_url_len()).sum::<usize>() + overhead
}

/// Receives each frame as it is captured
#[async_trait]
pub trait SampleObserver: Send {
    async fn on_frame(&mut self, captured: &[Arc<Frame>], planned: usize);
}

#[async_trait]
impl SampleObserver for () {
    async fn on_frame(&mut self, _captured: &[Arc<Frame>], _planned: usize) {}
}

pub struct FrameSampler {
    decoder: Arc<dyn FrameDecoder>,
    options: SamplingOptions,
}

impl FrameSampler {
    pub fn new(decoder: Arc<dyn FrameDecoder>, options: SamplingOptions) -> Self {
        Self { decoder, options }
    }

    pub fn options(&self) -> &SamplingOptions {
        &self.options
    }

    /// Sample the opening window of `source`.
    ///
    /// Any metadata or decode failure is returned as [`HookError::FatalInput`]
    /// carrying the underlying message. The decode surface is dropped on every
    /// exit path.
    pub async fn sample(
        &self,
        source: &VideoSource,
        cancel: &CancellationToken,
        observer: &mut dyn SampleObserver,
    ) -> Result<Vec<Arc<Frame>>> {
        let mut surface = self
            .decoder
            .open(source)
            .await
            .map_err(|e| fatal("Failed to read video metadata", e))?;

        let metadata = *surface.metadata();
        let planned = self.options.planned_frame_count(metadata.duration_seconds);
        let (width, height) = scaled_size(&metadata, self.options.max_width);

        info!(
            "Sampling {} frames at {} fps from first {:.2}s ({}x{})",
            planned, self.options.frame_rate, self.options.window_seconds, width, height
        );

        let mut frames: Vec<Arc<Frame>> = Vec::with_capacity(planned);
        let mut payload = self.options.payload_overhead_bytes;

        for i in 0..planned {
            if cancel.is_cancelled() {
                return Err(HookError::Cancelled);
            }

            let time = i as f64 / self.options.frame_rate;
            if time >= self.options.window_seconds {
                break;
            }

            let image = tokio::select! {
                _ = cancel.cancelled() => return Err(HookError::Cancelled),
                image = surface.capture(time, width, height, self.options.jpeg_quality) => {
                    image.map_err(|e| fatal("Failed to decode frame", e))?
                }
            };

            let frame = Arc::new(Frame {
                timestamp: time,
                encoded_image: image,
                width,
                height,
            });
            payload += frame.data_url_len();
            frames.push(frame);

            observer.on_frame(&frames, planned).await;

            if frames.len() % self.options.budget_check_interval == 0
                && payload > self.options.payload_budget_bytes
            {
                warn!(
                    "Payload size approaching limit: {:.2}MB after {} frames, stopping frame extraction",
                    payload as f64 / 1024.0 / 1024.0,
                    frames.len()
                );
                break;
            }
        }

        if frames.is_empty() {
            return Err(HookError::FatalInput("No frames could be extracted from the video".to_string()));
        }

        debug!("Sampled {} frames, payload estimate {} bytes", frames.len(), payload);
        Ok(frames)
    }
}

fn fatal(context: &str, error: HookError) -> HookError {
    match error {
        HookError::FatalInput(_) | HookError::Cancelled => error,
        other => HookError::FatalInput(format!("{}: {}", context, other)),
    }
}
