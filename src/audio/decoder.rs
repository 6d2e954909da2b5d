//! Fallback audio backend: decode in memory, trim, downmix, resample, encode.

use async_trait::async_trait;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::io::Cursor;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use super::wav::encode_wav;
use super::AudioBackend;
use crate::error::{HookError, Result};
use crate::media::VideoSource;
use crate::types::AudioClip;

/// Interleaved PCM decoded from the start of the audio track
#[derive(Debug)]
struct DecodedPcm {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioBackend for SymphoniaDecoder {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    async fn extract(&self, source: &VideoSource, window_seconds: f64, target_rate: u32) -> Result<AudioClip> {
        let bytes = source.shared_bytes();
        let extension = source.extension().to_string();

        tokio::task::spawn_blocking(move || extract_blocking(bytes, &extension, window_seconds, target_rate))
            .await
            .map_err(|e| HookError::Task(format!("Audio decode task failed: {}", e)))?
    }
}

fn extract_blocking(bytes: Arc<[u8]>, extension: &str, window_seconds: f64, target_rate: u32) -> Result<AudioClip> {
    let decoded = decode_window(bytes, extension, window_seconds)?;

    let frames = decoded.samples.len() / decoded.channels;
    let window_frames = (window_seconds * decoded.sample_rate as f64).floor() as usize;
    let length = frames.min(window_frames);
    if length == 0 {
        return Err(HookError::Audio("Invalid audio duration".to_string()));
    }

    let mono = downmix(&decoded.samples[..length * decoded.channels], decoded.channels);
    let output_rate = decoded.sample_rate.min(target_rate);
    let mono = resample(mono, decoded.sample_rate, output_rate)?;

    debug!(
        "Decoded audio in memory: {} channels at {}Hz -> {} mono samples at {}Hz",
        decoded.channels,
        decoded.sample_rate,
        mono.len(),
        output_rate
    );

    Ok(AudioClip {
        duration_seconds: (mono.len() as f64 / output_rate as f64).min(window_seconds),
        bytes: encode_wav(&mono, output_rate, 1),
        sample_rate: output_rate,
        channels: 1,
    })
}

/// Decode packets from the first audio track until the window is covered
fn decode_window(bytes: Arc<[u8]>, extension: &str, window_seconds: f64) -> Result<DecodedPcm> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension);

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| HookError::Audio(format!("Failed to decode audio from video: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .ok_or(HookError::NoAudioTrack)?;

    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| HookError::Audio(format!("Unsupported audio codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(HookError::Audio(format!("Error reading packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(HookError::Audio(format!("Failed to decode packet: {}", e))),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count();

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());

        if channels > 0 && samples.len() / channels >= (window_seconds * sample_rate as f64).ceil() as usize {
            break;
        }
    }

    if channels == 0 {
        return Err(HookError::NoAudioTrack);
    }
    if sample_rate == 0 {
        return Err(HookError::Audio("Sample rate unknown".to_string()));
    }

    Ok(DecodedPcm {
        samples,
        sample_rate,
        channels,
    })
}

/// Average interleaved channels into one
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio; output is trimmed to `len * to / from` samples
fn resample(mono: Vec<f32>, from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to {
        return Ok(mono);
    }

    let target_len = (mono.len() as u64 * to as u64 / from as u64) as usize;
    let mut resampler = FastFixedIn::<f32>::new(
        to as f64 / from as f64,
        1.0,
        PolynomialDegree::Septic,
        mono.len(),
        1,
    )
    .map_err(|e| HookError::Audio(format!("Failed to create resampler: {}", e)))?;

    let mut output = resampler
        .process(&[mono], None)
        .map_err(|e| HookError::Audio(format!("Resampling failed: {}", e)))?;

    let mut channel = output.pop().unwrap_or_default();
    channel.truncate(target_len);
    Ok(channel)
}
