use serde::Deserialize;

use super::VideoMetadata;
use crate::error::{Result, HookError};

/// Subset of `ffprobe -print_format json` output that the pipeline reads
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    channels: Option<u32>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    tags: Option<ProbeTags>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Display rotation in degrees, from the display matrix or the legacy `rotate` tag
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse().ok())
            })
            .unwrap_or(0.0)
    }

    /// Whether ffmpeg's autorotation swaps the stored width and height
    fn is_quarter_turn(&self) -> bool {
        let turns = (self.rotation() / 90.0).round() as i64;
        turns.rem_euclid(2) == 1
    }
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse ffprobe JSON into [`VideoMetadata`].
///
/// Width and height are the displayed size, with rotation metadata applied.
/// A missing video stream, zero dimensions or an unknown duration make the
/// source unusable for sampling and are reported as fatal input errors.
pub fn parse_probe_output(json: &[u8]) -> Result<VideoMetadata> {
    let probe: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| HookError::FatalInput(format!("Unreadable video metadata: {}", e)))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| HookError::FatalInput("No video stream found".to_string()))?;

    let (mut width, mut height) = (video.width.unwrap_or(0), video.height.unwrap_or(0));
    if width == 0 || height == 0 {
        return Err(HookError::FatalInput(format!(
            "Invalid video dimensions {}x{}",
            width, height
        )));
    }
    // Frames are captured after autorotation, so report the displayed size
    if video.is_quarter_turn() {
        std::mem::swap(&mut width, &mut height);
    }

    let duration_seconds = probe
        .format
        .as_ref()
        .and_then(|f| parse_seconds(f.duration.as_deref()))
        .or_else(|| parse_seconds(video.duration.as_deref()))
        .ok_or_else(|| HookError::FatalInput("Video duration unknown".to_string()))?;

    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio") && s.channels.unwrap_or(1) > 0);

    Ok(VideoMetadata {
        duration_seconds,
        width,
        height,
        has_audio,
    })
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::scaled_size;

    #[test]
    fn test_parse_video_with_audio() {
        let json = br#"{
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1080, "height": 1920, "duration": "14.966667"},
                {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2, "sample_rate": "44100"}
            ],
            "format": {"duration": "15.000000", "format_name": "mov,mp4,m4a,3gp,3g2,mj2"}
        }"#;

        let meta = parse_probe_output(json).unwrap();
        assert_eq!(meta.width, 1080);
        assert_eq!(meta.height, 1920);
        assert_eq!(meta.duration_seconds, 15.0);
        assert!(meta.has_audio);
    }

    #[test]
    fn test_rotated_phone_clip_reports_portrait_size() {
        let json = br#"{
            "streams": [{
                "codec_type": "video", "width": 1920, "height": 1080,
                "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]
            }],
            "format": {"duration": "8.0"}
        }"#;

        let meta = parse_probe_output(json).unwrap();
        assert_eq!((meta.width, meta.height), (1080, 1920));

        let (w, h) = scaled_size(&meta, 400);
        assert_eq!(w, 400);
        assert!(h > w, "{}x{}", w, h);
    }

    #[test]
    fn test_legacy_rotate_tag() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 1280, "height": 720, "tags": {"rotate": "270"}}],
            "format": {"duration": "4.0"}
        }"#;
        let meta = parse_probe_output(json).unwrap();
        assert_eq!((meta.width, meta.height), (720, 1280));

        let upside_down = br#"{
            "streams": [{"codec_type": "video", "width": 1280, "height": 720, "side_data_list": [{"rotation": 180}]}],
            "format": {"duration": "4.0"}
        }"#;
        let meta = parse_probe_output(upside_down).unwrap();
        assert_eq!((meta.width, meta.height), (1280, 720));
    }

    #[test]
    fn test_stream_duration_used_when_format_lacks_it() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360, "duration": "2.5"}],
            "format": {}
        }"#;

        let meta = parse_probe_output(json).unwrap();
        assert_eq!(meta.duration_seconds, 2.5);
        assert!(!meta.has_audio);
    }

    #[test]
    fn test_missing_video_stream_is_fatal() {
        let json = br#"{"streams": [{"codec_type": "audio", "channels": 2}], "format": {"duration": "3.0"}}"#;
        let err = parse_probe_output(json).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unknown_duration_is_fatal() {
        let json = br#"{"streams": [{"codec_type": "video", "width": 640, "height": 360}], "format": {"duration": "N/A"}}"#;
        assert!(parse_probe_output(json).unwrap_err().is_fatal());
    }

    #[test]
    fn test_garbage_is_fatal() {
        assert!(parse_probe_output(b"not json").unwrap_err().is_fatal());
    }
}
