use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, HookError};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Only report errors on stderr
    pub fn quiet(self) -> Self {
        self.arg("-v").arg("error")
    }

    /// Seek to a position (seconds) before the following input
    pub fn seek(self, seconds: f64) -> Self {
        self.arg("-ss").arg(format!("{:.3}", seconds))
    }

    /// Limit output duration (seconds)
    pub fn duration(self, seconds: f64) -> Self {
        self.arg("-t").arg(format!("{:.3}", seconds))
    }

    /// Stop after this many video frames
    pub fn video_frames(self, count: u32) -> Self {
        self.arg("-frames:v").arg(count.to_string())
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Fixed encoder quality scale
    pub fn quality_scale(self, qscale: u8) -> Self {
        self.arg("-q:v").arg(qscale.to_string())
    }

    /// Force output container format
    pub fn format<S: Into<String>>(self, format: S) -> Self {
        self.arg("-f").arg(format)
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Write output to stdout
    pub fn to_stdout(self) -> Self {
        self.arg("pipe:1")
    }

    /// Execute the command, discarding stdout
    pub async fn execute(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }

    /// Execute the command and return what it wrote to stdout
    pub async fn execute_capture(&self) -> Result<Vec<u8>> {
        self.run().await
    }

    async fn run(&self) -> Result<Vec<u8>> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| HookError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HookError::Media(format!(
                "{} failed: {}",
                self.description,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

/// Builder for the ffmpeg/ffprobe invocations the pipeline needs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Build container/stream metadata probe (JSON on stdout)
    pub fn probe<P: AsRef<Path>>(&self, video_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Metadata probe")
            .quiet()
            .args(["-print_format", "json", "-show_format", "-show_streams"])
            .output(video_path)
    }

    /// Build single-frame JPEG capture at `time` (JPEG on stdout)
    pub fn capture_frame<P: AsRef<Path>>(
        &self,
        video_path: P,
        time: f64,
        width: u32,
        height: u32,
        qscale: u8,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, format!("Frame capture at {:.3}s", time))
            .quiet()
            .seek(time)
            .input(video_path)
            .video_frames(1)
            .video_filter(format!("scale={}:{}", width, height))
            .quality_scale(qscale)
            .format("image2pipe")
            .video_codec("mjpeg")
            .to_stdout()
    }

    /// Build trimmed 16-bit mono WAV extraction
    pub fn extract_audio<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
        window_seconds: f64,
        sample_rate: u32,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio extraction")
            .quiet()
            .input(video_path)
            .duration(window_seconds)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Version check")
            .arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> MediaCommandBuilder {
        MediaCommandBuilder::new("ffmpeg", "ffprobe")
    }

    #[test]
    fn test_capture_frame_arguments() {
        let cmd = builder().capture_frame("/tmp/in.mp4", 0.25, 400, 712, 17);
        assert_eq!(cmd.binary_path, "ffmpeg");
        assert_eq!(
            cmd.args,
            vec![
                "-v", "error", "-ss", "0.250", "-i", "/tmp/in.mp4", "-frames:v", "1",
                "-vf", "scale=400:712", "-q:v", "17", "-f", "image2pipe", "-c:v", "mjpeg", "pipe:1",
            ]
        );
    }

    #[test]
    fn test_extract_audio_arguments() {
        let cmd = builder().extract_audio("in.mp4", "out.wav", 3.0, 16000);
        assert_eq!(
            cmd.args,
            vec![
                "-v", "error", "-i", "in.mp4", "-t", "3.000", "-vn", "-c:a", "pcm_s16le",
                "-ar", "16000", "-ac", "1", "-y", "out.wav",
            ]
        );
    }

    #[test]
    fn test_probe_uses_ffprobe() {
        let cmd = builder().probe("clip.mov");
        assert_eq!(cmd.binary_path, "ffprobe");
        assert_eq!(cmd.args[..2], ["-v", "error"]);
        assert_eq!(cmd.args.last().map(String::as_str), Some("clip.mov"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_media_error() {
        let cmd = MediaCommand::new("/nonexistent/ffmpeg-binary", "Version check").arg("-version");
        let err = cmd.execute().await.unwrap_err();
        assert!(matches!(err, HookError::Media(_)));
    }
}
