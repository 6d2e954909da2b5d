use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, HookError};

/// Environment variable that overrides `services.api_key`
pub const API_KEY_ENV: &str = "HOOKSCORE_API_KEY";

fn default_budget_check_interval() -> usize {
    1
}

fn default_payload_overhead_bytes() -> usize {
    10_240
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub audio: AudioConfig,
    pub media: MediaConfig,
    pub services: ServicesConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Frames per second sampled inside the analysis window
    pub frame_rate: f64,
    /// Upper bound on captured frames
    pub max_frames: usize,
    /// Length of the analysed opening segment, in seconds
    pub window_seconds: f64,
    /// Captured frames are scaled down to at most this width
    pub max_width: u32,
    /// JPEG quality in percent (1-100)
    pub jpeg_quality: u8,
    /// Soft budget for the serialized frame payload
    pub payload_budget_bytes: usize,
    /// Fixed allowance for the JSON envelope around the frames
    #[serde(default = "default_payload_overhead_bytes")]
    pub payload_overhead_bytes: usize,
    /// Number of captured frames between budget checks
    #[serde(default = "default_budget_check_interval")]
    pub budget_check_interval: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate of the extracted clip
    pub target_sample_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Visual hook scoring endpoint
    pub visual_hook_url: String,
    /// Audio hook scoring endpoint
    pub audio_hook_url: String,
    /// Speech-to-text endpoint
    pub transcribe_url: String,
    /// Bearer token sent to every service
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Serialized visual requests above this size are truncated
    pub visual_payload_hard_limit: usize,
    /// Frames kept when the visual payload is truncated
    pub visual_truncate_frames: usize,
    /// Model name forwarded to the transcription service
    pub transcription_model: String,
    /// Spoken language hint for transcription
    pub transcription_language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding staged video blobs
    pub dir: PathBuf,
    /// Staged blobs older than this are swept
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Webhook receiving `{"text": ...}` run notifications
    pub webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig {
                frame_rate: 12.0,
                max_frames: 12,
                window_seconds: 3.0,
                max_width: 400,
                jpeg_quality: 50,
                payload_budget_bytes: 3_500_000,
                payload_overhead_bytes: default_payload_overhead_bytes(),
                budget_check_interval: default_budget_check_interval(),
            },
            audio: AudioConfig {
                target_sample_rate: 16_000,
            },
            media: MediaConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
            },
            services: ServicesConfig {
                visual_hook_url: "http://localhost:54321/functions/v1/analyze-visual-hook".to_string(),
                audio_hook_url: "http://localhost:54321/functions/v1/analyze-audio-hook".to_string(),
                transcribe_url: "http://localhost:54321/functions/v1/transcribe-audio".to_string(),
                api_key: None,
                timeout_secs: 120,
                visual_payload_hard_limit: 4_000_000,
                visual_truncate_frames: 3,
                transcription_model: "whisper-1".to_string(),
                transcription_language: Some("en".to_string()),
            },
            storage: StorageConfig {
                dir: PathBuf::from(".hookscore/staging"),
                ttl_secs: 60 * 60,
            },
            notify: NotifyConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HookError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| HookError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HookError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| HookError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply environment overrides on top of the loaded values
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.services.api_key = Some(key);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let sampling = &self.sampling;
        if !(sampling.frame_rate > 0.0) {
            return Err(HookError::Config("sampling.frame_rate must be positive".to_string()));
        }
        if !(sampling.window_seconds > 0.0) {
            return Err(HookError::Config("sampling.window_seconds must be positive".to_string()));
        }
        if sampling.max_frames == 0 {
            return Err(HookError::Config("sampling.max_frames must be at least 1".to_string()));
        }
        if sampling.max_width == 0 {
            return Err(HookError::Config("sampling.max_width must be at least 1".to_string()));
        }
        if !(1..=100).contains(&sampling.jpeg_quality) {
            return Err(HookError::Config("sampling.jpeg_quality must be within 1..=100".to_string()));
        }
        if sampling.budget_check_interval == 0 {
            return Err(HookError::Config("sampling.budget_check_interval must be at least 1".to_string()));
        }
        if self.audio.target_sample_rate == 0 {
            return Err(HookError::Config("audio.target_sample_rate must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hookscore.toml");

        let config = Config::default();
        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();

        assert_eq!(loaded.sampling.max_frames, 12);
        assert_eq!(loaded.sampling.payload_budget_bytes, 3_500_000);
        assert_eq!(loaded.audio.target_sample_rate, 16_000);
        assert_eq!(loaded.services.visual_payload_hard_limit, 4_000_000);
        assert_eq!(loaded.storage.ttl_secs, 3600);
        assert!(loaded.notify.webhook_url.is_none());
    }

    #[test]
    fn test_invalid_sampling_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hookscore.toml");

        let mut config = Config::default();
        config.sampling.frame_rate = 0.0;
        config.save_to_file(&path).unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, HookError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file("/nonexistent/hookscore.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
