use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{TranscriptionMapper, TranscriptionService};
use crate::config::ServicesConfig;
use crate::error::{HookError, Result};
use crate::remote::ServiceClient;
use crate::types::{AudioClip, TranscriptResult};

/// Confidence assumed when the service does not report one
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Reply of a Whisper-compatible transcription endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhisperApiOutput {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct WhisperApiMapper;

impl TranscriptionMapper<WhisperApiOutput> for WhisperApiMapper {
    fn to_transcript(output: WhisperApiOutput, clip: &AudioClip) -> TranscriptResult {
        let confidence = match output.confidence {
            Some(c) if c.is_finite() && c > 0.0 => c.min(1.0),
            _ => DEFAULT_CONFIDENCE,
        };

        TranscriptResult {
            text: output.text.unwrap_or_default().trim().to_string(),
            confidence,
            start_time: 0.0,
            end_time: clip.duration_seconds,
            language: output.language,
        }
    }
}

pub struct WhisperApiTranscriber {
    client: ServiceClient,
    url: String,
    model: String,
    language: Option<String>,
}

impl WhisperApiTranscriber {
    pub fn new(config: &ServicesConfig, client: ServiceClient) -> Self {
        Self {
            client,
            url: config.transcribe_url.clone(),
            model: config.transcription_model.clone(),
            language: config.transcription_language.clone(),
        }
    }

    fn build_form(&self, clip: &AudioClip) -> Result<Form> {
        let file = Part::bytes(clip.bytes.clone())
            .file_name("audio.wav")
            .mime_str(clip.mime_type())
            .map_err(|e| HookError::Remote(format!("Invalid audio part: {}", e)))?;

        let mut form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        Ok(form)
    }
}

#[async_trait]
impl TranscriptionService for WhisperApiTranscriber {
    async fn transcribe(&self, clip: &AudioClip) -> Result<TranscriptResult> {
        info!("Transcribing {} bytes of audio ({:.2}s)", clip.bytes.len(), clip.duration_seconds);

        let output: WhisperApiOutput = self.client.post_multipart(&self.url, self.build_form(clip)?).await?;

        if let Some(error) = &output.error {
            warn!("Transcription service reported an error: {}", error);
        }

        let transcript = WhisperApiMapper::to_transcript(output, clip);
        debug!(
            "Transcription result: \"{}\" (confidence: {:.2})",
            transcript.text, transcript.confidence
        );
        Ok(transcript)
    }
}
