// Speech-to-text for the extracted audio clip
//
// Services are reached through the TranscriptionService trait:
// - WhisperApi: multipart upload to a Whisper-compatible HTTP endpoint
//
// Each service parses its own wire format and maps it onto
// TranscriptResult through a TranscriptionMapper.

pub mod whisper_api;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ServicesConfig;
use crate::error::Result;
use crate::remote::ServiceClient;
use crate::types::{AudioClip, TranscriptResult};

pub use whisper_api::{WhisperApiOutput, WhisperApiTranscriber};

/// Turns an audio clip into text
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip) -> Result<TranscriptResult>;
}

/// Converts a service-specific reply into a [`TranscriptResult`]
pub trait TranscriptionMapper<T> {
    fn to_transcript(output: T, clip: &AudioClip) -> TranscriptResult;
}

/// Transcriber implementation type
#[derive(Debug, Clone, Copy, Default)]
pub enum TranscriberImplementation {
    #[default]
    WhisperApi,
}

/// Factory for creating transcription services
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_transcriber(
        implementation: TranscriberImplementation,
        config: &ServicesConfig,
        client: ServiceClient,
    ) -> Arc<dyn TranscriptionService> {
        match implementation {
            TranscriberImplementation::WhisperApi => Arc::new(WhisperApiTranscriber::new(config, client)),
        }
    }

    pub fn create_default(config: &ServicesConfig, client: ServiceClient) -> Arc<dyn TranscriptionService> {
        Self::create_transcriber(TranscriberImplementation::default(), config, client)
    }
}
