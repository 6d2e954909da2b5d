// Staged analysis pipeline
//
// Idle -> Sampling -> VisualScoring -> AudioExtracting -> Transcribing
//      -> AudioScoring -> Combining -> Completed
//
// Only Sampling can fail the run. Every later stage that fails is replaced
// by its fallback value and the run moves on. Cancellation is checked
// between stages and aborts outstanding remote calls.

pub mod stages;
pub mod state;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use stages::{FallbackUsed, Resolved, StageOutput};
pub use state::{AnalysisState, StateTracker};

use crate::audio::{AudioExtractor, FfmpegTranscoder};
use crate::combine::combine;
use crate::config::Config;
use crate::error::{HookError, Result};
use crate::frames::{FrameSampler, SampleObserver, SamplingOptions};
use crate::media::{MediaFactory, VideoSource};
use crate::notify::{NotificationSink, WebhookNotifier};
use crate::progress::{AudioSnapshot, ProgressEvent, ProgressReporter, StageFlags, VisualSnapshot};
use crate::remote::ServiceClient;
use crate::scoring::{AudioHookScorer, ScorerFactory, VisualHookScorer};
use crate::transcribe::{TranscriberFactory, TranscriptionService};
use crate::types::{AudioClip, AudioStageResult, FinalResult, Frame, TranscriptResult, VisualStageResult};

/// Buffered events per spawned run
const EVENT_BUFFER: usize = 64;

const START: u8 = 0;
const SAMPLING_START: u8 = 10;
const SAMPLING_SPAN: f64 = 20.0;
const FRAMES_DONE: u8 = 30;
const VISUAL_DONE: u8 = 40;
const TRANSCRIPT_DONE: u8 = 60;
const AUDIO_HOOK_DONE: u8 = 80;

/// Emits a Processing event per captured frame
struct SamplingProgress<'a> {
    reporter: &'a mut ProgressReporter,
}

#[async_trait]
impl<'a> SampleObserver for SamplingProgress<'a> {
    async fn on_frame(&mut self, captured: &[Arc<Frame>], planned: usize) {
        let done = captured.len() as f64 / planned.max(1) as f64;
        self.reporter
            .emit(ProgressEvent::Processing {
                percent: SAMPLING_START + (done * SAMPLING_SPAN) as u8,
                message: format!("Extracting frame {}/{}...", captured.len(), planned),
                frames: captured.to_vec(),
                completed: StageFlags::default(),
            })
            .await;
    }
}

/// A run started with [`AnalysisOrchestrator::spawn`]
pub struct AnalysisRun {
    pub events: mpsc::Receiver<ProgressEvent>,
    pub cancel: CancellationToken,
    pub handle: JoinHandle<Result<FinalResult>>,
}

impl AnalysisRun {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the final result, discarding remaining events
    pub async fn finish(mut self) -> Result<FinalResult> {
        while self.events.recv().await.is_some() {}
        self.handle
            .await
            .map_err(|e| HookError::Task(format!("Analysis task failed: {}", e)))?
    }
}

pub struct AnalysisOrchestrator {
    sampler: FrameSampler,
    extractor: AudioExtractor,
    visual: Arc<dyn VisualHookScorer>,
    audio: Arc<dyn AudioHookScorer>,
    transcriber: Arc<dyn TranscriptionService>,
    notifier: Option<Arc<dyn NotificationSink>>,
}

impl AnalysisOrchestrator {
    pub fn new(
        sampler: FrameSampler,
        extractor: AudioExtractor,
        visual: Arc<dyn VisualHookScorer>,
        audio: Arc<dyn AudioHookScorer>,
        transcriber: Arc<dyn TranscriptionService>,
    ) -> Self {
        Self {
            sampler,
            extractor,
            visual,
            audio,
            transcriber,
            notifier: None,
        }
    }

    /// Wire the default ffmpeg, HTTP and webhook collaborators from `config`
    pub fn from_config(config: &Config) -> Self {
        Self::with_transcoder(config, FfmpegTranscoder::shared(config.media.clone()))
    }

    /// Like [`from_config`](Self::from_config) but reusing an existing transcoder handle
    pub fn with_transcoder(config: &Config, transcoder: Arc<FfmpegTranscoder>) -> Self {
        let client = ServiceClient::new(&config.services);
        let sampler = FrameSampler::new(
            MediaFactory::create_decoder(config.media.clone()),
            SamplingOptions::from(&config.sampling),
        );

        let mut orchestrator = Self::new(
            sampler,
            AudioExtractor::from_config(config, transcoder),
            ScorerFactory::create_visual(&config.services, client.clone()),
            ScorerFactory::create_audio(&config.services, client.clone()),
            TranscriberFactory::create_default(&config.services, client),
        );
        orchestrator.notifier = WebhookNotifier::from_config(&config.notify, &config.services);
        orchestrator
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn sampler(&self) -> &FrameSampler {
        &self.sampler
    }

    pub fn extractor(&self) -> &AudioExtractor {
        &self.extractor
    }

    /// Run the pipeline on its own task
    pub fn spawn(self: Arc<Self>, source: VideoSource) -> AnalysisRun {
        let (sender, events) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut reporter = ProgressReporter::new(sender);
            self.analyze_video(&source, &mut reporter, &token).await
        });

        AnalysisRun { events, cancel, handle }
    }

    /// Analyze the opening window of `source`.
    ///
    /// Exactly one terminal event is emitted: `Completed`, `Error` (sampling
    /// failed; the returned error keeps the original message) or `Cancelled`.
    pub async fn analyze_video(
        &self,
        source: &VideoSource,
        progress: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<FinalResult> {
        let mut tracker = StateTracker::default();
        let result = self.analyze_video_tracked(source, progress, cancel, &mut tracker).await;
        debug!("State path: {:?}", tracker.history());
        result
    }

    /// [`analyze_video`](Self::analyze_video), recording every state the run
    /// passes through in `tracker`
    pub async fn analyze_video_tracked(
        &self,
        source: &VideoSource,
        progress: &mut ProgressReporter,
        cancel: &CancellationToken,
        tracker: &mut StateTracker,
    ) -> Result<FinalResult> {
        info!("Starting hook analysis of {} ({} bytes)", source.name(), source.len());

        match self.run(source, progress, cancel, tracker).await {
            Ok(result) => {
                self.notify(format!(
                    "Hook analysis of {} completed: overall score {}",
                    source.name(),
                    result.overall_score
                ));
                Ok(result)
            }
            Err(HookError::Cancelled) => {
                info!("Analysis cancelled during {}", tracker.current());
                tracker.advance(AnalysisState::Cancelled);
                progress
                    .emit(ProgressEvent::Cancelled {
                        percent: 0,
                        message: "Analysis cancelled".to_string(),
                    })
                    .await;
                Err(HookError::Cancelled)
            }
            Err(e) => {
                error!("Analysis failed during {}: {}", tracker.current(), e);
                tracker.advance(AnalysisState::Error);
                progress
                    .emit(ProgressEvent::Error {
                        percent: 0,
                        message: e.user_message(),
                    })
                    .await;
                self.notify(format!("Hook analysis of {} failed: {}", source.name(), e));
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        source: &VideoSource,
        progress: &mut ProgressReporter,
        cancel: &CancellationToken,
        tracker: &mut StateTracker,
    ) -> Result<FinalResult> {
        let window = self.extractor.window_seconds();

        tracker.advance(AnalysisState::Sampling);
        progress
            .emit(ProgressEvent::Processing {
                percent: START,
                message: "Starting video analysis...".to_string(),
                frames: Vec::new(),
                completed: StageFlags::default(),
            })
            .await;
        progress
            .emit(ProgressEvent::Processing {
                percent: SAMPLING_START,
                message: "Extracting frames from video...".to_string(),
                frames: Vec::new(),
                completed: StageFlags::default(),
            })
            .await;

        let frames = {
            let mut observer = SamplingProgress { reporter: &mut *progress };
            self.sampler.sample(source, cancel, &mut observer).await?
        };
        let mut flags = StageFlags { frames: true, ..StageFlags::default() };
        progress
            .emit(ProgressEvent::Processing {
                percent: FRAMES_DONE,
                message: format!("Extracted {} frames! Analyzing visual hook...", frames.len()),
                frames: frames.clone(),
                completed: flags,
            })
            .await;

        Self::checkpoint(cancel, tracker, AnalysisState::VisualScoring)?;
        let visual = stages::resolve(
            "Visual hook analysis",
            Self::guarded(cancel, stages::score_visual(&*self.visual, &frames)).await?,
            VisualStageResult::fallback,
        );
        flags.visual = true;
        let visual_snapshot = VisualSnapshot {
            score: visual.value.score,
            breakdown: visual.value.breakdown,
        };
        progress
            .emit(ProgressEvent::Transcribing {
                percent: VISUAL_DONE,
                message: if visual.fell_back {
                    "Visual hook analysis failed, using fallback. Transcribing audio...".to_string()
                } else {
                    "Visual hook scored! Transcribing audio...".to_string()
                },
                frame_count: frames.len(),
                visual: visual_snapshot,
                transcript: None,
                completed: flags,
            })
            .await;

        Self::checkpoint(cancel, tracker, AnalysisState::AudioExtracting)?;
        let clip = stages::resolve(
            "Audio extraction",
            Self::guarded(cancel, stages::extract_audio(&self.extractor, source)).await?,
            || AudioClip::empty(self.extractor.target_rate()),
        );

        Self::checkpoint(cancel, tracker, AnalysisState::Transcribing)?;
        let transcript = stages::resolve(
            "Transcription",
            Self::guarded(cancel, stages::transcribe(&*self.transcriber, &clip.value, window)).await?,
            || TranscriptResult::empty(window),
        );
        flags.audio = true;
        progress
            .emit(ProgressEvent::Transcribing {
                percent: TRANSCRIPT_DONE,
                message: if clip.fell_back {
                    "Audio extraction failed, continuing without audio. Analyzing audio hook...".to_string()
                } else {
                    "Audio extracted! Analyzing audio hook...".to_string()
                },
                frame_count: frames.len(),
                visual: visual_snapshot,
                transcript: Some(transcript.value.text.clone()),
                completed: flags,
            })
            .await;

        Self::checkpoint(cancel, tracker, AnalysisState::AudioScoring)?;
        let audio = stages::resolve(
            "Audio hook analysis",
            Self::guarded(cancel, stages::score_audio(&*self.audio, &transcript.value.text)).await?,
            AudioStageResult::fallback,
        );
        flags.audio_hook = true;
        progress
            .emit(ProgressEvent::Analyzing {
                percent: AUDIO_HOOK_DONE,
                message: if audio.fell_back {
                    "Audio hook analysis failed, using fallback. Generating final results...".to_string()
                } else {
                    "Audio hook scored! Generating final results...".to_string()
                },
                frame_count: frames.len(),
                transcript: transcript.value.text.clone(),
                visual: visual_snapshot,
                audio: AudioSnapshot {
                    score: audio.value.score,
                    breakdown: audio.value.breakdown,
                },
                completed: flags,
            })
            .await;

        Self::checkpoint(cancel, tracker, AnalysisState::Combining)?;
        let result = combine(&visual.value, &audio.value, Some(&transcript.value));

        tracker.advance(AnalysisState::Completed);
        info!(
            "Analysis completed: overall {} (visual {}, audio {}), confidence {}",
            result.overall_score, result.visual_score, result.audio_score, result.confidence
        );
        progress
            .emit(ProgressEvent::Completed {
                percent: 100,
                message: "Analysis completed!".to_string(),
                result: Box::new(result.clone()),
                completed: flags,
            })
            .await;

        Ok(result)
    }

    fn checkpoint(cancel: &CancellationToken, tracker: &mut StateTracker, next: AnalysisState) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(HookError::Cancelled);
        }
        tracker.advance(next);
        Ok(())
    }

    /// Await `future` unless the run is cancelled first; dropping it aborts the call
    async fn guarded<F: Future>(cancel: &CancellationToken, future: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HookError::Cancelled),
            output = future => Ok(output),
        }
    }

    fn notify(&self, message: String) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(message);
        }
    }
}
