//! Live progress stream for one analysis run.
//!
//! The orchestrator is the only producer; the caller owns the receiving end.
//! Each variant carries just the fields known at that point of the run.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::types::{AudioBreakdown, FinalResult, Frame, VisualBreakdown};

/// Which of the four user-visible steps have finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageFlags {
    pub frames: bool,
    pub visual: bool,
    pub audio: bool,
    pub audio_hook: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisualSnapshot {
    pub score: f64,
    pub breakdown: VisualBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AudioSnapshot {
    pub score: f64,
    pub breakdown: AudioBreakdown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ProgressEvent {
    Processing {
        percent: u8,
        message: String,
        frames: Vec<Arc<Frame>>,
        completed: StageFlags,
    },
    Transcribing {
        percent: u8,
        message: String,
        frame_count: usize,
        visual: VisualSnapshot,
        #[serde(skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
        completed: StageFlags,
    },
    Analyzing {
        percent: u8,
        message: String,
        frame_count: usize,
        transcript: String,
        visual: VisualSnapshot,
        audio: AudioSnapshot,
        completed: StageFlags,
    },
    Completed {
        percent: u8,
        message: String,
        result: Box<FinalResult>,
        completed: StageFlags,
    },
    Error {
        percent: u8,
        message: String,
    },
    Cancelled {
        percent: u8,
        message: String,
    },
}

impl ProgressEvent {
    pub fn percent(&self) -> u8 {
        match self {
            ProgressEvent::Processing { percent, .. }
            | ProgressEvent::Transcribing { percent, .. }
            | ProgressEvent::Analyzing { percent, .. }
            | ProgressEvent::Completed { percent, .. }
            | ProgressEvent::Error { percent, .. }
            | ProgressEvent::Cancelled { percent, .. } => *percent,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProgressEvent::Processing { message, .. }
            | ProgressEvent::Transcribing { message, .. }
            | ProgressEvent::Analyzing { message, .. }
            | ProgressEvent::Completed { message, .. }
            | ProgressEvent::Error { message, .. }
            | ProgressEvent::Cancelled { message, .. } => message,
        }
    }

    pub fn stage_name(&self) -> &'static str {
        match self {
            ProgressEvent::Processing { .. } => "processing",
            ProgressEvent::Transcribing { .. } => "transcribing",
            ProgressEvent::Analyzing { .. } => "analyzing",
            ProgressEvent::Completed { .. } => "completed",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed { .. } | ProgressEvent::Error { .. } | ProgressEvent::Cancelled { .. }
        )
    }

    fn set_percent(&mut self, value: u8) {
        match self {
            ProgressEvent::Processing { percent, .. }
            | ProgressEvent::Transcribing { percent, .. }
            | ProgressEvent::Analyzing { percent, .. }
            | ProgressEvent::Completed { percent, .. }
            | ProgressEvent::Error { percent, .. }
            | ProgressEvent::Cancelled { percent, .. } => *percent = value,
        }
    }
}

/// Sending half used by the orchestrator.
///
/// Percent never decreases, only `Completed` reaches 100, and nothing is sent
/// after a terminal event. A dropped receiver is not an error.
pub struct ProgressReporter {
    sender: Option<mpsc::Sender<ProgressEvent>>,
    last_percent: u8,
    finished: bool,
}

impl ProgressReporter {
    pub fn new(sender: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            sender: Some(sender),
            last_percent: 0,
            finished: false,
        }
    }

    /// Reporter that discards every event
    pub fn silent() -> Self {
        Self {
            sender: None,
            last_percent: 0,
            finished: false,
        }
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn emit(&mut self, mut event: ProgressEvent) {
        if self.finished {
            debug!("Dropping {} event after terminal event", event.stage_name());
            return;
        }

        let percent = match event {
            ProgressEvent::Completed { .. } => 100,
            ProgressEvent::Error { .. } | ProgressEvent::Cancelled { .. } => self.last_percent,
            _ => event.percent().clamp(self.last_percent, 99),
        };
        event.set_percent(percent);
        self.last_percent = percent;
        self.finished = event.is_terminal();

        if let Some(sender) = &self.sender {
            if sender.send(event).await.is_err() {
                debug!("Progress receiver dropped; continuing without events");
                self.sender = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::combine;
    use crate::types::{AudioStageResult, VisualStageResult};

    fn processing(percent: u8) -> ProgressEvent {
        ProgressEvent::Processing {
            percent,
            message: "Extracting".to_string(),
            frames: Vec::new(),
            completed: StageFlags::default(),
        }
    }

    fn completed() -> ProgressEvent {
        let result = combine(&VisualStageResult::fallback(), &AudioStageResult::fallback(), None);
        ProgressEvent::Completed {
            percent: 0,
            message: "done".to_string(),
            result: Box::new(result),
            completed: StageFlags { frames: true, visual: true, audio: true, audio_hook: true },
        }
    }

    #[tokio::test]
    async fn test_percent_never_decreases() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut reporter = ProgressReporter::new(tx);

        reporter.emit(processing(30)).await;
        reporter.emit(processing(20)).await;
        reporter.emit(processing(100)).await;
        drop(reporter);

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event.percent());
        }
        assert_eq!(seen, vec![30, 30, 99]);
    }

    #[tokio::test]
    async fn test_only_completed_reaches_hundred_and_nothing_follows() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut reporter = ProgressReporter::new(tx);

        reporter.emit(processing(40)).await;
        reporter.emit(completed()).await;
        reporter.emit(processing(50)).await;
        assert!(reporter.is_finished());
        drop(reporter);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].percent(), 100);
        assert_eq!(events[1].stage_name(), "completed");
    }

    #[tokio::test]
    async fn test_error_keeps_last_percent() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut reporter = ProgressReporter::new(tx);

        reporter.emit(processing(25)).await;
        reporter.emit(ProgressEvent::Error { percent: 0, message: "bad".to_string() }).await;
        drop(reporter);

        rx.recv().await.unwrap();
        let error = rx.recv().await.unwrap();
        assert_eq!(error.percent(), 25);
        assert!(error.is_terminal());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_tolerated() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut reporter = ProgressReporter::new(tx);
        reporter.emit(processing(10)).await;
        reporter.emit(completed()).await;
        assert_eq!(reporter.last_percent(), 100);
    }

    #[test]
    fn test_events_serialize_with_stage_tag() {
        let json = serde_json::to_value(processing(10)).unwrap();
        assert_eq!(json["stage"], "processing");
        assert_eq!(json["percent"], 10);
    }
}
