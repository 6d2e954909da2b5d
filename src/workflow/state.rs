use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Position of a run in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Idle,
    Sampling,
    VisualScoring,
    AudioExtracting,
    Transcribing,
    AudioScoring,
    Combining,
    Completed,
    Error,
    Cancelled,
}

impl AnalysisState {
    /// Successor on the happy path
    pub fn next(self) -> Option<AnalysisState> {
        use AnalysisState::*;
        match self {
            Idle => Some(Sampling),
            Sampling => Some(VisualScoring),
            VisualScoring => Some(AudioExtracting),
            AudioExtracting => Some(Transcribing),
            Transcribing => Some(AudioScoring),
            AudioScoring => Some(Combining),
            Combining => Some(Completed),
            Completed | Error | Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisState::Completed | AnalysisState::Error | AnalysisState::Cancelled)
    }

    /// Forward one step, fail only out of `Sampling`, cancel from any live state
    pub fn can_transition_to(self, target: AnalysisState) -> bool {
        match target {
            AnalysisState::Error => self == AnalysisState::Sampling,
            AnalysisState::Cancelled => !self.is_terminal(),
            _ => self.next() == Some(target),
        }
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisState::Idle => "idle",
            AnalysisState::Sampling => "sampling",
            AnalysisState::VisualScoring => "visual scoring",
            AnalysisState::AudioExtracting => "audio extracting",
            AnalysisState::Transcribing => "transcribing",
            AnalysisState::AudioScoring => "audio scoring",
            AnalysisState::Combining => "combining",
            AnalysisState::Completed => "completed",
            AnalysisState::Error => "error",
            AnalysisState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Current state of one run plus the path it took
#[derive(Debug, Clone)]
pub struct StateTracker {
    current: AnalysisState,
    history: Vec<AnalysisState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self {
            current: AnalysisState::Idle,
            history: vec![AnalysisState::Idle],
        }
    }
}

impl StateTracker {
    pub fn current(&self) -> AnalysisState {
        self.current
    }

    pub fn history(&self) -> &[AnalysisState] {
        &self.history
    }

    /// Move to `target`. Illegal moves are logged and ignored.
    pub fn advance(&mut self, target: AnalysisState) -> bool {
        if !self.current.can_transition_to(target) {
            warn!("Ignoring illegal transition {} -> {}", self.current, target);
            return false;
        }
        debug!("State {} -> {}", self.current, target);
        self.current = target;
        self.history.push(target);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AnalysisState::*;

    const HAPPY_PATH: [AnalysisState; 8] = [
        Idle,
        Sampling,
        VisualScoring,
        AudioExtracting,
        Transcribing,
        AudioScoring,
        Combining,
        Completed,
    ];

    #[test]
    fn test_happy_path_is_strictly_sequential() {
        for pair in HAPPY_PATH.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(!Idle.can_transition_to(VisualScoring));
        assert!(!Transcribing.can_transition_to(AudioExtracting));
        assert!(!Completed.can_transition_to(Idle));
    }

    #[test]
    fn test_error_only_from_sampling() {
        for state in HAPPY_PATH {
            assert_eq!(state.can_transition_to(Error), state == Sampling, "{}", state);
        }
    }

    #[test]
    fn test_cancel_from_any_live_state() {
        for state in HAPPY_PATH {
            assert_eq!(state.can_transition_to(Cancelled), state != Completed);
        }
        assert!(!Cancelled.can_transition_to(Cancelled));
        assert!(!Error.can_transition_to(Cancelled));
    }

    #[test]
    fn test_tracker_records_path_and_rejects_skips() {
        let mut tracker = StateTracker::default();
        assert!(tracker.advance(Sampling));
        assert!(!tracker.advance(Transcribing));
        assert!(tracker.advance(VisualScoring));

        assert_eq!(tracker.current(), VisualScoring);
        assert_eq!(tracker.history(), &[Idle, Sampling, VisualScoring]);
    }
}
