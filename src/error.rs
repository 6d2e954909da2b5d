use thiserror::Error;

#[derive(Error, Debug)]
pub enum HookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The video cannot be read, or its metadata/frames cannot be decoded.
    #[error("Unreadable video: {0}")]
    FatalInput(String),

    #[error("Remote service error: {0}")]
    Remote(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Audio extraction error: {0}")]
    Audio(String),

    #[error("No audio track found in video")]
    NoAudioTrack,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Background task error: {0}")]
    Task(String),

    #[error("Analysis cancelled")]
    Cancelled,
}

impl HookError {
    /// Only unreadable input aborts a run; everything else degrades.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookError::FatalInput(_))
    }

    /// User-facing message for a terminal error event.
    pub fn user_message(&self) -> String {
        classify_message(&self.to_string())
    }
}

/// Map known fault descriptions onto a small set of user-facing categories.
///
/// Unrecognised messages pass through unchanged.
pub fn classify_message(message: &str) -> String {
    let lower = message.to_lowercase();

    if lower.contains("api key") {
        "API configuration error. Please check your API key.".to_string()
    } else if lower.contains("quota") || lower.contains("billing") {
        "API quota exceeded. Please check your billing.".to_string()
    } else if lower.contains("rate limit") {
        "Rate limit reached. Please try again in a few minutes.".to_string()
    } else if lower.contains("network") || lower.contains("fetch") {
        "Network error. Please check your internet connection.".to_string()
    } else {
        message.to_string()
    }
}

pub type Result<T> = std::result::Result<T, HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_causes_are_classified() {
        assert_eq!(
            classify_message("Invalid API key provided"),
            "API configuration error. Please check your API key."
        );
        assert_eq!(
            classify_message("You exceeded your current quota"),
            "API quota exceeded. Please check your billing."
        );
        assert_eq!(
            classify_message("Rate limit exceeded for model"),
            "Rate limit reached. Please try again in a few minutes."
        );
        assert_eq!(
            classify_message("Failed to fetch"),
            "Network error. Please check your internet connection."
        );
    }

    #[test]
    fn test_unknown_cause_passes_through() {
        assert_eq!(classify_message("moov atom not found"), "moov atom not found");
    }

    #[test]
    fn test_only_input_errors_are_fatal() {
        assert!(HookError::FatalInput("bad".into()).is_fatal());
        assert!(!HookError::Remote("503".into()).is_fatal());
        assert!(!HookError::NoAudioTrack.is_fatal());
    }
}
