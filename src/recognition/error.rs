//! Recognition error kinds and their classification

use serde::{Deserialize, Serialize};

/// Named error kinds reported by a recognition backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognitionErrorKind {
    NoSpeech,
    Aborted,
    AudioCapture,
    NotAllowed,
    Network,
    ServiceNotAllowed,
    /// Anything the backend reports that we do not recognize
    Other(String),
}

impl RecognitionErrorKind {
    /// Parse a backend error code such as `no-speech` or `not-allowed`
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            "audio-capture" => Self::AudioCapture,
            "not-allowed" => Self::NotAllowed,
            "network" => Self::Network,
            "service-not-allowed" => Self::ServiceNotAllowed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Transient errors are retried; everything else goes to fallback
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NoSpeech | Self::Aborted | Self::Other(_))
    }

    /// Message shown to the visitor for permanent errors
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotAllowed => "Microphone access was denied. Switching to manual mode.",
            Self::AudioCapture => "No microphone could be opened. Switching to manual mode.",
            Self::Network => "Speech recognition lost its network connection. Switching to manual mode.",
            Self::ServiceNotAllowed => "Speech recognition service is not allowed here. Switching to manual mode.",
            Self::NoSpeech => "No speech detected.",
            Self::Aborted => "Listening was interrupted.",
            Self::Other(_) => "Speech recognition hit an unexpected error.",
        }
    }
}

impl std::fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSpeech => write!(f, "no-speech"),
            Self::Aborted => write!(f, "aborted"),
            Self::AudioCapture => write!(f, "audio-capture"),
            Self::NotAllowed => write!(f, "not-allowed"),
            Self::Network => write!(f, "network"),
            Self::ServiceNotAllowed => write!(f, "service-not-allowed"),
            Self::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Errors returned synchronously by a backend
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("speech recognition is not supported on this platform")]
    Unsupported,

    #[error("recognition session is already running")]
    AlreadyRunning,

    #[error("recognition backend failed: {0}")]
    Backend(String),
}

impl RecognitionError {
    /// Kind used when a start request fails synchronously
    pub fn kind(&self) -> RecognitionErrorKind {
        match self {
            Self::Unsupported => RecognitionErrorKind::ServiceNotAllowed,
            Self::AlreadyRunning => RecognitionErrorKind::Aborted,
            Self::Backend(message) => RecognitionErrorKind::Other(message.clone()),
        }
    }
}
