//! Human-readable status labels

use serde::{Deserialize, Serialize};

/// Label shown in the status / listening indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusLabel {
    /// Waiting for the camera
    Initializing,
    /// Recognition start requested
    Starting,
    Listening,
    /// A claim was accepted
    Processing,
    Retrying { attempt: u32, max: u32 },
    /// Permanent recognition error, fallback pending
    RecognitionFailed,
    /// Manual input mode
    Fallback,
    Paused,
    Verdict,
    CaptureFailed,
}

impl Default for StatusLabel {
    fn default() -> Self {
        Self::Initializing
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusLabel::Initializing => write!(f, "Starting camera..."),
            StatusLabel::Starting => write!(f, "Starting microphone..."),
            StatusLabel::Listening => write!(f, "Listening... say \"I am human\""),
            StatusLabel::Processing => write!(f, "Analyzing humanity..."),
            StatusLabel::Retrying { attempt, max } => {
                write!(f, "Recognition interrupted, retrying ({}/{})...", attempt, max)
            }
            StatusLabel::RecognitionFailed => write!(f, "Speech recognition unavailable"),
            StatusLabel::Fallback => {
                write!(f, "Manual mode: press the trigger key or click the mirror")
            }
            StatusLabel::Paused => write!(f, "Paused"),
            StatusLabel::Verdict => write!(f, "Verdict reached"),
            StatusLabel::CaptureFailed => write!(f, "Camera unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrying_text() {
        let label = StatusLabel::Retrying { attempt: 2, max: 5 };
        assert_eq!(label.to_string(), "Recognition interrupted, retrying (2/5)...");
    }

    #[test]
    fn test_label_serialization() {
        let json = serde_json::to_string(&StatusLabel::Fallback).unwrap();
        assert_eq!(json, r#"{"kind":"fallback"}"#);
    }
}
