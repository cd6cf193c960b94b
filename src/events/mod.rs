//! Events flowing into and out of the session reducer
//!
//! `SessionEvent` is everything the reducer consumes, `Effect` is everything
//! it asks the runtime to do, and `DisplayUpdate` is what subscribed
//! renderers receive.

mod status;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::input::ManualTrigger;
use crate::recognition::RecognitionEvent;

pub use status::StatusLabel;

/// Delayed continuations, posted back to the reducer when they expire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// Recognition ended on its own; start it again
    RestartRecognition,
    /// Retry after a transient recognition error
    RetryRecognition,
    /// Permanent recognition error; switch to manual input
    EnterFallback,
    /// Restore the in-progress status after a claim
    SettleStatus,
    /// Maximum distortion reached; show the verdict
    ShowVerdict,
    /// First verdict text glitch
    StartVerdictGlitch,
    /// Repeating verdict text glitch
    VerdictGlitch,
}

/// Where a claim came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimSource {
    Phrase,
    Key,
    MirrorClick,
    DebugButton,
}

/// Input to the session reducer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Manual input (key press, click, debug trigger)
    Manual(ManualTrigger),
    /// Event delivered by the recognition backend
    Recognition(RecognitionEvent),
    /// A scheduled timer expired
    Timer { generation: u64, timer: Timer },
    /// Animation frame
    Tick,
    /// The display surface was hidden or shown again
    Visibility { hidden: bool },
    /// Explicit reset of the mirror
    Reset,
    /// Retry camera acquisition after a capture error
    RetryCapture,
}

/// Work requested by the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start the recognition backend. Best-effort starts swallow failures.
    StartRecognition { best_effort: bool },
    StopRecognition,
    Schedule { timer: Timer, delay: Duration },
    Display(DisplayUpdate),
    /// Internal: one claim for the distortion controller
    Claim(ClaimSource),
    /// Internal: the verdict halts listening
    HaltListening,
}

impl Effect {
    pub fn display(update: DisplayUpdate) -> Self {
        Self::Display(update)
    }

    pub fn status(label: StatusLabel) -> Self {
        Self::Display(DisplayUpdate::Status {
            text: label.to_string(),
            label,
        })
    }

    pub fn schedule(timer: Timer, delay: Duration) -> Self {
        Self::Schedule { timer, delay }
    }
}

/// Updates pushed to the mirror renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayUpdate {
    /// Status / listening indicator text
    Status { label: StatusLabel, text: String },

    /// Humanity percentage readout
    Humanity { percentage: u8, level: u8 },

    /// Severity tier applied to the video element (`class` is `None` at level 0)
    Tier {
        level: u8,
        class: Option<String>,
        filter: Option<String>,
    },

    /// One frame of the claim glitch
    GlitchFrame { dx: f32, dy: f32, hue: f32 },

    /// Claim glitch finished, offset back to zero
    GlitchEnded,

    /// Ambient noise opacity for this frame
    Noise { opacity: f32 },

    /// All transform and filter state cleared
    TransformReset,

    /// Normal overlay and instructions visibility
    Overlay { visible: bool, instructions: bool },

    VerdictShown,

    VerdictHidden,

    /// One pulse of the verdict text glitch
    VerdictGlitch { skew: f32, offset: f32 },

    /// Camera feed is live
    CaptureReady,

    /// Camera could not be acquired
    CaptureError { message: String, retryable: bool },

    /// User-facing recognition problem
    RecognitionMessage { message: String },

    /// Debug feedback for a recognized transcript
    Transcript {
        text: String,
        confidence: f32,
        is_final: bool,
        matched: bool,
    },
}

impl DisplayUpdate {
    /// Per-frame updates that would flood the logs
    pub fn is_frame(&self) -> bool {
        matches!(
            self,
            DisplayUpdate::Noise { .. } | DisplayUpdate::GlitchFrame { .. }
        )
    }
}

impl std::fmt::Display for DisplayUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayUpdate::Status { text, .. } => write!(f, "STATUS ({})", text),
            DisplayUpdate::Humanity { percentage, level } => {
                write!(f, "HUMANITY {}% (level {})", percentage, level)
            }
            DisplayUpdate::Tier { class, .. } => {
                write!(f, "TIER {}", class.as_deref().unwrap_or("none"))
            }
            DisplayUpdate::GlitchFrame { .. } => write!(f, "GLITCH_FRAME"),
            DisplayUpdate::GlitchEnded => write!(f, "GLITCH_ENDED"),
            DisplayUpdate::Noise { opacity } => write!(f, "NOISE ({:.3})", opacity),
            DisplayUpdate::TransformReset => write!(f, "TRANSFORM_RESET"),
            DisplayUpdate::Overlay { visible, .. } => write!(f, "OVERLAY (visible={})", visible),
            DisplayUpdate::VerdictShown => write!(f, "VERDICT_SHOWN"),
            DisplayUpdate::VerdictHidden => write!(f, "VERDICT_HIDDEN"),
            DisplayUpdate::VerdictGlitch { .. } => write!(f, "VERDICT_GLITCH"),
            DisplayUpdate::CaptureReady => write!(f, "CAPTURE_READY"),
            DisplayUpdate::CaptureError { message, .. } => write!(f, "CAPTURE_ERROR ({})", message),
            DisplayUpdate::RecognitionMessage { message } => {
                write!(f, "RECOGNITION_MESSAGE ({})", message)
            }
            DisplayUpdate::Transcript { text, matched, .. } => {
                write!(f, "TRANSCRIPT ({:?}, matched={})", text, matched)
            }
        }
    }
}
