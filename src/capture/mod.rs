//! Camera acquisition for the mirror feed
//!
//! Capture failures are fatal to the current attempt only: the visitor sees
//! a message and a retry action, nothing recovers automatically.

mod device;

use std::path::PathBuf;

pub use device::{DeviceCapture, NullCapture};

/// Something that can provide the live video feed
pub trait MediaCapture: Send {
    /// Acquire the feed; acquiring an already live feed is a no-op
    fn acquire(&mut self) -> Result<(), CaptureError>;

    /// Release the feed (stop all tracks)
    fn release(&mut self);

    #[cfg(test)]
    fn is_live(&self) -> bool;
}

/// Errors that can occur while acquiring the camera
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera found at {0}")]
    NotFound(PathBuf),

    #[error("camera is in use by another application")]
    Busy,

    #[error("camera cannot satisfy the requested constraints: {0}")]
    Overconstrained(String),

    #[error("camera error: {0}")]
    Other(String),
}

impl CaptureError {
    /// Message shown next to the retry action
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Camera access was denied. Allow camera access and press retry."
            }
            Self::NotFound(_) => "No camera was found. Connect a camera and press retry.",
            Self::Busy => "The camera is being used by another application. Close it and press retry.",
            Self::Overconstrained(_) => "The camera does not support the required video mode.",
            Self::Other(_) => "The camera could not be started. Press retry to try again.",
        }
    }
}
