//! Speech recognition: phrase matching, backends and the session lifecycle
//!
//! The manager keeps a best-effort continuous listening session alive,
//! retries transient failures and hands off to manual fallback when the
//! capability is missing or keeps failing.

mod backend;
mod error;
mod manager;
mod phrases;

pub use backend::{FeedBackend, FeedItem, RecognitionBackend, UnavailableBackend};
pub use error::{RecognitionError, RecognitionErrorKind};
pub use manager::{RecognitionManager, RecognitionState};

/// One recognition hypothesis
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: f32,
}

/// Events delivered by a recognition backend
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The start request succeeded
    Started,
    /// A recognized utterance, best alternative first
    Result {
        alternatives: Vec<Alternative>,
        is_final: bool,
    },
    Error(RecognitionErrorKind),
    /// The session ended (on its own or after `stop`)
    Ended,
}
