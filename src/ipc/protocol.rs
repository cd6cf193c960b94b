//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::{DisplayUpdate, SessionEvent};
use crate::input::ManualTrigger;
use crate::recognition::FeedItem;
use crate::state::SessionSnapshot;

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from the renderer (or a speech-to-text relay) to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current session status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to display updates
    Subscribe,

    /// A key press in the renderer
    Key { key: String },

    /// A pointer click
    Click { on_mirror: bool },

    /// The on-screen debug trigger
    DebugTrigger,

    /// Reset the mirror
    Reset,

    /// Retry camera acquisition
    RetryCapture,

    /// Renderer visibility changed
    Visibility { hidden: bool },

    /// Recognized speech from an external recognizer
    Transcript {
        text: String,
        #[serde(default = "default_confidence")]
        confidence: f32,
        #[serde(default = "default_is_final")]
        is_final: bool,
    },

    /// Error reported by an external recognizer
    RecognitionError { code: String },
}

fn default_confidence() -> f32 {
    1.0
}

fn default_is_final() -> bool {
    true
}

/// What the daemon should do with a request
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Answered directly by the server
    Local,
    /// Forwarded to the session
    Session(SessionEvent),
    /// Published to the recognition feed
    Feed(FeedItem),
}

impl Request {
    pub fn route(&self) -> Route {
        match self {
            Request::GetStatus | Request::Ping | Request::Subscribe => Route::Local,
            Request::Key { key } => Route::Session(SessionEvent::Manual(ManualTrigger::Key {
                name: key.clone(),
            })),
            Request::Click { on_mirror } => Route::Session(SessionEvent::Manual(
                ManualTrigger::Click {
                    on_mirror: *on_mirror,
                },
            )),
            Request::DebugTrigger => {
                Route::Session(SessionEvent::Manual(ManualTrigger::DebugButton))
            }
            Request::Reset => Route::Session(SessionEvent::Reset),
            Request::RetryCapture => Route::Session(SessionEvent::RetryCapture),
            Request::Visibility { hidden } => {
                Route::Session(SessionEvent::Visibility { hidden: *hidden })
            }
            Request::Transcript {
                text,
                confidence,
                is_final,
            } => Route::Feed(FeedItem::Transcript {
                text: text.clone(),
                confidence: *confidence,
                is_final: *is_final,
            }),
            Request::RecognitionError { code } => {
                Route::Feed(FeedItem::Error { code: code.clone() })
            }
        }
    }
}

/// Responses from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current session status
    Status(SessionStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Request forwarded
    Accepted,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification for subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Display { update: DisplayUpdate },
}

/// Full status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    #[serde(flatten)]
    pub session: SessionSnapshot,
}

impl SessionStatus {
    pub fn new(session: SessionSnapshot, uptime_secs: u64) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs,
            session,
        }
    }
}
