//! Recognition backends
//!
//! A backend wraps the platform's phrase-recognition capability. The
//! runtime probes it with `is_available` before use and drives it with
//! `start`/`stop`; everything else arrives as `RecognitionEvent`s.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{RecognitionError, RecognitionErrorKind};
use super::{Alternative, RecognitionEvent};

/// A continuous phrase-recognition capability
pub trait RecognitionBackend: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Capability probe
    fn is_available(&self) -> bool;

    /// Begin a listening session. Events for the session are sent on `events`,
    /// which always ends with `RecognitionEvent::Ended`.
    fn start(&mut self, events: mpsc::Sender<RecognitionEvent>) -> Result<(), RecognitionError>;

    /// Stop the current session, if any
    fn stop(&mut self);
}

/// Platform without any recognition support
#[derive(Debug, Default)]
pub struct UnavailableBackend;

impl RecognitionBackend for UnavailableBackend {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn start(&mut self, _events: mpsc::Sender<RecognitionEvent>) -> Result<(), RecognitionError> {
        Err(RecognitionError::Unsupported)
    }

    fn stop(&mut self) {}
}

/// Output of an external speech-to-text process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedItem {
    Transcript {
        text: String,
        confidence: f32,
        is_final: bool,
    },
    Error {
        code: String,
    },
}

/// Relays transcripts pushed by an external recognizer
///
/// Items published while no session is running are dropped. A session ends
/// by itself after `session_limit` or right after relaying an error.
pub struct FeedBackend {
    feed: broadcast::Sender<FeedItem>,
    session_limit: Duration,
    task: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl FeedBackend {
    pub fn new(session_limit: Duration) -> Self {
        let (feed, _) = broadcast::channel(64);
        Self {
            feed,
            session_limit,
            task: None,
            stop_tx: None,
        }
    }

    /// Sender used by the IPC server to publish transcripts
    pub fn feed(&self) -> broadcast::Sender<FeedItem> {
        self.feed.clone()
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl RecognitionBackend for FeedBackend {
    fn name(&self) -> &'static str {
        "feed"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn start(&mut self, events: mpsc::Sender<RecognitionEvent>) -> Result<(), RecognitionError> {
        if self.is_running() {
            return Err(RecognitionError::AlreadyRunning);
        }

        let mut feed_rx = self.feed.subscribe();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let limit = self.session_limit;

        let task = tokio::spawn(async move {
            let deadline = tokio::time::sleep(limit);
            tokio::pin!(deadline);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        debug!("feed session stopped");
                        break;
                    }
                    _ = &mut deadline => {
                        debug!("feed session reached its time limit");
                        break;
                    }
                    item = feed_rx.recv() => {
                        let (event, last) = match item {
                            Ok(FeedItem::Transcript { text, confidence, is_final }) => {
                                let event = RecognitionEvent::Result {
                                    alternatives: vec![Alternative { transcript: text, confidence }],
                                    is_final,
                                };
                                (event, false)
                            }
                            Ok(FeedItem::Error { code }) => {
                                (RecognitionEvent::Error(RecognitionErrorKind::from_code(&code)), true)
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "feed receiver lagged");
                                continue;
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        };
                        if events.send(event).await.is_err() {
                            return;
                        }
                        if last {
                            debug!("feed session ended after an error");
                            break;
                        }
                    }
                }
            }

            let _ = events.send(RecognitionEvent::Ended).await;
        });

        self.task = Some(task);
        self.stop_tx = Some(stop_tx);
        info!("feed recognition session started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}
