//! Terminal keyboard listener
//!
//! Reads lines from stdin on a dedicated thread and forwards each one as a
//! key press. The thread blocks in `read_line`, so `stop()` takes effect on
//! the next line or when stdin closes.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::SessionEvent;

use super::keys::{key_from_line, ManualTrigger};

/// Forwards terminal key presses to the session
pub struct KeyboardListener {
    event_tx: mpsc::Sender<SessionEvent>,
    running: Arc<AtomicBool>,
}

impl KeyboardListener {
    /// Create a new keyboard listener
    pub fn new(event_tx: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the reader thread
    pub fn start(&self) -> Result<(), InputError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(InputError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("keyboard-listener".to_string())
            .spawn(move || {
                info!("keyboard listener thread started");

                let stdin = std::io::stdin();
                if let Err(e) = forward_lines(stdin.lock(), &event_tx, &running) {
                    warn!(%e, "keyboard listener stopped");
                }

                running.store(false, Ordering::SeqCst);
                info!("keyboard listener thread stopped");
            })
            .map_err(|e| InputError::ThreadSpawn(e.to_string()))?;

        Ok(())
    }

    /// Ask the reader thread to exit
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the keyboard listener
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("keyboard listener is already running")]
    AlreadyRunning,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("failed to read terminal input: {0}")]
    Read(#[from] std::io::Error),

    #[error("session channel closed")]
    ChannelClosed,
}

/// Forward every line of `reader` as a key press until EOF or stop
fn forward_lines(
    mut reader: impl BufRead,
    event_tx: &mpsc::Sender<SessionEvent>,
    running: &AtomicBool,
) -> Result<(), InputError> {
    let mut line = String::new();

    while running.load(Ordering::SeqCst) {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            debug!("terminal input closed");
            break;
        }

        let name = key_from_line(&line);
        debug!(key = %name, "key pressed");

        // Not in an async context here
        event_tx
            .blocking_send(SessionEvent::Manual(ManualTrigger::Key { name }))
            .map_err(|_| InputError::ChannelClosed)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = KeyboardListener::new(tx);
        assert!(!listener.is_running());
    }

    #[test]
    fn test_forward_lines() {
        let (tx, mut rx) = mpsc::channel(8);
        let running = AtomicBool::new(true);
        let input = std::io::Cursor::new("  \nh\n");

        forward_lines(input, &tx, &running).unwrap();

        let names: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| match event {
                SessionEvent::Manual(ManualTrigger::Key { name }) => name,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(names, vec!["Space".to_string(), "h".to_string()]);
    }

    #[test]
    fn test_forward_lines_closed_channel() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let running = AtomicBool::new(true);
        let result = forward_lines(std::io::Cursor::new("x\n"), &tx, &running);
        assert!(matches!(result, Err(InputError::ChannelClosed)));
    }
}
