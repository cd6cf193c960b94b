//! glitch-mirror: session daemon for the glitch-mirror installation
//!
//! The mirror renderer shows a live camera feed that glitches a little more
//! every time the visitor claims to be human. This daemon provides:
//! - Recognition lifecycle with restart, bounded retry and manual fallback
//! - Distortion state machine ending in the verdict
//! - Manual triggers from the terminal and over IPC
//! - IPC server pushing display updates to the renderer
//!
//! Not in scope:
//! - Rendering itself, audio amplitude analysis, persistence

mod capture;
mod config;
mod distortion;
mod events;
mod input;
mod ipc;
mod lifecycle;
mod recognition;
mod state;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::capture::{DeviceCapture, MediaCapture, NullCapture};
use crate::config::{BackendKind, Config};
use crate::events::DisplayUpdate;
use crate::input::KeyboardListener;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::recognition::{FeedBackend, RecognitionBackend, UnavailableBackend};
use crate::state::Runtime;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "glitch-mirror starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        backend = ?config.backend,
        device = ?config.capture_device,
        "configuration loaded"
    );

    // Create shutdown signal handler
    let mut shutdown = ShutdownSignal::new()?;

    // Session -> renderer
    let (display_tx, _display_rx) = broadcast::channel::<DisplayUpdate>(256);

    // Recognition backend; the feed sender lets IPC clients relay transcripts
    let (backend, feed) = match config.backend {
        BackendKind::Feed => {
            let backend = FeedBackend::new(config.timings.session_limit());
            let feed = backend.feed();
            (Box::new(backend) as Box<dyn RecognitionBackend>, Some(feed))
        }
        BackendKind::None => (Box::new(UnavailableBackend) as Box<dyn RecognitionBackend>, None),
    };

    let capture: Box<dyn MediaCapture> = match &config.capture_device {
        Some(path) => Box::new(DeviceCapture::new(path)),
        None => Box::new(NullCapture::default()),
    };

    let mut runtime = Runtime::new(config.clone(), backend, capture, display_tx.clone());

    // Terminal key presses (runs on dedicated thread)
    let keyboard = KeyboardListener::new(runtime.events());
    match keyboard.start() {
        Ok(()) => {
            info!(key = %config.fallback_key, "keyboard listener started");
        }
        Err(e) => {
            error!(?e, "failed to start keyboard listener");
            warn!("continuing without terminal input - use IPC clicks instead");
        }
    }

    let server = Server::new(
        &config.socket_path,
        runtime.events(),
        runtime.snapshots(),
        display_tx,
        feed,
    )?;

    runtime.init();

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        _ = runtime.run() => {
            info!("session loop exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    keyboard.stop();
    runtime.teardown();
    server.shutdown().await;

    info!("glitch-mirror stopped");

    Ok(())
}
