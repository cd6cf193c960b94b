//! Unix domain socket server for IPC
//!
//! Provides request-response communication and pushes display updates to
//! subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::events::{DisplayUpdate, SessionEvent};
use crate::recognition::FeedItem;
use crate::state::SessionSnapshot;

use super::protocol::{
    Notification, Request, Response, Route, SessionStatus, MAX_MESSAGE_LEN,
};

/// Everything a client handler needs
#[derive(Clone)]
struct Shared {
    events_tx: mpsc::Sender<SessionEvent>,
    snapshots: watch::Receiver<SessionSnapshot>,
    display_tx: broadcast::Sender<DisplayUpdate>,
    feed: Option<broadcast::Sender<FeedItem>>,
    start_time: Instant,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        events_tx: mpsc::Sender<SessionEvent>,
        snapshots: watch::Receiver<SessionSnapshot>,
        display_tx: broadcast::Sender<DisplayUpdate>,
        feed: Option<broadcast::Sender<FeedItem>>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            shared: Arc::new(Shared {
                events_tx,
                snapshots,
                display_tx,
                feed,
                start_time: Instant::now(),
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let shared = Arc::clone(&self.shared);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, shared) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    ///
    /// Requests are read on a separate task so that pushing notifications
    /// never interrupts a partially read frame.
    async fn handle_client(stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (request_tx, mut request_rx) = mpsc::channel::<Request>(16);

        let reader_task = tokio::spawn(async move {
            loop {
                match read_message::<_, Request>(&mut reader).await {
                    Ok(Some(request)) => {
                        if request_tx.send(request).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("client disconnected");
                        break;
                    }
                    Err(e) => {
                        warn!(?e, "dropping client after bad request");
                        break;
                    }
                }
            }
        });

        let mut updates: Option<broadcast::Receiver<DisplayUpdate>> = None;

        let result: Result<()> = async {
            loop {
                tokio::select! {
                    request = request_rx.recv() => {
                        let Some(request) = request else {
                            return Ok(());
                        };
                        debug!(?request, "received request");

                        let (response, subscribe) = Self::process_request(request, &shared).await;
                        if subscribe && updates.is_none() {
                            updates = Some(shared.display_tx.subscribe());
                            debug!("client subscribed to display updates");
                        }
                        send_message(&mut writer, &response).await?;
                    }
                    update = recv_update(&mut updates) => {
                        match update {
                            Ok(update) => {
                                send_message(&mut writer, &Notification::Display { update }).await?;
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "subscriber lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                updates = None;
                            }
                        }
                    }
                }
            }
        }
        .await;

        reader_task.abort();
        result
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, shared: &Shared) -> (Response, bool) {
        match request.route() {
            Route::Local => match request {
                Request::Ping => (Response::Pong, false),
                Request::Subscribe => (Response::Subscribed, true),
                _ => {
                    let snapshot = shared.snapshots.borrow().clone();
                    let uptime = shared.start_time.elapsed().as_secs();
                    (Response::Status(SessionStatus::new(snapshot, uptime)), false)
                }
            },

            Route::Session(event) => {
                if shared.events_tx.send(event).await.is_err() {
                    return (error_response("session_closed", "session is not running"), false);
                }
                (Response::Accepted, false)
            }

            Route::Feed(item) => match &shared.feed {
                Some(feed) => {
                    // No receivers just means no session is listening right now
                    let _ = feed.send(item);
                    (Response::Accepted, false)
                }
                None => (
                    error_response("no_feed", "recognition feed is not enabled"),
                    false,
                ),
            },
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

fn error_response(code: &str, message: &str) -> Response {
    Response::Error {
        code: code.to_string(),
        message: message.to_string(),
    }
}

/// Wait for the next display update, or forever when not subscribed
async fn recv_update(
    updates: &mut Option<broadcast::Receiver<DisplayUpdate>>,
) -> Result<DisplayUpdate, broadcast::error::RecvError> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Read one length-prefixed JSON message; `None` on clean EOF
async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: serde::de::DeserializeOwned,
{
    let mut len_buf = [0u8; 4];

    // Read message length (4-byte little-endian)
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        anyhow::bail!("message too large ({len} bytes)");
    }

    // Read message body
    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;

    let message = serde_json::from_slice(&msg_buf).context("failed to parse message")?;
    Ok(Some(message))
}

/// Send a length-prefixed JSON message
async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}
