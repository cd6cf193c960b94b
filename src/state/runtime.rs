//! Runtime: owns the session and its resources and executes effects
//!
//! All inputs funnel into one task. Backend start results and other
//! follow-ups are handled in order before the next queued event.

use std::collections::VecDeque;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::capture::MediaCapture;
use crate::config::Config;
use crate::events::{DisplayUpdate, Effect, SessionEvent};
use crate::recognition::{RecognitionBackend, RecognitionEvent};

use super::session::{Session, SessionSnapshot};

/// Composition root for one mirror session
pub struct Runtime {
    config: Config,
    session: Session,
    backend: Box<dyn RecognitionBackend>,
    capture: Box<dyn MediaCapture>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    recognition_tx: mpsc::Sender<RecognitionEvent>,
    recognition_rx: mpsc::Receiver<RecognitionEvent>,
    display_tx: broadcast::Sender<DisplayUpdate>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl Runtime {
    pub fn new(
        config: Config,
        backend: Box<dyn RecognitionBackend>,
        capture: Box<dyn MediaCapture>,
        display_tx: broadcast::Sender<DisplayUpdate>,
    ) -> Self {
        let session = Session::new(&config);
        let (events_tx, events_rx) = mpsc::channel(64);
        let (recognition_tx, recognition_rx) = mpsc::channel(64);
        let (snapshot_tx, _) = watch::channel(session.snapshot());

        Self {
            config,
            session,
            backend,
            capture,
            events_tx,
            events_rx,
            recognition_tx,
            recognition_rx,
            display_tx,
            snapshot_tx,
        }
    }

    /// Sender for manual input and control events
    pub fn events(&self) -> mpsc::Sender<SessionEvent> {
        self.events_tx.clone()
    }

    /// Receiver of session snapshots
    pub fn snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Acquire the camera and bring recognition up
    pub fn init(&mut self) {
        info!(backend = self.backend.name(), "initializing session");
        self.dispatch(SessionEvent::RetryCapture);
    }

    /// Process events and animation frames until the future is dropped
    pub async fn run(&mut self) {
        let mut ticker = time::interval(self.config.timings.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("session loop started");

        loop {
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    self.dispatch(event);
                }
                Some(event) = self.recognition_rx.recv() => {
                    self.dispatch(SessionEvent::Recognition(event));
                }
                _ = ticker.tick() => {
                    self.dispatch(SessionEvent::Tick);
                }
            }
        }
    }

    /// Release the recognition backend and the camera
    pub fn teardown(&mut self) {
        let effects = self.session.teardown();
        for effect in effects {
            self.execute(effect);
        }
        self.backend.stop();
        self.capture.release();
        self.publish();
        info!("session torn down");
    }

    /// Handle one event and every follow-up it produces
    fn dispatch(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let effects = match event {
                SessionEvent::Reset => {
                    let available = self.backend.is_available();
                    self.session.reset(available)
                }
                SessionEvent::RetryCapture => {
                    if self.session.capture_live() {
                        debug!("capture already live");
                        continue;
                    }
                    let result = self.capture.acquire();
                    let available = self.backend.is_available();
                    self.session.on_capture(result, available)
                }
                other => self.session.handle(other),
            };

            for effect in effects {
                if let Some(follow_up) = self.execute(effect) {
                    queue.push_back(follow_up);
                }
            }
        }

        self.publish();
    }

    fn execute(&mut self, effect: Effect) -> Option<SessionEvent> {
        match effect {
            Effect::StartRecognition { best_effort } => {
                match self.backend.start(self.recognition_tx.clone()) {
                    Ok(()) => Some(SessionEvent::Recognition(RecognitionEvent::Started)),
                    Err(e) if best_effort => {
                        debug!(error = %e, "best-effort recognition start failed");
                        Some(SessionEvent::Recognition(RecognitionEvent::Ended))
                    }
                    Err(e) => {
                        warn!(error = %e, "recognition start failed");
                        Some(SessionEvent::Recognition(RecognitionEvent::Error(e.kind())))
                    }
                }
            }
            Effect::StopRecognition => {
                self.backend.stop();
                None
            }
            Effect::Schedule { timer, delay } => {
                let generation = self.session.generation();
                let events_tx = self.events_tx.clone();
                tokio::spawn(async move {
                    time::sleep(delay).await;
                    let _ = events_tx
                        .send(SessionEvent::Timer { generation, timer })
                        .await;
                });
                None
            }
            Effect::Display(update) => {
                if update.is_frame() {
                    trace!(%update, "display");
                } else {
                    debug!(%update, "display");
                }
                let _ = self.display_tx.send(update);
                None
            }
            Effect::Claim(_) | Effect::HaltListening => {
                warn!(?effect, "internal effect leaked out of the session");
                None
            }
        }
    }

    fn publish(&self) {
        let snapshot = self.session.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::capture::{CaptureError, NullCapture};
    use crate::input::ManualTrigger;
    use crate::recognition::{FeedBackend, FeedItem, RecognitionError, UnavailableBackend};

    /// Backend that records calls and never produces events on its own
    #[derive(Clone, Default)]
    struct ScriptedBackend {
        starts: Arc<Mutex<u32>>,
        stops: Arc<Mutex<u32>>,
        fail_starts: bool,
    }

    impl RecognitionBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn start(&mut self, _events: mpsc::Sender<RecognitionEvent>) -> Result<(), RecognitionError> {
            *self.starts.lock().unwrap() += 1;
            if self.fail_starts {
                Err(RecognitionError::Backend("boom".to_string()))
            } else {
                Ok(())
            }
        }

        fn stop(&mut self) {
            *self.stops.lock().unwrap() += 1;
        }
    }

    /// Capture that always fails until told otherwise
    struct FlakyCapture {
        fail: Arc<Mutex<bool>>,
        live: bool,
    }

    impl MediaCapture for FlakyCapture {
        fn acquire(&mut self) -> Result<(), CaptureError> {
            if *self.fail.lock().unwrap() {
                return Err(CaptureError::PermissionDenied);
            }
            self.live = true;
            Ok(())
        }

        fn release(&mut self) {
            self.live = false;
        }

        fn is_live(&self) -> bool {
            self.live
        }
    }

    fn create_runtime(backend: Box<dyn RecognitionBackend>) -> (Runtime, broadcast::Receiver<DisplayUpdate>) {
        let (display_tx, display_rx) = broadcast::channel(1024);
        let runtime = Runtime::new(
            Config::default(),
            backend,
            Box::new(NullCapture::default()),
            display_tx,
        );
        (runtime, display_rx)
    }

    fn drain(rx: &mut broadcast::Receiver<DisplayUpdate>) -> Vec<DisplayUpdate> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn test_init_starts_listening() {
        let backend = ScriptedBackend::default();
        let (mut runtime, _) = create_runtime(Box::new(backend.clone()));
        runtime.init();

        let snapshot = runtime.snapshots().borrow().clone();
        assert!(snapshot.capture_live);
        assert!(snapshot.is_listening);
        assert_eq!(*backend.starts.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_backend_falls_back_and_click_claims() {
        let (mut runtime, mut display_rx) = create_runtime(Box::new(UnavailableBackend));
        runtime.init();
        assert!(runtime.snapshots().borrow().fallback_active);

        runtime.dispatch(SessionEvent::Manual(ManualTrigger::Click { on_mirror: true }));
        assert_eq!(runtime.snapshots().borrow().distortion_level, 1);
        assert!(drain(&mut display_rx)
            .iter()
            .any(|u| matches!(u, DisplayUpdate::Humanity { percentage: 80, level: 1 })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_starts_exhaust_retries() {
        let backend = ScriptedBackend {
            fail_starts: true,
            ..Default::default()
        };
        let (mut runtime, _) = create_runtime(Box::new(backend.clone()));
        let snapshots = runtime.snapshots();
        runtime.init();

        let run = tokio::time::timeout(Duration::from_secs(30), runtime.run());
        let _ = run.await;

        assert!(snapshots.borrow().fallback_active);
        assert_eq!(*backend.starts.lock().unwrap(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verdict_after_five_claims() {
        let backend = ScriptedBackend::default();
        let (mut runtime, mut display_rx) = create_runtime(Box::new(backend.clone()));
        let snapshots = runtime.snapshots();
        let events = runtime.events();
        runtime.init();

        for _ in 0..5 {
            events
                .send(SessionEvent::Manual(ManualTrigger::DebugButton))
                .await
                .unwrap();
        }

        let _ = tokio::time::timeout(Duration::from_secs(5), runtime.run()).await;

        let snapshot = snapshots.borrow().clone();
        assert_eq!(snapshot.distortion_level, 5);
        assert_eq!(snapshot.humanity_percentage, 0);
        assert!(snapshot.verdict_shown);
        assert!(*backend.stops.lock().unwrap() >= 1);

        let updates = drain(&mut display_rx);
        let verdicts = updates
            .iter()
            .filter(|u| matches!(u, DisplayUpdate::VerdictShown))
            .count();
        assert_eq!(verdicts, 1);
        assert!(updates.iter().any(|u| matches!(u, DisplayUpdate::VerdictGlitch { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_verdict() {
        let (mut runtime, _) = create_runtime(Box::new(ScriptedBackend::default()));
        let snapshots = runtime.snapshots();
        let events = runtime.events();
        runtime.init();

        for _ in 0..5 {
            events
                .send(SessionEvent::Manual(ManualTrigger::DebugButton))
                .await
                .unwrap();
        }
        events.send(SessionEvent::Reset).await.unwrap();

        let _ = tokio::time::timeout(Duration::from_secs(5), runtime.run()).await;

        let snapshot = snapshots.borrow().clone();
        assert_eq!(snapshot.distortion_level, 0);
        assert!(!snapshot.verdict_shown);
        assert_eq!(snapshot.generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_phrase_claims() {
        let backend = FeedBackend::new(Duration::from_secs(60));
        let feed = backend.feed();
        let (mut runtime, _) = create_runtime(Box::new(backend));
        let snapshots = runtime.snapshots();
        runtime.init();

        feed.send(FeedItem::Transcript {
            text: "Well, I am a human being, yes".to_string(),
            confidence: 0.92,
            is_final: true,
        })
        .unwrap();

        let _ = tokio::time::timeout(Duration::from_millis(100), runtime.run()).await;
        assert_eq!(snapshots.borrow().distortion_level, 1);
        runtime.teardown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_recovers_from_transient_error() {
        let backend = FeedBackend::new(Duration::from_secs(60));
        let feed = backend.feed();
        let (mut runtime, _) = create_runtime(Box::new(backend));
        let snapshots = runtime.snapshots();
        runtime.init();

        feed.send(FeedItem::Error { code: "no-speech".to_string() }).unwrap();

        let _ = tokio::time::timeout(Duration::from_secs(15), runtime.run()).await;

        let snapshot = snapshots.borrow().clone();
        assert!(!snapshot.fallback_active);
        assert!(snapshot.is_listening);
        assert_eq!(snapshot.retry_count, 0);
        runtime.teardown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_restart_delay_restarts_backend() {
        let backend = ScriptedBackend::default();
        let (mut runtime, _) = create_runtime(Box::new(backend.clone()));
        let snapshots = runtime.snapshots();
        runtime.init();

        runtime.dispatch(SessionEvent::Recognition(RecognitionEvent::Ended));
        runtime.dispatch(SessionEvent::Reset);

        let _ = tokio::time::timeout(Duration::from_secs(5), runtime.run()).await;

        assert_eq!(*backend.starts.lock().unwrap(), 2);
        assert!(snapshots.borrow().is_listening);
    }

    #[tokio::test]
    async fn test_capture_retry() {
        let fail = Arc::new(Mutex::new(true));
        let (display_tx, mut display_rx) = broadcast::channel(64);
        let mut runtime = Runtime::new(
            Config::default(),
            Box::new(ScriptedBackend::default()),
            Box::new(FlakyCapture {
                fail: Arc::clone(&fail),
                live: false,
            }),
            display_tx,
        );

        runtime.init();
        assert!(!runtime.snapshots().borrow().capture_live);
        assert!(drain(&mut display_rx)
            .iter()
            .any(|u| matches!(u, DisplayUpdate::CaptureError { .. })));

        *fail.lock().unwrap() = false;
        runtime.dispatch(SessionEvent::RetryCapture);
        let snapshot = runtime.snapshots().borrow().clone();
        assert!(snapshot.capture_live);
        assert!(snapshot.is_listening);
    }
}
