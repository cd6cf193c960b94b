//! Session reducer
//!
//! Owns the recognition manager, the distortion controller and the timer
//! generation. Every input goes through `handle` (or `on_capture`/`reset`),
//! every output is an `Effect` for the runtime.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capture::CaptureError;
use crate::config::Config;
use crate::distortion::DistortionController;
use crate::events::{ClaimSource, DisplayUpdate, Effect, SessionEvent, StatusLabel, Timer};
use crate::input::{key_matches, ManualTrigger};
use crate::recognition::{RecognitionManager, RecognitionState};

/// Read-only snapshot of the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub distortion_level: u8,
    pub max_distortion_level: u8,
    pub humanity_percentage: u8,
    pub is_listening: bool,
    pub fallback_active: bool,
    pub retry_count: u32,
    pub verdict_shown: bool,
    pub capture_live: bool,
    pub status: String,
    pub generation: u64,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            distortion_level: 0,
            max_distortion_level: 5,
            humanity_percentage: 100,
            is_listening: false,
            fallback_active: false,
            retry_count: 0,
            verdict_shown: false,
            capture_live: false,
            status: StatusLabel::default().to_string(),
            generation: 0,
        }
    }
}

/// One visitor session at the mirror
pub struct Session {
    recognition: RecognitionManager,
    distortion: DistortionController,
    /// Bumped on every reset; timers from older generations are dropped
    generation: u64,
    capture_live: bool,
    fallback_key: String,
    debug_trigger: bool,
    status: StatusLabel,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self {
            recognition: RecognitionManager::new(
                config.max_retries,
                config.recognizer.clone(),
                config.timings.clone(),
            ),
            distortion: DistortionController::new(
                config.max_distortion_level,
                config.timings.clone(),
            ),
            generation: 0,
            capture_live: false,
            fallback_key: config.fallback_key.clone(),
            debug_trigger: config.debug_trigger,
            status: StatusLabel::Initializing,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn capture_live(&self) -> bool {
        self.capture_live
    }

    #[cfg(test)]
    pub fn recognition_state(&self) -> RecognitionState {
        self.recognition.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            distortion_level: self.distortion.level(),
            max_distortion_level: self.distortion.max_level(),
            humanity_percentage: self.distortion.humanity(),
            is_listening: self.recognition.is_listening(),
            fallback_active: self.recognition.fallback_active(),
            retry_count: self.recognition.retry_count(),
            verdict_shown: self.distortion.verdict_shown(),
            capture_live: self.capture_live,
            status: self.status.to_string(),
            generation: self.generation,
        }
    }

    /// Outcome of a camera acquisition attempt
    ///
    /// Recognition is only initialized once the feed is live.
    pub fn on_capture(
        &mut self,
        result: Result<(), CaptureError>,
        recognition_available: bool,
    ) -> Vec<Effect> {
        match result {
            Ok(()) => {
                let first = !self.capture_live;
                self.capture_live = true;
                let mut effects = vec![
                    Effect::display(DisplayUpdate::CaptureReady),
                    Effect::display(DisplayUpdate::Overlay {
                        visible: true,
                        instructions: true,
                    }),
                ];
                if first && self.recognition.state() == RecognitionState::Uninitialized {
                    effects.extend(self.recognition.init(recognition_available));
                }
                self.route(effects)
            }
            Err(e) => {
                warn!(error = %e, "camera acquisition failed");
                self.capture_live = false;
                self.route(vec![
                    Effect::display(DisplayUpdate::CaptureError {
                        message: e.user_message().to_string(),
                        retryable: true,
                    }),
                    Effect::status(StatusLabel::CaptureFailed),
                ])
            }
        }
    }

    /// Process one event
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::Manual(trigger) => match self.claim_source(&trigger) {
                Some(source) => self.claim(source),
                None => {
                    debug!(?trigger, "manual trigger ignored");
                    Vec::new()
                }
            },
            SessionEvent::Recognition(event) => {
                let effects = self.recognition.on_event(event);
                self.route(effects)
            }
            SessionEvent::Timer { generation, timer } => self.on_timer(generation, timer),
            SessionEvent::Tick => {
                if !self.capture_live {
                    return Vec::new();
                }
                self.distortion.on_tick()
            }
            SessionEvent::Visibility { hidden } => {
                let effects = self.recognition.set_hidden(hidden);
                self.route(effects)
            }
            SessionEvent::Reset | SessionEvent::RetryCapture => {
                warn!(?event, "control event must be handled by the runtime");
                Vec::new()
            }
        }
    }

    /// Back to a clean mirror; `recognition_available` is a fresh probe
    pub fn reset(&mut self, recognition_available: bool) -> Vec<Effect> {
        self.generation += 1;
        info!(generation = self.generation, "session reset");

        let mut effects = self.distortion.reset();
        if self.capture_live {
            effects.extend(self.recognition.reset(recognition_available));
        } else {
            self.recognition.clear_retries();
        }
        self.route(effects)
    }

    /// Release everything before the process exits
    pub fn teardown(&mut self) -> Vec<Effect> {
        self.generation += 1;
        self.capture_live = false;
        let effects = self.recognition.halt();
        self.route(effects)
    }

    fn claim_source(&self, trigger: &ManualTrigger) -> Option<ClaimSource> {
        let fallback = self.recognition.fallback_active();
        match trigger {
            ManualTrigger::Key { name } if fallback && key_matches(name, &self.fallback_key) => {
                Some(ClaimSource::Key)
            }
            ManualTrigger::Click { on_mirror: true } if fallback => Some(ClaimSource::MirrorClick),
            ManualTrigger::DebugButton if self.debug_trigger => Some(ClaimSource::DebugButton),
            _ => None,
        }
    }

    fn claim(&mut self, source: ClaimSource) -> Vec<Effect> {
        if !self.capture_live {
            debug!(?source, "claim ignored without a live mirror");
            return Vec::new();
        }
        info!(?source, "claim");
        let effects = self.distortion.on_claim();
        self.route(effects)
    }

    fn on_timer(&mut self, generation: u64, timer: Timer) -> Vec<Effect> {
        if generation != self.generation {
            debug!(?timer, generation, current = self.generation, "dropping stale timer");
            return Vec::new();
        }

        let effects = match timer {
            Timer::RestartRecognition | Timer::RetryRecognition | Timer::EnterFallback => {
                self.recognition.on_timer(timer)
            }
            Timer::SettleStatus => {
                if self.distortion.at_ceiling() {
                    Vec::new()
                } else {
                    vec![Effect::status(self.recognition.idle_label())]
                }
            }
            Timer::ShowVerdict | Timer::StartVerdictGlitch | Timer::VerdictGlitch => {
                self.distortion.on_timer(timer)
            }
        };
        self.route(effects)
    }

    /// Resolve internal effects and remember the last status
    fn route(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut out = Vec::with_capacity(effects.len());
        for effect in effects {
            match effect {
                Effect::Claim(source) => {
                    let more = self.claim(source);
                    out.extend(more);
                }
                Effect::HaltListening => {
                    let more = self.recognition.halt();
                    out.extend(self.route(more));
                }
                Effect::Display(DisplayUpdate::Status { ref label, .. }) => {
                    self.status = label.clone();
                    out.push(effect);
                }
                other => out.push(other),
            }
        }
        out
    }
}
