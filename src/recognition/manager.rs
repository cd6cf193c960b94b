//! Recognition lifecycle state machine
//!
//! Handles transitions between Uninitialized, Starting, Listening, Erroring,
//! Paused, Stopped and Fallback. The manager never touches the backend
//! directly; it returns effects for the runtime to execute.

use tracing::{debug, info, warn};

use crate::config::{RecognizerOptions, Timings};
use crate::events::{ClaimSource, DisplayUpdate, Effect, StatusLabel, Timer};

use super::error::RecognitionErrorKind;
use super::phrases::PhraseMatcher;
use super::{Alternative, RecognitionEvent};

/// Lifecycle states of the listening session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionState {
    /// Capability not probed yet
    Uninitialized,
    /// Start requested, waiting for confirmation
    Starting,
    /// Session active
    Listening,
    /// An error is being recovered from
    Erroring,
    /// Surface hidden, listening suspended
    Paused,
    /// Halted by the verdict
    Stopped,
    /// Manual input only, until reset
    Fallback,
}

impl Default for RecognitionState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl std::fmt::Display for RecognitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognitionState::Uninitialized => write!(f, "Uninitialized"),
            RecognitionState::Starting => write!(f, "Starting"),
            RecognitionState::Listening => write!(f, "Listening"),
            RecognitionState::Erroring => write!(f, "Erroring"),
            RecognitionState::Paused => write!(f, "Paused"),
            RecognitionState::Stopped => write!(f, "Stopped"),
            RecognitionState::Fallback => write!(f, "Fallback"),
        }
    }
}

/// Keeps a continuous listening session alive
pub struct RecognitionManager {
    state: RecognitionState,
    retry_count: u32,
    max_retries: u32,
    /// A restart after a natural end is already scheduled
    restart_pending: bool,
    /// A permanent error was seen; only the fallback timer may act now
    fallback_pending: bool,
    matcher: PhraseMatcher,
    options: RecognizerOptions,
    timings: Timings,
}

impl RecognitionManager {
    pub fn new(max_retries: u32, options: RecognizerOptions, timings: Timings) -> Self {
        Self {
            state: RecognitionState::Uninitialized,
            retry_count: 0,
            max_retries,
            restart_pending: false,
            fallback_pending: false,
            matcher: PhraseMatcher::new(),
            options,
            timings,
        }
    }

    pub fn state(&self) -> RecognitionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_listening(&self) -> bool {
        self.state == RecognitionState::Listening
    }

    pub fn fallback_active(&self) -> bool {
        self.state == RecognitionState::Fallback
    }

    /// Label for the current input method
    pub fn idle_label(&self) -> StatusLabel {
        if self.fallback_active() {
            StatusLabel::Fallback
        } else {
            StatusLabel::Listening
        }
    }

    /// Probe result decides between listening and fallback
    pub fn init(&mut self, available: bool) -> Vec<Effect> {
        if !available {
            info!("speech recognition unavailable, using manual fallback");
            return self.enter_fallback();
        }
        self.start()
    }

    pub fn on_event(&mut self, event: RecognitionEvent) -> Vec<Effect> {
        match event {
            RecognitionEvent::Started => self.on_started(),
            RecognitionEvent::Result {
                alternatives,
                is_final,
            } => self.on_result(&alternatives, is_final),
            RecognitionEvent::Error(kind) => self.on_error(kind),
            RecognitionEvent::Ended => self.on_ended(),
        }
    }

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Effect> {
        match (timer, self.state) {
            (Timer::RestartRecognition, RecognitionState::Listening | RecognitionState::Starting) => {
                self.restart_pending = false;
                self.start()
            }
            (Timer::RestartRecognition, _) => {
                self.restart_pending = false;
                Vec::new()
            }
            (Timer::RetryRecognition, RecognitionState::Erroring) if !self.fallback_pending => {
                self.start()
            }
            (Timer::EnterFallback, state)
                if self.fallback_pending
                    && !matches!(state, RecognitionState::Stopped | RecognitionState::Fallback) =>
            {
                self.enter_fallback()
            }
            (timer, state) => {
                debug!(?timer, %state, "ignoring recognition timer");
                Vec::new()
            }
        }
    }

    /// Stop listening for good (verdict reached)
    pub fn halt(&mut self) -> Vec<Effect> {
        if self.state == RecognitionState::Fallback {
            return Vec::new();
        }
        self.transition_to(RecognitionState::Stopped);
        self.restart_pending = false;
        self.fallback_pending = false;
        vec![Effect::StopRecognition]
    }

    /// Suspend or resume listening when the surface visibility changes
    pub fn set_hidden(&mut self, hidden: bool) -> Vec<Effect> {
        match (hidden, self.state) {
            (true, RecognitionState::Listening | RecognitionState::Starting) => {
                self.transition_to(RecognitionState::Paused);
                vec![Effect::StopRecognition, Effect::status(StatusLabel::Paused)]
            }
            (false, RecognitionState::Paused) => {
                self.transition_to(RecognitionState::Starting);
                vec![
                    Effect::status(StatusLabel::Starting),
                    Effect::StartRecognition { best_effort: true },
                ]
            }
            _ => Vec::new(),
        }
    }

    /// Reset the retry budget and listen again if the capability is available
    ///
    /// A live session is kept. A session waiting on a restart (whose timer
    /// the reset just invalidated) is started right away. While hidden the
    /// manager stays paused and the visibility resume starts it.
    pub fn reset(&mut self, available: bool) -> Vec<Effect> {
        let restart_pending = std::mem::take(&mut self.restart_pending);
        self.retry_count = 0;
        self.fallback_pending = false;

        if !available {
            return self.enter_fallback();
        }

        match self.state {
            RecognitionState::Listening if !restart_pending => {
                vec![Effect::status(StatusLabel::Listening)]
            }
            RecognitionState::Starting if !restart_pending => {
                vec![Effect::status(StatusLabel::Starting)]
            }
            RecognitionState::Paused => vec![Effect::status(StatusLabel::Paused)],
            _ => self.start(),
        }
    }

    /// Clear the retry budget without touching the session
    pub fn clear_retries(&mut self) {
        self.retry_count = 0;
    }

    fn start(&mut self) -> Vec<Effect> {
        self.transition_to(RecognitionState::Starting);
        vec![
            Effect::status(StatusLabel::Starting),
            Effect::StartRecognition { best_effort: false },
        ]
    }

    fn on_started(&mut self) -> Vec<Effect> {
        match self.state {
            RecognitionState::Starting => {
                self.transition_to(RecognitionState::Listening);
                self.retry_count = 0;
                vec![Effect::status(StatusLabel::Listening)]
            }
            RecognitionState::Listening => Vec::new(),
            state => {
                // Start confirmed after we stopped wanting it
                debug!(%state, "recognition started while not wanted, stopping");
                vec![Effect::StopRecognition]
            }
        }
    }

    fn on_result(&mut self, alternatives: &[Alternative], is_final: bool) -> Vec<Effect> {
        if self.state != RecognitionState::Listening {
            debug!(state = %self.state, "ignoring result outside listening");
            return Vec::new();
        }
        if !is_final && !self.options.interim_results {
            return Vec::new();
        }

        let considered = &alternatives[..alternatives.len().min(self.options.max_alternatives.max(1))];
        let matched = if is_final {
            self.matcher
                .first_matching(considered.iter().map(|a| a.transcript.as_str()))
        } else {
            None
        };

        let mut effects = Vec::new();
        if self.options.show_debug_feedback {
            let shown = matched
                .and_then(|index| considered.get(index))
                .or_else(|| considered.first());
            if let Some(alternative) = shown {
                effects.push(Effect::display(DisplayUpdate::Transcript {
                    text: alternative.transcript.clone(),
                    confidence: alternative.confidence,
                    is_final,
                    matched: matched.is_some(),
                }));
            }
        }

        if let Some(index) = matched {
            let alternative = &considered[index];
            info!(
                transcript = %alternative.transcript,
                confidence = alternative.confidence,
                "trigger phrase recognized"
            );
            effects.push(Effect::Claim(ClaimSource::Phrase));
        }

        effects
    }

    fn on_error(&mut self, kind: RecognitionErrorKind) -> Vec<Effect> {
        match self.state {
            RecognitionState::Stopped | RecognitionState::Paused | RecognitionState::Fallback => {
                debug!(%kind, state = %self.state, "ignoring recognition error");
                return Vec::new();
            }
            _ if self.fallback_pending => {
                debug!(%kind, "fallback already pending, ignoring recognition error");
                return Vec::new();
            }
            _ => {}
        }

        // A backend may keep its session open after reporting an error
        self.transition_to(RecognitionState::Erroring);
        self.restart_pending = false;
        let mut effects = vec![Effect::StopRecognition];

        if kind.is_transient() {
            self.retry_count += 1;
            if self.retry_count < self.max_retries {
                warn!(
                    %kind,
                    attempt = self.retry_count,
                    max = self.max_retries,
                    "transient recognition error, retrying"
                );
                effects.push(Effect::status(StatusLabel::Retrying {
                    attempt: self.retry_count,
                    max: self.max_retries,
                }));
                effects.push(Effect::schedule(
                    Timer::RetryRecognition,
                    self.timings.retry_delay(),
                ));
                effects
            } else {
                warn!(%kind, retries = self.retry_count, "recognition retries exhausted");
                self.enter_fallback()
            }
        } else {
            warn!(%kind, "permanent recognition error");
            self.fallback_pending = true;
            effects.extend([
                Effect::display(DisplayUpdate::RecognitionMessage {
                    message: kind.user_message().to_string(),
                }),
                Effect::status(StatusLabel::RecognitionFailed),
                Effect::schedule(Timer::EnterFallback, self.timings.fallback_delay()),
            ]);
            effects
        }
    }

    fn on_ended(&mut self) -> Vec<Effect> {
        match self.state {
            RecognitionState::Listening | RecognitionState::Starting if !self.restart_pending => {
                self.restart_pending = true;
                debug!("recognition ended, scheduling restart");
                vec![Effect::schedule(
                    Timer::RestartRecognition,
                    self.timings.restart_delay(),
                )]
            }
            _ => Vec::new(),
        }
    }

    fn enter_fallback(&mut self) -> Vec<Effect> {
        self.transition_to(RecognitionState::Fallback);
        self.retry_count = 0;
        self.restart_pending = false;
        self.fallback_pending = false;
        vec![Effect::StopRecognition, Effect::status(StatusLabel::Fallback)]
    }

    fn transition_to(&mut self, new_state: RecognitionState) {
        if self.state != new_state {
            info!(from = %self.state, to = %new_state, "recognition transition");
            self.state = new_state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_manager() -> RecognitionManager {
        RecognitionManager::new(5, RecognizerOptions::default(), Timings::default())
    }

    fn listening_manager() -> RecognitionManager {
        let mut manager = create_manager();
        manager.init(true);
        manager.on_event(RecognitionEvent::Started);
        manager
    }

    fn result(text: &str, is_final: bool) -> RecognitionEvent {
        RecognitionEvent::Result {
            alternatives: vec![Alternative {
                transcript: text.to_string(),
                confidence: 0.8,
            }],
            is_final,
        }
    }

    fn claims(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::Claim(ClaimSource::Phrase)))
            .count()
    }

    #[test]
    fn test_initial_state() {
        let manager = create_manager();
        assert_eq!(manager.state(), RecognitionState::Uninitialized);
        assert!(!manager.is_listening());
    }

    #[test]
    fn test_unavailable_goes_straight_to_fallback() {
        let mut manager = create_manager();
        let effects = manager.init(false);
        assert_eq!(manager.state(), RecognitionState::Fallback);
        assert!(effects.iter().all(|e| !matches!(e, Effect::Schedule { .. })));
        assert!(effects.contains(&Effect::status(StatusLabel::Fallback)));
    }

    #[test]
    fn test_start_then_listening() {
        let mut manager = create_manager();
        let effects = manager.init(true);
        assert_eq!(manager.state(), RecognitionState::Starting);
        assert!(effects.contains(&Effect::StartRecognition { best_effort: false }));

        manager.on_event(RecognitionEvent::Started);
        assert!(manager.is_listening());
        assert_eq!(manager.retry_count(), 0);
    }

    #[test]
    fn test_matching_final_result_claims_once() {
        let mut manager = listening_manager();
        let effects = manager.on_event(RecognitionEvent::Result {
            alternatives: vec![
                Alternative { transcript: "I am human".into(), confidence: 0.9 },
                Alternative { transcript: "I'm human".into(), confidence: 0.5 },
            ],
            is_final: true,
        });
        assert_eq!(claims(&effects), 1);
    }

    #[test]
    fn test_interim_results_never_claim() {
        let mut manager = RecognitionManager::new(
            5,
            RecognizerOptions {
                interim_results: true,
                max_alternatives: 1,
                show_debug_feedback: true,
            },
            Timings::default(),
        );
        manager.init(true);
        manager.on_event(RecognitionEvent::Started);

        let effects = manager.on_event(result("i am human", false));
        assert_eq!(claims(&effects), 0);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Display(DisplayUpdate::Transcript { is_final: false, .. })
        )));
    }

    #[test]
    fn test_alternatives_beyond_limit_ignored() {
        let mut manager = RecognitionManager::new(
            5,
            RecognizerOptions {
                interim_results: false,
                max_alternatives: 1,
                show_debug_feedback: false,
            },
            Timings::default(),
        );
        manager.init(true);
        manager.on_event(RecognitionEvent::Started);
        let effects = manager.on_event(RecognitionEvent::Result {
            alternatives: vec![
                Alternative { transcript: "hi there".into(), confidence: 0.9 },
                Alternative { transcript: "i am human".into(), confidence: 0.2 },
            ],
            is_final: true,
        });
        assert_eq!(claims(&effects), 0);
    }

    #[test]
    fn test_natural_end_schedules_single_restart() {
        let mut manager = listening_manager();
        let effects = manager.on_event(RecognitionEvent::Ended);
        assert_eq!(
            effects,
            vec![Effect::schedule(Timer::RestartRecognition, Timings::default().restart_delay())]
        );
        assert_eq!(manager.state(), RecognitionState::Listening);
        assert!(manager.on_event(RecognitionEvent::Ended).is_empty());

        let effects = manager.on_timer(Timer::RestartRecognition);
        assert_eq!(manager.state(), RecognitionState::Starting);
        assert!(effects.contains(&Effect::StartRecognition { best_effort: false }));
    }

    #[test]
    fn test_transient_errors_retry_then_fallback() {
        let mut manager = create_manager();
        manager.init(true);

        for attempt in 1..5 {
            let effects = manager.on_event(RecognitionEvent::Error(RecognitionErrorKind::NoSpeech));
            assert_eq!(manager.state(), RecognitionState::Erroring);
            assert_eq!(manager.retry_count(), attempt);
            assert!(effects.contains(&Effect::schedule(
                Timer::RetryRecognition,
                Timings::default().retry_delay()
            )));
            manager.on_timer(Timer::RetryRecognition);
            assert_eq!(manager.state(), RecognitionState::Starting);
        }

        manager.on_event(RecognitionEvent::Error(RecognitionErrorKind::Aborted));
        assert!(manager.fallback_active());
        assert_eq!(manager.retry_count(), 0);
    }

    #[test]
    fn test_successful_start_clears_retries() {
        let mut manager = listening_manager();
        manager.on_event(RecognitionEvent::Error(RecognitionErrorKind::NoSpeech));
        manager.on_event(RecognitionEvent::Ended);
        assert_eq!(manager.retry_count(), 1);

        manager.on_timer(Timer::RetryRecognition);
        manager.on_event(RecognitionEvent::Started);
        assert_eq!(manager.retry_count(), 0);
        assert!(manager.is_listening());
    }

    #[test]
    fn test_end_during_error_does_not_restart() {
        let mut manager = listening_manager();
        manager.on_event(RecognitionEvent::Error(RecognitionErrorKind::NoSpeech));
        assert!(manager.on_event(RecognitionEvent::Ended).is_empty());
    }

    #[test]
    fn test_permanent_error_falls_back_after_delay() {
        let mut manager = listening_manager();
        let effects = manager.on_event(RecognitionEvent::Error(RecognitionErrorKind::NotAllowed));
        assert_eq!(manager.state(), RecognitionState::Erroring);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Display(DisplayUpdate::RecognitionMessage { .. })
        )));
        assert!(effects.contains(&Effect::schedule(
            Timer::EnterFallback,
            Timings::default().fallback_delay()
        )));

        manager.on_timer(Timer::EnterFallback);
        assert!(manager.fallback_active());
    }

    #[test]
    fn test_halt_ignores_later_events() {
        let mut manager = listening_manager();
        assert_eq!(manager.halt(), vec![Effect::StopRecognition]);
        assert!(manager.on_event(RecognitionEvent::Ended).is_empty());
        assert!(manager.on_event(result("i am human", true)).is_empty());
        assert!(manager.on_timer(Timer::RestartRecognition).is_empty());
        assert_eq!(manager.state(), RecognitionState::Stopped);
    }

    #[test]
    fn test_visibility_pause_and_resume() {
        let mut manager = listening_manager();
        manager.set_hidden(true);
        assert_eq!(manager.state(), RecognitionState::Paused);
        let effects = manager.set_hidden(false);
        assert!(effects.contains(&Effect::StartRecognition { best_effort: true }));
        assert_eq!(manager.state(), RecognitionState::Starting);
    }

    #[test]
    fn test_errors_stop_the_backend_session() {
        let mut manager = listening_manager();
        let effects = manager.on_event(RecognitionEvent::Error(RecognitionErrorKind::NoSpeech));
        assert_eq!(effects.first(), Some(&Effect::StopRecognition));

        let mut manager = listening_manager();
        let effects = manager.on_event(RecognitionEvent::Error(RecognitionErrorKind::AudioCapture));
        assert_eq!(effects.first(), Some(&Effect::StopRecognition));
    }

    #[test]
    fn test_permanent_error_wins_over_pending_retry() {
        let mut manager = listening_manager();
        manager.on_event(RecognitionEvent::Error(RecognitionErrorKind::NoSpeech));
        manager.on_event(RecognitionEvent::Error(RecognitionErrorKind::NotAllowed));

        assert!(manager.on_timer(Timer::RetryRecognition).is_empty());
        assert_eq!(manager.state(), RecognitionState::Erroring);
        assert!(manager
            .on_event(RecognitionEvent::Error(RecognitionErrorKind::Aborted))
            .is_empty());

        manager.on_timer(Timer::EnterFallback);
        assert!(manager.fallback_active());
    }

    #[test]
    fn test_fallback_timer_applies_after_restart_raced_ahead() {
        let mut manager = create_manager();
        manager.init(true);
        manager.on_event(RecognitionEvent::Error(RecognitionErrorKind::NoSpeech));
        manager.on_timer(Timer::RetryRecognition);
        manager.on_event(RecognitionEvent::Error(RecognitionErrorKind::NotAllowed));

        // A start confirmation that was already in flight
        manager.on_event(RecognitionEvent::Started);

        let effects = manager.on_timer(Timer::EnterFallback);
        assert!(manager.fallback_active());
        assert!(effects.contains(&Effect::StopRecognition));
    }

    #[test]
    fn test_reset_during_restart_delay_starts_again() {
        let mut manager = listening_manager();
        manager.on_event(RecognitionEvent::Ended);

        let effects = manager.reset(true);
        assert_eq!(manager.state(), RecognitionState::Starting);
        assert!(effects.contains(&Effect::StartRecognition { best_effort: false }));

        manager.on_event(RecognitionEvent::Started);
        assert!(manager.is_listening());
    }

    #[test]
    fn test_reset_keeps_live_session() {
        let mut manager = listening_manager();
        let effects = manager.reset(true);
        assert_eq!(effects, vec![Effect::status(StatusLabel::Listening)]);
        assert!(manager.is_listening());
    }

    #[test]
    fn test_reset_while_hidden_stays_paused() {
        let mut manager = listening_manager();
        manager.set_hidden(true);

        let effects = manager.reset(true);
        assert_eq!(manager.state(), RecognitionState::Paused);
        assert!(!effects.iter().any(|e| matches!(e, Effect::StartRecognition { .. })));

        let effects = manager.set_hidden(false);
        assert!(effects.contains(&Effect::StartRecognition { best_effort: true }));
    }

    #[test]
    fn test_reset_reprobes_capability() {
        let mut manager = create_manager();
        manager.init(false);

        manager.reset(false);
        assert!(manager.fallback_active());

        let effects = manager.reset(true);
        assert_eq!(manager.state(), RecognitionState::Starting);
        assert!(effects.contains(&Effect::StartRecognition { best_effort: false }));
    }
}
