//! Distortion level, humanity percentage and the verdict

use tracing::{debug, info};

use crate::config::Timings;
use crate::events::{DisplayUpdate, Effect, StatusLabel, Timer};

use super::glitch;
use super::tier::VisualTier;

/// Humanity lost per distortion level
const HUMANITY_STEP: u8 = 20;

/// Humanity percentage for a distortion level
pub fn humanity_for(level: u8) -> u8 {
    100u8.saturating_sub(level.saturating_mul(HUMANITY_STEP))
}

/// Converts claims into escalating distortion
pub struct DistortionController {
    level: u8,
    max_level: u8,
    /// Frames left in the running claim glitch
    glitch_frames_left: u32,
    verdict_shown: bool,
    timings: Timings,
}

impl DistortionController {
    pub fn new(max_level: u8, timings: Timings) -> Self {
        Self {
            level: 0,
            max_level,
            glitch_frames_left: 0,
            verdict_shown: false,
            timings,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn max_level(&self) -> u8 {
        self.max_level
    }

    pub fn humanity(&self) -> u8 {
        humanity_for(self.level)
    }

    pub fn at_ceiling(&self) -> bool {
        self.level >= self.max_level
    }

    pub fn verdict_shown(&self) -> bool {
        self.verdict_shown
    }

    pub fn is_glitching(&self) -> bool {
        self.glitch_frames_left > 0
    }

    /// One claim: raise the level, glitch, and schedule what follows
    pub fn on_claim(&mut self) -> Vec<Effect> {
        if self.at_ceiling() {
            debug!(level = self.level, "claim ignored at maximum distortion");
            return Vec::new();
        }

        self.level += 1;
        self.glitch_frames_left = self.timings.glitch_frames();

        info!(
            level = self.level,
            humanity = self.humanity(),
            "distortion increased"
        );

        let mut effects = vec![
            Effect::display(DisplayUpdate::Humanity {
                percentage: self.humanity(),
                level: self.level,
            }),
            self.tier_effect(VisualTier::for_level(self.level)),
            Effect::status(StatusLabel::Processing),
        ];

        if self.at_ceiling() {
            effects.push(Effect::schedule(Timer::ShowVerdict, self.timings.verdict_delay()));
        } else {
            effects.push(Effect::schedule(Timer::SettleStatus, self.timings.settle_delay()));
        }

        effects
    }

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Effect> {
        match timer {
            Timer::ShowVerdict => self.show_verdict(),
            Timer::StartVerdictGlitch | Timer::VerdictGlitch if self.verdict_shown => vec![
                Effect::display(glitch::verdict_pulse()),
                Effect::schedule(Timer::VerdictGlitch, self.timings.verdict_glitch_interval()),
            ],
            _ => Vec::new(),
        }
    }

    /// Animation frame: claim glitch and ambient noise
    pub fn on_tick(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.glitch_frames_left > 0 {
            self.glitch_frames_left -= 1;
            if self.glitch_frames_left == 0 {
                effects.push(Effect::display(DisplayUpdate::GlitchEnded));
            } else {
                effects.push(Effect::display(glitch::glitch_frame(self.level)));
            }
        }

        if self.level > 0 {
            effects.push(Effect::display(glitch::noise()));
        }

        effects
    }

    /// Back to a clean mirror
    pub fn reset(&mut self) -> Vec<Effect> {
        info!(from = self.level, "distortion reset");
        self.level = 0;
        self.glitch_frames_left = 0;
        self.verdict_shown = false;

        vec![
            Effect::display(DisplayUpdate::Humanity {
                percentage: self.humanity(),
                level: 0,
            }),
            self.tier_effect(None),
            Effect::display(DisplayUpdate::TransformReset),
            Effect::display(DisplayUpdate::VerdictHidden),
            Effect::display(DisplayUpdate::Overlay {
                visible: true,
                instructions: true,
            }),
        ]
    }

    fn show_verdict(&mut self) -> Vec<Effect> {
        if !self.at_ceiling() || self.verdict_shown {
            return Vec::new();
        }
        self.verdict_shown = true;
        info!(level = self.level, "verdict reached");

        vec![
            self.tier_effect(Some(VisualTier::worst())),
            Effect::display(DisplayUpdate::Overlay {
                visible: false,
                instructions: false,
            }),
            Effect::display(DisplayUpdate::VerdictShown),
            Effect::status(StatusLabel::Verdict),
            Effect::HaltListening,
            Effect::schedule(Timer::StartVerdictGlitch, self.timings.verdict_glitch_delay()),
        ]
    }

    fn tier_effect(&self, tier: Option<VisualTier>) -> Effect {
        Effect::display(DisplayUpdate::Tier {
            level: self.level,
            class: tier.map(|t| t.class_name().to_string()),
            filter: tier.map(|t| t.filter().to_string()),
        })
    }
}
