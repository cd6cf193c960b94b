//! Randomized animation frames

use crate::events::DisplayUpdate;

/// Maximum positional jitter per level, in pixels
const JITTER_PER_LEVEL: f32 = 6.0;
/// Upper bound for ambient noise opacity
const MAX_NOISE_OPACITY: f32 = 0.1;

fn unit() -> f32 {
    rand::random::<f32>()
}

/// Symmetric random value in `-amplitude..amplitude`
fn jitter(amplitude: f32) -> f32 {
    (unit() * 2.0 - 1.0) * amplitude
}

/// One frame of the claim glitch: random offset and hue rotation
pub fn glitch_frame(level: u8) -> DisplayUpdate {
    let amplitude = JITTER_PER_LEVEL * f32::from(level.max(1));
    DisplayUpdate::GlitchFrame {
        dx: jitter(amplitude),
        dy: jitter(amplitude),
        hue: unit() * 360.0,
    }
}

/// New ambient noise opacity
pub fn noise() -> DisplayUpdate {
    DisplayUpdate::Noise {
        opacity: unit() * MAX_NOISE_OPACITY,
    }
}

/// One pulse of the verdict text glitch
pub fn verdict_pulse() -> DisplayUpdate {
    DisplayUpdate::VerdictGlitch {
        skew: jitter(20.0),
        offset: jitter(8.0),
    }
}
