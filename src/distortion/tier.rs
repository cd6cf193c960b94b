//! Visual severity tiers for the mirror feed

/// Discrete visual treatment; exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VisualTier {
    Flicker,
    Shift,
    Smear,
    Fracture,
    Collapse,
}

impl VisualTier {
    /// Tier for a distortion level; level 0 has none, levels past 5 clamp
    pub fn for_level(level: u8) -> Option<Self> {
        match level {
            0 => None,
            1 => Some(Self::Flicker),
            2 => Some(Self::Shift),
            3 => Some(Self::Smear),
            4 => Some(Self::Fracture),
            _ => Some(Self::Collapse),
        }
    }

    /// The worst treatment, kept while the verdict is shown
    pub fn worst() -> Self {
        Self::Collapse
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Flicker => "distortion-level-1",
            Self::Shift => "distortion-level-2",
            Self::Smear => "distortion-level-3",
            Self::Fracture => "distortion-level-4",
            Self::Collapse => "distortion-level-5",
        }
    }

    /// Filter chain applied by the renderer
    pub fn filter(&self) -> &'static str {
        match self {
            Self::Flicker => "contrast(1.1) hue-rotate(15deg)",
            Self::Shift => "contrast(1.3) hue-rotate(45deg) saturate(1.4)",
            Self::Smear => "contrast(1.5) hue-rotate(90deg) saturate(2) blur(1px)",
            Self::Fracture => "contrast(1.8) hue-rotate(150deg) saturate(3) blur(2px) invert(0.2)",
            Self::Collapse => "contrast(2.5) hue-rotate(200deg) saturate(4) blur(3px) invert(0.8)",
        }
    }
}
