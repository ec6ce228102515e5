//! Quality tiers and the one-way degradation ladder
//!
//! - High: full shader, orientation input, micro-motion
//! - Medium: reduced shader, no orientation input
//! - Low: static fallback, no GPU resources
//!
//! Within a session the tier only ever moves down the ladder.

use std::fmt;

/// Rendering quality level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityTier {
    /// Static fallback representation
    Low = 0,
    /// GPU rendering with a reduced program
    Medium = 1,
    /// GPU rendering with the full program and orientation input
    High = 2,
}

impl QualityTier {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Next lower tier, `None` at the floor
    pub fn degrade(&self) -> Option<Self> {
        match self {
            Self::High => Some(Self::Medium),
            Self::Medium => Some(Self::Low),
            Self::Low => None,
        }
    }

    /// Whether this tier owns a GPU renderer
    pub fn is_rendered(&self) -> bool {
        !matches!(self, Self::Low)
    }

    /// The renderer-facing tier, `None` for the static fallback
    pub fn render_tier(&self) -> Option<RenderTier> {
        match self {
            Self::High => Some(RenderTier::High),
            Self::Medium => Some(RenderTier::Medium),
            Self::Low => None,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tier of a live renderer. `Low` is unrepresentable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTier {
    High,
    Medium,
}

impl RenderTier {
    pub fn quality(&self) -> QualityTier {
        match self {
            Self::High => QualityTier::High,
            Self::Medium => QualityTier::Medium,
        }
    }
}

impl From<RenderTier> for QualityTier {
    fn from(tier: RenderTier) -> Self {
        tier.quality()
    }
}

impl fmt::Display for RenderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.quality().fmt(f)
    }
}

/// Why a tier was capped or lowered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DowngradeReason {
    /// No graphics context could be created
    NoGraphics,
    /// Capability detection itself failed
    DetectionFailed,
    /// The user prefers reduced motion
    PrefersReducedMotion,
    /// Device memory hint at or below the threshold
    LowDeviceMemory,
    /// Only the basic graphics API is available
    BasicGraphicsOnly,
    /// The FPS probe measured too few frames
    LowFrameRate,
    /// Building or driving the GPU pipeline failed
    PipelineFailure,
    /// Orientation consent was denied
    OrientationDenied,
}

impl DowngradeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoGraphics => "no_graphics",
            Self::DetectionFailed => "detection_failed",
            Self::PrefersReducedMotion => "prefers_reduced_motion",
            Self::LowDeviceMemory => "low_device_memory",
            Self::BasicGraphicsOnly => "basic_graphics_only",
            Self::LowFrameRate => "low_frame_rate",
            Self::PipelineFailure => "pipeline_failure",
            Self::OrientationDenied => "orientation_denied",
        }
    }
}

impl fmt::Display for DowngradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single applied downgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierChange {
    pub from: QualityTier,
    pub to: QualityTier,
    pub reason: DowngradeReason,
}

/// Session tier state with a single writer.
///
/// Requests that would keep or raise the tier are rejected, so every
/// accepted change is strictly downward.
#[derive(Debug, Clone)]
pub struct TierLadder {
    current: QualityTier,
    history: Vec<TierChange>,
}

impl TierLadder {
    pub fn new(initial: QualityTier) -> Self {
        TierLadder {
            current: initial,
            history: Vec::new(),
        }
    }

    pub fn tier(&self) -> QualityTier {
        self.current
    }

    /// Applied changes, oldest first
    pub fn history(&self) -> &[TierChange] {
        &self.history
    }

    /// Lower the tier to `target`. Returns the change when one was applied.
    pub fn lower_to(&mut self, target: QualityTier, reason: DowngradeReason) -> Option<TierChange> {
        if target >= self.current {
            return None;
        }
        let change = TierChange {
            from: self.current,
            to: target,
            reason,
        };
        self.current = target;
        self.history.push(change);
        Some(change)
    }

    /// Lower the tier by one step
    pub fn step_down(&mut self, reason: DowngradeReason) -> Option<TierChange> {
        let target = self.current.degrade()?;
        self.lower_to(target, reason)
    }

    pub fn is_terminal(&self) -> bool {
        self.current == QualityTier::Low
    }
}
