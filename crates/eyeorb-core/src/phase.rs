//! Agent phases and the edge-triggered error flash
//!
//! Phases are pushed by the chat orchestrator; nothing here transitions on
//! its own. `Error` never becomes a sustained visual state: it renders as
//! idle with a short decaying flash layered on top.

use std::fmt;
use std::time::Duration;

use crate::FrameTime;

/// Externally driven agent phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Thinking,
    Streaming,
    Error,
}

impl Phase {
    /// Activity scalar the renderer eases towards in this phase
    pub fn target_activity(&self) -> f32 {
        match self {
            Self::Idle => 0.14,
            Self::Thinking => 0.32,
            Self::Streaming => 0.42,
            Self::Error => 0.14,
        }
    }

    /// Phase as the renderer sees it (`Error` renders as idle)
    pub fn render_phase(&self) -> Phase {
        match self {
            Self::Error => Self::Idle,
            other => *other,
        }
    }

    /// Phases that animate a slow gaze wander
    pub fn has_micro_motion(&self) -> bool {
        matches!(self, Self::Thinking | Self::Streaming)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Streaming => "streaming",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of pushing a phase into the machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseUpdate {
    /// Phase to hand to the renderer
    pub render_phase: Phase,
    /// Activity target for `render_phase`
    pub target_activity: f32,
    /// True when this update entered `Error` from another phase
    pub flash: bool,
}

/// Edge detector over orchestrator phases
#[derive(Debug, Clone, Default)]
pub struct PhaseMachine {
    current: Phase,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    /// Apply the next phase. Re-entering `Error` while already in `Error`
    /// does not request another flash.
    pub fn apply(&mut self, next: Phase) -> PhaseUpdate {
        let flash = next == Phase::Error && self.current != Phase::Error;
        self.current = next;
        let render_phase = next.render_phase();
        PhaseUpdate {
            render_phase,
            target_activity: render_phase.target_activity(),
            flash,
        }
    }
}

/// One-shot decaying pulse started by entering the error phase.
///
/// `flash = 1 - (elapsed / decay)^2`, clamped to `[0, 1]`, cleared once
/// `elapsed >= clear_after`.
#[derive(Debug, Clone)]
pub struct ErrorFlash {
    started: Option<FrameTime>,
    decay: Duration,
    clear_after: Duration,
}

impl ErrorFlash {
    pub const DECAY: Duration = Duration::from_millis(200);
    pub const CLEAR_AFTER: Duration = Duration::from_millis(220);

    pub fn new() -> Self {
        Self::with_timing(Self::DECAY, Self::CLEAR_AFTER)
    }

    pub fn with_timing(decay: Duration, clear_after: Duration) -> Self {
        ErrorFlash {
            started: None,
            decay,
            clear_after: clear_after.max(decay),
        }
    }

    /// Start (or restart) the pulse at `now`
    pub fn trigger(&mut self, now: FrameTime) {
        self.started = Some(now);
    }

    pub fn is_active(&self) -> bool {
        self.started.is_some()
    }

    /// Flash intensity at `now`; clears the pulse once it has run out
    pub fn sample(&mut self, now: FrameTime) -> f32 {
        let Some(start) = self.started else {
            return 0.0;
        };
        let elapsed = now.since(start);
        let progress = if self.decay.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f32() / self.decay.as_secs_f32()).clamp(0.0, 1.0)
        };
        if elapsed >= self.clear_after {
            self.started = None;
        }
        (1.0 - progress * progress).clamp(0.0, 1.0)
    }

    pub fn clear(&mut self) {
        self.started = None;
    }
}

impl Default for ErrorFlash {
    fn default() -> Self {
        Self::new()
    }
}
