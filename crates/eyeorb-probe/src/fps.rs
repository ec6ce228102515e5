//! FPS probe - one measured warmup after the first renderer construction
//!
//! The probe is a pure state machine over delivered frame timestamps. It owns
//! no timers: when frames stop arriving it simply stops advancing.

use std::time::Duration;

use eyeorb_core::{FrameTime, QualityTier, RenderTier};

/// FPS probe configuration
///
/// The thresholds are tuned heuristics, not correctness guarantees.
#[derive(Clone, Debug, PartialEq)]
pub struct FpsProbeConfig {
    /// Measured (visible) time to sample
    pub duration: Duration,
    /// `High` below this rate drops to `Medium`
    pub high_min_fps: f64,
    /// `Medium` below this rate drops to `Low`
    pub medium_min_fps: f64,
}

impl Default for FpsProbeConfig {
    fn default() -> Self {
        FpsProbeConfig {
            duration: Duration::from_millis(2000),
            high_min_fps: 50.0,
            medium_min_fps: 42.0,
        }
    }
}

impl FpsProbeConfig {
    /// Tier this measurement supports, when lower than `tier`
    pub fn downgrade_for(&self, tier: RenderTier, fps: f64) -> Option<QualityTier> {
        match tier {
            RenderTier::High if fps < self.high_min_fps => Some(QualityTier::Medium),
            RenderTier::Medium if fps < self.medium_min_fps => Some(QualityTier::Low),
            _ => None,
        }
    }
}

/// Outcome of a finished probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsVerdict {
    pub fps: f64,
    pub frames: u32,
    pub measured: Duration,
    /// Tier that was measured
    pub tier: RenderTier,
    /// Lower tier to switch to, if the measurement was too slow
    pub downgrade_to: Option<QualityTier>,
}

/// What the host should do after delivering a frame to the probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeStep {
    /// Render this frame and request another
    Measuring,
    /// Page hidden: request another frame, render nothing, count nothing
    Paused,
    /// Measurement complete
    Finished(FpsVerdict),
}

/// FPS probe
#[derive(Debug, Clone)]
pub struct FpsProbe {
    config: FpsProbeConfig,
    tier: RenderTier,
    frames: u32,
    measured: Duration,
    last_counted: Option<FrameTime>,
    paused: bool,
    verdict: Option<FpsVerdict>,
}

impl FpsProbe {
    pub fn new(config: FpsProbeConfig, tier: RenderTier) -> Self {
        FpsProbe {
            config,
            tier,
            frames: 0,
            measured: Duration::ZERO,
            last_counted: None,
            paused: false,
            verdict: None,
        }
    }

    pub fn tier(&self) -> RenderTier {
        self.tier
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn measured(&self) -> Duration {
        self.measured
    }

    pub fn verdict(&self) -> Option<FpsVerdict> {
        self.verdict
    }

    pub fn is_finished(&self) -> bool {
        self.verdict.is_some()
    }

    /// Pause without a frame, for hosts that stop delivering frames while
    /// hidden instead of reporting hidden frames.
    pub fn pause(&mut self) {
        if self.verdict.is_none() {
            self.paused = true;
        }
    }

    /// Feed one delivered frame.
    ///
    /// Every visible frame after the first is counted together with the full
    /// gap since the previous one. Hidden frames pause the measurement; the
    /// first visible frame after a pause only sets a new base.
    pub fn on_frame(&mut self, now: FrameTime, visible: bool) -> ProbeStep {
        if let Some(verdict) = self.verdict {
            return ProbeStep::Finished(verdict);
        }

        if !visible {
            if !self.paused {
                tracing::debug!(frames = self.frames, "fps probe paused");
            }
            self.paused = true;
            return ProbeStep::Paused;
        }

        if let (Some(last), false) = (self.last_counted, self.paused) {
            self.measured += now.since(last);
            self.frames += 1;
        }
        self.paused = false;
        self.last_counted = Some(now);

        if self.measured < self.config.duration || self.measured.is_zero() {
            return ProbeStep::Measuring;
        }

        let fps = self.frames as f64 / self.measured.as_secs_f64();
        let verdict = FpsVerdict {
            fps,
            frames: self.frames,
            measured: self.measured,
            tier: self.tier,
            downgrade_to: self.config.downgrade_for(self.tier, fps),
        };
        tracing::debug!(
            tier = %self.tier,
            fps,
            frames = self.frames,
            "fps probe finished"
        );
        self.verdict = Some(verdict);
        ProbeStep::Finished(verdict)
    }
}
