//! Orientation filter - raw tilt to smoothed look vector
//!
//! The filter is a pure function of `(previous state, sample, dt)`; the
//! `OrientationFilter` wrapper only stores that state between samples, so
//! push-style and poll-style sensors feed it the same way.

use std::time::Duration;

use eyeorb_core::{apply_deadzone, smoothing_factor, FrameTime, OrbError, OrbResult, Vec2};

/// Degrees of left/right tilt mapped to full deflection
const GAMMA_RANGE_DEG: f64 = 45.0;
/// Degrees of front/back tilt mapped to full deflection
const BETA_RANGE_DEG: f64 = 60.0;

/// Orientation pipeline configuration
#[derive(Clone, Debug, PartialEq)]
pub struct OrientationConfig {
    /// Output bound on both axes
    pub clamp_range: f32,
    /// Normalized input magnitude treated as zero
    pub deadzone: f32,
    /// Low-pass time constant τ
    pub smoothing: Duration,
    /// Minimum L1 change that counts as a change
    pub change_threshold: f32,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        OrientationConfig {
            clamp_range: 0.28,
            deadzone: 0.06,
            smoothing: Duration::from_millis(220),
            change_threshold: 0.0015,
        }
    }
}

impl OrientationConfig {
    pub fn validate(&self) -> OrbResult<()> {
        if !(0.0..1.0).contains(&self.deadzone) {
            return Err(OrbError::InvalidConfig(format!(
                "deadzone must be in [0, 1), got {}",
                self.deadzone
            )));
        }
        if !(self.clamp_range > 0.0 && self.clamp_range <= 1.0) {
            return Err(OrbError::InvalidConfig(format!(
                "clamp range must be in (0, 1], got {}",
                self.clamp_range
            )));
        }
        if !(self.change_threshold >= 0.0) {
            return Err(OrbError::InvalidConfig(
                "change threshold must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// One raw sensor reading. Angles in degrees; `None` when the platform has
/// no value yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
    /// Front/back tilt
    pub beta: Option<f64>,
    /// Left/right tilt
    pub gamma: Option<f64>,
    pub timestamp: FrameTime,
}

impl OrientationSample {
    pub fn new(beta: f64, gamma: f64, timestamp: FrameTime) -> Self {
        OrientationSample {
            beta: Some(beta),
            gamma: Some(gamma),
            timestamp,
        }
    }
}

/// Smoothing accumulator
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FilterState {
    pub smoothed: Vec2,
    pub last_sample: Option<FrameTime>,
}

fn degrees(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Normalize, apply the deadzone and clamp. Axes are inverted so the eye
/// appears to hold focus while the device tilts.
pub fn normalize(sample: &OrientationSample, config: &OrientationConfig) -> Vec2 {
    let raw_x = (-degrees(sample.gamma) / GAMMA_RANGE_DEG).clamp(-1.0, 1.0) as f32;
    let raw_y = (-degrees(sample.beta) / BETA_RANGE_DEG).clamp(-1.0, 1.0) as f32;

    Vec2::new(
        apply_deadzone(raw_x, config.deadzone),
        apply_deadzone(raw_y, config.deadzone),
    )
    .clamp_symmetric(config.clamp_range)
}

/// Advance the accumulator towards `target` by the time since the last sample
pub fn step(state: FilterState, target: Vec2, now: FrameTime, config: &OrientationConfig) -> FilterState {
    let dt = state.last_sample.map_or(Duration::ZERO, |last| now.since(last));
    let alpha = smoothing_factor(dt, config.smoothing);

    FilterState {
        smoothed: state.smoothed.lerp(target, alpha),
        last_sample: Some(now),
    }
}

/// Stateful wrapper over [`normalize`] and [`step`]
#[derive(Debug, Clone)]
pub struct OrientationFilter {
    config: OrientationConfig,
    state: FilterState,
    look_target: Vec2,
}

impl OrientationFilter {
    pub fn new(config: OrientationConfig) -> Self {
        OrientationFilter {
            config,
            state: FilterState::default(),
            look_target: Vec2::ZERO,
        }
    }

    pub fn config(&self) -> &OrientationConfig {
        &self.config
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Current smoothed look target
    pub fn look_target(&self) -> Vec2 {
        self.look_target
    }

    /// Process one sample. Returns true when the look target moved enough to
    /// be worth a render.
    pub fn push(&mut self, sample: &OrientationSample) -> bool {
        let target = normalize(sample, &self.config);
        self.state = step(self.state, target, sample.timestamp, &self.config);

        let next = self.state.smoothed;
        let changed = next.l1_distance(self.look_target) > self.config.change_threshold;
        self.look_target = next;
        changed
    }

    /// Drop all accumulated state. No easing back to neutral.
    pub fn reset(&mut self) {
        self.state = FilterState::default();
        self.look_target = Vec2::ZERO;
    }
}

impl Default for OrientationFilter {
    fn default() -> Self {
        Self::new(OrientationConfig::default())
    }
}
