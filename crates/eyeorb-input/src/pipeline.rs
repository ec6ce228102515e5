//! Orientation pipeline - consent, enable state and filtering together
//!
//! Samples are only consumed while the pipeline is enabled and consent is
//! granted. Disabling resets the look vector and the smoothing accumulator
//! at once, so re-enabling starts from neutral instead of stale drift.

use eyeorb_core::{OrbResult, Vec2};

use crate::{
    OrientationConfig, OrientationFilter, OrientationSample, PermissionDecision, PermissionGate,
    PermissionState, PermissionStore, SensorPlatform,
};

/// Orientation input pipeline
pub struct OrientationPipeline<P, S> {
    gate: PermissionGate<P, S>,
    filter: OrientationFilter,
    enabled: bool,
}

impl<P: SensorPlatform, S: PermissionStore> OrientationPipeline<P, S> {
    pub fn new(platform: P, store: S, config: OrientationConfig) -> Self {
        OrientationPipeline {
            gate: PermissionGate::new(platform, store),
            filter: OrientationFilter::new(config),
            enabled: false,
        }
    }

    /// Enable or disable input. Disabling is an instantaneous reset.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            tracing::debug!(enabled, "orientation input toggled");
        }
        self.enabled = enabled;
        if !enabled {
            self.filter.reset();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enabled and consented
    pub fn is_active(&self) -> bool {
        self.enabled && self.gate.allows_input()
    }

    /// Feed one sample. Returns true when a render is worth scheduling.
    pub fn push(&mut self, sample: &OrientationSample) -> bool {
        if !self.is_active() {
            return false;
        }
        self.filter.push(sample)
    }

    /// Drain a batch of samples, e.g. everything a poll-style sensor buffered
    /// since the last frame. Returns true if any sample signalled a change.
    pub fn consume<I>(&mut self, samples: I) -> bool
    where
        I: IntoIterator<Item = OrientationSample>,
    {
        samples
            .into_iter()
            .fold(false, |changed, sample| self.push(&sample) | changed)
    }

    /// Current look target, neutral while disabled
    pub fn look_target(&self) -> Vec2 {
        self.filter.look_target()
    }

    pub fn is_supported(&self) -> bool {
        self.gate.is_supported()
    }

    pub fn needs_permission(&self) -> bool {
        self.gate.needs_permission()
    }

    pub fn permission_state(&self) -> PermissionState {
        self.gate.state()
    }

    pub fn request_permission(&mut self) -> PermissionState {
        self.gate.request()
    }

    pub fn complete_permission(&mut self, outcome: OrbResult<PermissionDecision>) -> PermissionState {
        self.gate.complete_request(outcome)
    }

    pub fn config(&self) -> &OrientationConfig {
        self.filter.config()
    }

    pub fn platform_mut(&mut self) -> &mut P {
        self.gate.platform_mut()
    }
}
