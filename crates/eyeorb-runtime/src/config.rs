//! Settings - every tunable in one serde document
//!
//! Durations are integer milliseconds. Missing fields take their defaults,
//! so `{}` is a valid document.

use std::path::Path;
use std::time::Duration;

use eyeorb_core::{OrbError, OrbResult};
use eyeorb_input::OrientationConfig;
use eyeorb_probe::FpsProbeConfig;
use eyeorb_render::{PixelRatioPolicy, RendererConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrientationSettings {
    pub clamp_range: f32,
    pub deadzone: f32,
    pub smoothing_ms: u64,
    pub change_threshold: f32,
}

impl Default for OrientationSettings {
    fn default() -> Self {
        let config = OrientationConfig::default();
        OrientationSettings {
            clamp_range: config.clamp_range,
            deadzone: config.deadzone,
            smoothing_ms: config.smoothing.as_millis() as u64,
            change_threshold: config.change_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FpsProbeSettings {
    pub duration_ms: u64,
    pub high_min_fps: f64,
    pub medium_min_fps: f64,
}

impl Default for FpsProbeSettings {
    fn default() -> Self {
        let config = FpsProbeConfig::default();
        FpsProbeSettings {
            duration_ms: config.duration.as_millis() as u64,
            high_min_fps: config.high_min_fps,
            medium_min_fps: config.medium_min_fps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererSettings {
    pub activity_rate: f32,
    pub look_rate: f32,
    pub max_dt_ms: u64,
    pub frame_delay_ms: u64,
    pub idle_drift_delay_ms: u64,
    pub activity_epsilon: f32,
    pub look_epsilon: f32,
    pub flash_epsilon: f32,
}

impl Default for RendererSettings {
    fn default() -> Self {
        let config = RendererConfig::default();
        RendererSettings {
            activity_rate: config.activity_rate,
            look_rate: config.look_rate,
            max_dt_ms: config.max_dt.as_millis() as u64,
            frame_delay_ms: config.frame_delay.as_millis() as u64,
            idle_drift_delay_ms: config.idle_drift_delay.as_millis() as u64,
            activity_epsilon: config.activity_epsilon,
            look_epsilon: config.look_epsilon,
            flash_epsilon: config.flash_epsilon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PixelRatioSettings {
    pub device_pixel_ratio: f32,
    pub high_cap: f32,
    pub medium_cap: f32,
}

impl Default for PixelRatioSettings {
    fn default() -> Self {
        let policy = PixelRatioPolicy::default();
        PixelRatioSettings {
            device_pixel_ratio: policy.device_pixel_ratio,
            high_cap: policy.high_cap,
            medium_cap: policy.medium_cap,
        }
    }
}

/// All orb settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrbSettings {
    pub orientation: OrientationSettings,
    pub fps_probe: FpsProbeSettings,
    pub renderer: RendererSettings,
    pub pixel_ratio: PixelRatioSettings,
}

fn invalid(message: impl Into<String>) -> OrbError {
    OrbError::InvalidConfig(message.into())
}

fn require_positive(name: &str, value: f64) -> OrbResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be positive, got {value}")))
    }
}

impl OrbSettings {
    /// Parse and validate a JSON document
    pub fn from_json_str(raw: &str) -> OrbResult<Self> {
        let settings: OrbSettings =
            serde_json::from_str(raw).map_err(|err| invalid(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> OrbResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| invalid(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> OrbResult<()> {
        self.orientation_config().validate()?;

        let fps = &self.fps_probe;
        require_positive("fps_probe.duration_ms", fps.duration_ms as f64)?;
        require_positive("fps_probe.high_min_fps", fps.high_min_fps)?;
        require_positive("fps_probe.medium_min_fps", fps.medium_min_fps)?;

        let r = &self.renderer;
        require_positive("renderer.activity_rate", r.activity_rate as f64)?;
        require_positive("renderer.look_rate", r.look_rate as f64)?;
        require_positive("renderer.max_dt_ms", r.max_dt_ms as f64)?;
        require_positive("renderer.frame_delay_ms", r.frame_delay_ms as f64)?;
        require_positive("renderer.idle_drift_delay_ms", r.idle_drift_delay_ms as f64)?;
        require_positive("renderer.activity_epsilon", r.activity_epsilon as f64)?;
        require_positive("renderer.look_epsilon", r.look_epsilon as f64)?;
        require_positive("renderer.flash_epsilon", r.flash_epsilon as f64)?;

        let p = &self.pixel_ratio;
        require_positive("pixel_ratio.device_pixel_ratio", p.device_pixel_ratio as f64)?;
        require_positive("pixel_ratio.high_cap", p.high_cap as f64)?;
        require_positive("pixel_ratio.medium_cap", p.medium_cap as f64)?;
        Ok(())
    }

    pub fn orientation_config(&self) -> OrientationConfig {
        let o = &self.orientation;
        OrientationConfig {
            clamp_range: o.clamp_range,
            deadzone: o.deadzone,
            smoothing: Duration::from_millis(o.smoothing_ms),
            change_threshold: o.change_threshold,
        }
    }

    pub fn fps_probe_config(&self) -> FpsProbeConfig {
        let f = &self.fps_probe;
        FpsProbeConfig {
            duration: Duration::from_millis(f.duration_ms),
            high_min_fps: f.high_min_fps,
            medium_min_fps: f.medium_min_fps,
        }
    }

    pub fn renderer_config(&self) -> RendererConfig {
        let r = &self.renderer;
        RendererConfig {
            activity_rate: r.activity_rate,
            look_rate: r.look_rate,
            max_dt: Duration::from_millis(r.max_dt_ms),
            frame_delay: Duration::from_millis(r.frame_delay_ms),
            idle_drift_delay: Duration::from_millis(r.idle_drift_delay_ms),
            activity_epsilon: r.activity_epsilon,
            look_epsilon: r.look_epsilon,
            flash_epsilon: r.flash_epsilon,
        }
    }

    pub fn pixel_ratio_policy(&self) -> PixelRatioPolicy {
        let p = &self.pixel_ratio;
        PixelRatioPolicy {
            device_pixel_ratio: p.device_pixel_ratio,
            high_cap: p.high_cap,
            medium_cap: p.medium_cap,
        }
    }
}
