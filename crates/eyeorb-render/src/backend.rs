//! Graphics backend seam
//!
//! A provider creates contexts; a context owns every GPU resource of one
//! renderer. The renderer drives the context strictly in this order:
//! create, upload geometry, build program, then any number of draws, then
//! release.

use eyeorb_core::{OrbResult, RenderTier};

use crate::geometry::SphereMesh;
use crate::shader::{ShaderProgram, Uniforms};

/// GPU power hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerPreference {
    HighPerformance,
    LowPower,
}

/// Context creation options
#[derive(Debug, Clone, PartialEq)]
pub struct ContextDescriptor {
    pub tier: RenderTier,
    /// CSS pixels
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub antialias: bool,
    pub power_preference: PowerPreference,
    /// Cleared to fully transparent so the host shows through
    pub transparent: bool,
}

impl ContextDescriptor {
    pub fn for_tier(tier: RenderTier, width: u32, height: u32, pixel_ratio: f32) -> Self {
        let high = tier == RenderTier::High;
        ContextDescriptor {
            tier,
            width: width.max(1),
            height: height.max(1),
            pixel_ratio,
            antialias: high,
            power_preference: if high {
                PowerPreference::HighPerformance
            } else {
                PowerPreference::LowPower
            },
            transparent: true,
        }
    }

    pub fn backing_size(&self) -> (u32, u32) {
        backing_size(self.width, self.height, self.pixel_ratio)
    }
}

/// Device pixels for a CSS size at `pixel_ratio`, at least 1x1
pub fn backing_size(width: u32, height: u32, pixel_ratio: f32) -> (u32, u32) {
    let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
        pixel_ratio
    } else {
        1.0
    };
    let scale = |v: u32| ((v as f32 * ratio).floor() as u32).max(1);
    (scale(width), scale(height))
}

/// Creates graphics contexts
pub trait GraphicsProvider {
    type Context: GraphicsContext;

    fn create_context(&mut self, descriptor: &ContextDescriptor) -> OrbResult<Self::Context>;
}

/// One renderer's GPU resources
pub trait GraphicsContext {
    /// Change the resolution scaler without recreating the context
    fn set_pixel_ratio(&mut self, pixel_ratio: f32);

    /// Resize the drawing buffer. Sizes are already sanitized.
    fn resize(&mut self, width: u32, height: u32);

    /// Replace the sphere geometry
    fn upload_geometry(&mut self, mesh: &SphereMesh) -> OrbResult<()>;

    /// Replace the shader program
    fn build_program(&mut self, program: &ShaderProgram) -> OrbResult<()>;

    /// Upload uniforms and issue one draw
    fn draw(&mut self, uniforms: &Uniforms) -> OrbResult<()>;

    /// Free all resources. Called at most once per context.
    fn release(&mut self);

    /// Best-effort signal that the context will not be used again
    fn lose_context(&mut self) -> OrbResult<()>;
}
