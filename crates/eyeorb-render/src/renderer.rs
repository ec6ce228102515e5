//! Renderer lifecycle - construction, per-frame easing, tier swap, disposal
//!
//! ## Per-frame order
//!
//! ```text
//! dt (clamped) -> activity -> drift -> look -> flash -> uniforms -> draw
//! ```
//!
//! All easing completes before the draw, so every draw observes one
//! consistent state.

use std::time::Duration;

use eyeorb_core::{
    ease_factor, ErrorFlash, FrameTime, OrbError, OrbResult, Phase, RenderTier, Vec2,
};

use crate::backend::{ContextDescriptor, GraphicsContext, GraphicsProvider};
use crate::geometry::SphereMesh;
use crate::shader::{ShaderProgram, Uniforms};
use crate::theme::ThemeSnapshot;

/// Drift angular speeds (rad/s) and amplitude per unit of activity
const DRIFT_SPEED_X: f64 = 0.16;
const DRIFT_SPEED_Y: f64 = 0.13;
const DRIFT_AMPLITUDE: f32 = 0.035;

/// Easing and scheduling constants
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Activity approach rate (1/s)
    pub activity_rate: f32,
    /// Look approach rate (1/s)
    pub look_rate: f32,
    /// Upper bound on a single frame step
    pub max_dt: Duration,
    /// Follow-up delay while easing
    pub frame_delay: Duration,
    /// Follow-up delay while drifting
    pub idle_drift_delay: Duration,
    pub activity_epsilon: f32,
    pub look_epsilon: f32,
    pub flash_epsilon: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            activity_rate: 3.2,
            look_rate: 6.0,
            max_dt: Duration::from_millis(80),
            frame_delay: Duration::from_millis(33),
            idle_drift_delay: Duration::from_millis(40),
            activity_epsilon: 0.004,
            look_epsilon: 0.003,
            flash_epsilon: 0.001,
        }
    }
}

/// Pixel density caps per tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRatioPolicy {
    pub device_pixel_ratio: f32,
    pub high_cap: f32,
    pub medium_cap: f32,
}

impl PixelRatioPolicy {
    pub fn new(device_pixel_ratio: f32) -> Self {
        PixelRatioPolicy {
            device_pixel_ratio,
            ..Default::default()
        }
    }

    pub fn for_tier(&self, tier: RenderTier) -> f32 {
        let cap = match tier {
            RenderTier::High => self.high_cap,
            RenderTier::Medium => self.medium_cap,
        };
        let dpr = if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        dpr.min(cap)
    }
}

impl Default for PixelRatioPolicy {
    fn default() -> Self {
        PixelRatioPolicy {
            device_pixel_ratio: 1.0,
            high_cap: 1.5,
            medium_cap: 1.25,
        }
    }
}

/// Construction options
#[derive(Debug, Clone)]
pub struct RendererOptions {
    pub tier: RenderTier,
    pub reduced_motion: bool,
    pub pixel_ratio: f32,
    pub width: u32,
    pub height: u32,
    pub theme: ThemeSnapshot,
    pub config: RendererConfig,
}

impl RendererOptions {
    pub fn new(tier: RenderTier) -> Self {
        RendererOptions {
            tier,
            reduced_motion: false,
            pixel_ratio: 1.0,
            width: 1,
            height: 1,
            theme: ThemeSnapshot::default(),
            config: RendererConfig::default(),
        }
    }
}

/// What the scheduler should do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub needs_another_frame: bool,
    /// Suggested delay before the next frame, `None` when settled
    pub next_frame_in: Option<Duration>,
}

impl FrameOutcome {
    pub const SETTLED: FrameOutcome = FrameOutcome {
        needs_another_frame: false,
        next_frame_in: None,
    };
}

/// Eased renderer state
#[derive(Debug, Clone)]
struct MotionState {
    last_frame: Option<FrameTime>,
    phase: Phase,
    target_activity: f32,
    activity: f32,
    look: Vec2,
    target_look: Vec2,
    flash: ErrorFlash,
    reduced_motion: bool,
}

/// GPU renderer for one orb surface
pub struct OrbRenderer<C: GraphicsContext> {
    context: Option<C>,
    tier: RenderTier,
    pixel_ratio: f32,
    size: (u32, u32),
    uniforms: Uniforms,
    state: MotionState,
    config: RendererConfig,
    frames: u64,
}

impl<C: GraphicsContext> OrbRenderer<C> {
    /// Create the context, upload geometry and build the program. On any
    /// failure the half-built context is released before returning.
    pub fn new<P>(provider: &mut P, options: RendererOptions) -> OrbResult<Self>
    where
        P: GraphicsProvider<Context = C>,
    {
        let width = options.width.max(1);
        let height = options.height.max(1);
        let descriptor =
            ContextDescriptor::for_tier(options.tier, width, height, options.pixel_ratio);
        let mut context = provider.create_context(&descriptor)?;

        let built = context
            .upload_geometry(&SphereMesh::for_tier(options.tier))
            .and_then(|()| context.build_program(&ShaderProgram::for_tier(options.tier)));
        if let Err(err) = built {
            context.release();
            let _ = context.lose_context();
            return Err(err);
        }

        let idle = Phase::Idle.target_activity();
        let mut uniforms = Uniforms::new(&options.theme, idle);
        uniforms.resolution = [width as f32, height as f32];

        tracing::debug!(tier = %options.tier, width, height, pixel_ratio = options.pixel_ratio, "renderer created");

        Ok(OrbRenderer {
            context: Some(context),
            tier: options.tier,
            pixel_ratio: options.pixel_ratio,
            size: (width, height),
            uniforms,
            state: MotionState {
                last_frame: None,
                phase: Phase::Idle,
                target_activity: idle,
                activity: idle,
                look: Vec2::ZERO,
                target_look: Vec2::ZERO,
                flash: ErrorFlash::new(),
                reduced_motion: options.reduced_motion,
            },
            config: options.config,
            frames: 0,
        })
    }

    pub fn tier(&self) -> RenderTier {
        self.tier
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn activity(&self) -> f32 {
        self.state.activity
    }

    pub fn target_activity(&self) -> f32 {
        self.state.target_activity
    }

    pub fn look(&self) -> Vec2 {
        self.state.look
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Uniforms uploaded by the last frame
    pub fn uniforms(&self) -> &Uniforms {
        &self.uniforms
    }

    pub fn is_disposed(&self) -> bool {
        self.context.is_none()
    }

    /// Resize the drawing buffer. Sizes are floored to at least 1 px.
    pub fn set_size(&mut self, width: f64, height: f64) {
        let sanitize = |v: f64| {
            if v.is_finite() && v >= 1.0 {
                v.floor().min(u32::MAX as f64) as u32
            } else {
                1
            }
        };
        let (w, h) = (sanitize(width), sanitize(height));
        self.size = (w, h);
        self.uniforms.resolution = [w as f32, h as f32];
        if let Some(context) = self.context.as_mut() {
            context.resize(w, h);
        }
    }

    /// Swap program and geometry for `tier` in place and apply the new pixel
    /// ratio. The context is kept.
    pub fn set_tier(&mut self, tier: RenderTier, pixel_ratio: f32) -> OrbResult<()> {
        let context = self.context.as_mut().ok_or(OrbError::Disposed)?;

        if tier != self.tier {
            context.build_program(&ShaderProgram::for_tier(tier))?;
            context.upload_geometry(&SphereMesh::for_tier(tier))?;
            tracing::debug!(from = %self.tier, to = %tier, "renderer tier swapped");
            self.tier = tier;
        }
        if pixel_ratio != self.pixel_ratio {
            context.set_pixel_ratio(pixel_ratio);
            self.pixel_ratio = pixel_ratio;
        }
        Ok(())
    }

    pub fn set_reduced_motion(&mut self, reduced: bool) {
        self.state.reduced_motion = reduced;
    }

    /// Set the phase. `Error` renders as idle; the pulse comes from
    /// [`flash_error`](Self::flash_error).
    pub fn set_phase(&mut self, phase: Phase) {
        let phase = phase.render_phase();
        self.state.phase = phase;
        self.state.target_activity = phase.target_activity();
    }

    pub fn set_look_target(&mut self, look: Vec2) {
        self.state.target_look = if look.is_finite() { look } else { Vec2::ZERO };
    }

    /// Jump the look vector and its target to neutral without easing
    pub fn reset_look(&mut self) {
        self.state.look = Vec2::ZERO;
        self.state.target_look = Vec2::ZERO;
    }

    /// Start the error pulse at `now`, the moment the error was entered.
    /// Frames drawn later see it already decayed.
    pub fn flash_error(&mut self, now: FrameTime) {
        self.state.flash.trigger(now);
    }

    /// Ease, upload and draw one frame
    pub fn update_and_render(&mut self, now: FrameTime) -> OrbResult<FrameOutcome> {
        let context = self.context.as_mut().ok_or(OrbError::Disposed)?;
        let cfg = &self.config;
        let state = &mut self.state;

        let last = state.last_frame.unwrap_or(now);
        state.last_frame = Some(now);
        let dt = now.since(last).min(cfg.max_dt);

        state.activity += (state.target_activity - state.activity) * ease_factor(dt, cfg.activity_rate);

        let micro_motion = !state.reduced_motion && state.phase.has_micro_motion();
        let t = now.as_secs_f64();
        let drift = if micro_motion {
            Vec2::new(
                (t * DRIFT_SPEED_X).sin() as f32,
                (t * DRIFT_SPEED_Y).cos() as f32,
            ) * (DRIFT_AMPLITUDE * state.activity)
        } else {
            Vec2::ZERO
        };

        let desired = state.target_look + drift;
        state.look = state.look.lerp(desired, ease_factor(dt, cfg.look_rate));

        let flash = state.flash.sample(now);

        self.uniforms.time = t as f32;
        self.uniforms.look = state.look;
        self.uniforms.activity = state.activity;
        self.uniforms.error_flash = flash;

        context.draw(&self.uniforms)?;
        self.frames += 1;

        let easing_left = (state.activity - state.target_activity).abs() > cfg.activity_epsilon
            || state.look.distance(desired) > cfg.look_epsilon
            || flash > cfg.flash_epsilon;
        let needs_another_frame = easing_left || micro_motion;
        let next_frame_in = needs_another_frame.then(|| {
            if micro_motion {
                cfg.idle_drift_delay
            } else {
                cfg.frame_delay
            }
        });

        tracing::trace!(?now, activity = state.activity, flash, needs_another_frame, "frame rendered");

        Ok(FrameOutcome {
            needs_another_frame,
            next_frame_in,
        })
    }

    /// Release every GPU resource and signal context loss. Safe to call any
    /// number of times.
    pub fn dispose(&mut self) {
        let Some(mut context) = self.context.take() else {
            return;
        };
        context.release();
        if let Err(err) = context.lose_context() {
            tracing::debug!(error = %err, "context loss signal failed");
        }
        tracing::debug!(tier = %self.tier, frames = self.frames, "renderer disposed");
    }
}

impl<C: GraphicsContext> Drop for OrbRenderer<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{FailurePlan, HeadlessContext, HeadlessProvider};
    use proptest::prelude::*;

    fn renderer(provider: &mut HeadlessProvider, tier: RenderTier) -> OrbRenderer<HeadlessContext> {
        let options = RendererOptions {
            width: 120,
            height: 120,
            ..RendererOptions::new(tier)
        };
        OrbRenderer::new(provider, options).unwrap()
    }

    /// Render at a fixed frame interval until settled or `limit` frames
    fn run(r: &mut OrbRenderer<HeadlessContext>, start: u64, step: u64, limit: u64) -> (u64, FrameOutcome) {
        let mut now = start;
        let mut outcome = FrameOutcome::SETTLED;
        for _ in 0..limit {
            outcome = r.update_and_render(FrameTime::from_millis(now)).unwrap();
            if !outcome.needs_another_frame {
                break;
            }
            now += step;
        }
        (now, outcome)
    }

    #[test]
    fn test_construction_builds_pipeline() {
        let mut provider = HeadlessProvider::new();
        let r = renderer(&mut provider, RenderTier::High);

        let log = provider.log();
        assert_eq!(log.contexts_created, 1);
        assert_eq!(log.programs, vec![RenderTier::High]);
        assert_eq!(log.geometry_segments, vec![64]);
        assert!(log.descriptors[0].antialias);
        assert_eq!(r.activity(), 0.14);
    }

    #[test]
    fn test_construction_failure_releases_context() {
        let mut provider = HeadlessProvider::failing(FailurePlan {
            build_program: true,
            ..Default::default()
        });
        let result = OrbRenderer::new(&mut provider, RendererOptions::new(RenderTier::Medium));

        assert!(matches!(result, Err(OrbError::ProgramBuild(_))));
        let log = provider.log();
        assert_eq!(log.live_contexts(), 0);
        assert_eq!(log.contexts_lost, 1);
    }

    #[test]
    fn test_idle_settles() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::High);

        let outcome = r.update_and_render(FrameTime::from_millis(1_000)).unwrap();
        assert_eq!(outcome, FrameOutcome::SETTLED);
        assert_eq!(provider.log().draws, 1);
    }

    #[test]
    fn test_phase_sequence_targets() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::High);
        let mut now = 0;
        let mut targets = Vec::new();

        for phase in [Phase::Idle, Phase::Thinking, Phase::Streaming, Phase::Idle] {
            r.set_phase(phase);
            targets.push(r.target_activity());
            let (end, _) = run(&mut r, now, 16, 400);
            now = end + 16;
        }

        assert_eq!(targets, vec![0.14, 0.32, 0.42, 0.14]);
    }

    #[test]
    fn test_activity_converges_without_overshoot() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::High);
        r.set_reduced_motion(true);
        r.set_phase(Phase::Streaming);

        let mut previous = r.activity();
        for i in 0..200 {
            r.update_and_render(FrameTime::from_millis(i * 16)).unwrap();
            assert!(r.activity() >= previous);
            assert!(r.activity() <= 0.42 + 1e-6);
            previous = r.activity();
        }
        assert!((r.activity() - 0.42).abs() < 0.004);
    }

    #[test]
    fn test_micro_motion_keeps_frames_coming() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::High);
        r.set_phase(Phase::Thinking);

        let (_, outcome) = run(&mut r, 0, 40, 500);
        assert!(outcome.needs_another_frame);
        assert_eq!(outcome.next_frame_in, Some(Duration::from_millis(40)));

        // Reduced motion removes drift, so the orb settles
        r.set_reduced_motion(true);
        let (_, outcome) = run(&mut r, 20_000, 33, 500);
        assert_eq!(outcome, FrameOutcome::SETTLED);
    }

    #[test]
    fn test_easing_delay_is_frame_delay() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::Medium);
        r.set_look_target(Vec2::new(0.2, 0.0));

        r.update_and_render(FrameTime::from_millis(0)).unwrap();
        let outcome = r.update_and_render(FrameTime::from_millis(16)).unwrap();
        assert_eq!(outcome.next_frame_in, Some(Duration::from_millis(33)));
    }

    #[test]
    fn test_dt_is_clamped() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::High);
        r.set_reduced_motion(true);
        r.set_phase(Phase::Streaming);

        r.update_and_render(FrameTime::from_millis(0)).unwrap();
        r.update_and_render(FrameTime::from_millis(60_000)).unwrap();

        let expected = 0.14 + (0.42 - 0.14) * ease_factor(Duration::from_millis(80), 3.2);
        assert!((r.activity() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_error_flash_pulse() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::High);

        r.update_and_render(FrameTime::from_millis(0)).unwrap();
        r.set_phase(Phase::Error);
        r.flash_error(FrameTime::from_millis(16));

        let first = r.update_and_render(FrameTime::from_millis(16)).unwrap();
        assert_eq!(r.uniforms().error_flash, 1.0);
        assert!(first.needs_another_frame);
        assert_eq!(r.phase(), Phase::Idle);

        r.update_and_render(FrameTime::from_millis(116)).unwrap();
        assert!((r.uniforms().error_flash - 0.75).abs() < 1e-4);

        let last = r.update_and_render(FrameTime::from_millis(16 + 220)).unwrap();
        assert_eq!(r.uniforms().error_flash, 0.0);
        assert_eq!(last, FrameOutcome::SETTLED);
    }

    #[test]
    fn test_flash_entered_long_ago_is_not_drawn() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::High);

        r.flash_error(FrameTime::from_millis(1_000));
        let outcome = r.update_and_render(FrameTime::from_millis(61_000)).unwrap();

        assert_eq!(r.uniforms().error_flash, 0.0);
        assert_eq!(outcome, FrameOutcome::SETTLED);
    }

    #[test]
    fn test_reset_look_is_instant() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::High);
        r.set_look_target(Vec2::new(0.28, -0.28));
        run(&mut r, 0, 16, 30);
        assert_ne!(r.look(), Vec2::ZERO);

        r.reset_look();
        r.update_and_render(FrameTime::from_millis(5_000)).unwrap();
        assert_eq!(r.uniforms().look, Vec2::ZERO);
    }

    #[test]
    fn test_set_size_sanitizes() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::Medium);

        r.set_size(0.4, f64::NAN);
        assert_eq!(r.size(), (1, 1));

        r.set_size(300.9, 150.2);
        assert_eq!(r.size(), (300, 150));
        assert_eq!(r.uniforms().resolution, [300.0, 150.0]);
    }

    #[test]
    fn test_set_tier_swaps_in_place() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::High);
        let policy = PixelRatioPolicy::new(2.0);

        r.set_tier(RenderTier::Medium, policy.for_tier(RenderTier::Medium)).unwrap();

        let log = provider.log();
        assert_eq!(log.contexts_created, 1);
        assert_eq!(log.programs, vec![RenderTier::High, RenderTier::Medium]);
        assert_eq!(log.geometry_segments, vec![64, 48]);
        assert_eq!(log.pixel_ratios, vec![1.25]);
        assert_eq!(r.tier(), RenderTier::Medium);
    }

    #[test]
    fn test_pixel_ratio_policy() {
        let policy = PixelRatioPolicy::new(3.0);
        assert_eq!(policy.for_tier(RenderTier::High), 1.5);
        assert_eq!(policy.for_tier(RenderTier::Medium), 1.25);

        let low_density = PixelRatioPolicy::new(1.0);
        assert_eq!(low_density.for_tier(RenderTier::High), 1.0);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::High);

        r.dispose();
        r.dispose();
        drop(r);

        let log = provider.log();
        assert_eq!(log.contexts_released, 1);
        assert_eq!(log.contexts_lost, 1);
        assert_eq!(log.live_contexts(), 0);
    }

    #[test]
    fn test_disposed_renderer_refuses_work() {
        let mut provider = HeadlessProvider::new();
        let mut r = renderer(&mut provider, RenderTier::High);
        r.dispose();

        assert_eq!(r.update_and_render(FrameTime::ZERO), Err(OrbError::Disposed));
        assert_eq!(r.set_tier(RenderTier::Medium, 1.0), Err(OrbError::Disposed));
    }

    proptest! {
        #[test]
        fn prop_flash_bounded_and_cleared(gaps in proptest::collection::vec(1u64..60, 1..40)) {
            let mut provider = HeadlessProvider::new();
            let mut r = renderer(&mut provider, RenderTier::Medium);
            r.flash_error(FrameTime::ZERO);

            let mut now = 0;
            r.update_and_render(FrameTime::from_millis(now)).unwrap();
            prop_assert_eq!(r.uniforms().error_flash, 1.0);
            for gap in gaps {
                now += gap;
                r.update_and_render(FrameTime::from_millis(now)).unwrap();
                let flash = r.uniforms().error_flash;
                prop_assert!((0.0..=1.0).contains(&flash));
                if now >= 220 {
                    prop_assert_eq!(flash, 0.0);
                }
            }
        }
    }
}
