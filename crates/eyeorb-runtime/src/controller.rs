//! Orb controller - the single writer of tier state
//!
//! The controller owns every component and reacts to host signals:
//!
//! ```text
//! host signal        controller                     components
//! ───────────        ──────────                     ──────────
//! mount        ───▶  capability probe ─▶ tier  ───▶ renderer, fps probe
//! phase        ───▶  phase machine             ───▶ renderer.set_phase/flash
//! visibility   ───▶  cancel / reschedule       ───▶ orientation enable
//! orientation  ───▶  filter                    ───▶ schedule
//! frame/timer  ───▶  scheduler ticket check    ───▶ renderer.update_and_render
//! ```
//!
//! Failures inside any component are contained here: they are logged and
//! the tier drops to the static fallback. Nothing is returned to the host.

use std::fmt;
use std::time::Duration;

use eyeorb_core::{
    DowngradeReason, FrameTime, OrbError, Phase, PhaseMachine, QualityTier, TierChange,
    TierLadder, Vec2,
};
use eyeorb_input::{
    OrientationPipeline, OrientationSample, PermissionDecision, PermissionState, PermissionStore,
    SensorPlatform,
};
use eyeorb_probe::{CapabilityProbe, Environment, FpsProbe, FpsProbeConfig, ProbeStep, QualityDecision};
use eyeorb_render::{
    FrameOutcome, GraphicsProvider, OrbRenderer, PixelRatioPolicy, RendererConfig, RendererOptions,
    ThemeSnapshot,
};

use crate::config::OrbSettings;
use crate::host::{FrameHandle, FrameHost, TimerHandle};
use crate::scheduler::{FrameScheduler, ScheduleGate, ScheduleOutcome, SchedulerStats};

/// What the host should composite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceView {
    /// The renderer's drawable
    Rendered,
    /// The static representation
    StaticFallback,
}

impl fmt::Display for SurfaceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rendered => f.write_str("rendered"),
            Self::StaticFallback => f.write_str("static_fallback"),
        }
    }
}

/// What happened to a delivered frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameReport {
    /// Not the pending ticket
    Stale,
    /// Accepted but nothing to draw (hidden or no renderer)
    Skipped,
    /// Regular frame
    Rendered(FrameOutcome),
    /// FPS probe frame
    Probed(ProbeStep),
    /// The renderer failed and the controller fell back
    Failed,
}

/// Host state at mount time
#[derive(Debug, Clone)]
pub struct MountOptions {
    pub settings: OrbSettings,
    pub theme: ThemeSnapshot,
    /// Container size in CSS pixels
    pub width: f64,
    pub height: f64,
    pub visible: bool,
    pub phase: Phase,
}

impl Default for MountOptions {
    fn default() -> Self {
        MountOptions {
            settings: OrbSettings::default(),
            theme: ThemeSnapshot::default(),
            width: 256.0,
            height: 256.0,
            visible: true,
            phase: Phase::Idle,
        }
    }
}

/// Orchestrates capability, tier, renderer, scheduling and input
pub struct OrbController<H, G, P, S>
where
    H: FrameHost,
    G: GraphicsProvider,
    P: SensorPlatform,
    S: PermissionStore,
{
    host: H,
    provider: G,
    orientation: OrientationPipeline<P, S>,
    decision: QualityDecision,
    ladder: TierLadder,
    renderer: Option<OrbRenderer<G::Context>>,
    scheduler: FrameScheduler,
    probe: Option<FpsProbe>,
    probe_started: bool,
    phases: PhaseMachine,
    reduced_motion: bool,
    visible: bool,
    size: (f64, f64),
    theme: ThemeSnapshot,
    renderer_config: RendererConfig,
    fps_config: FpsProbeConfig,
    pixel_policy: PixelRatioPolicy,
    mounted: bool,
}

impl<H, G, P, S> OrbController<H, G, P, S>
where
    H: FrameHost,
    G: GraphicsProvider,
    P: SensorPlatform,
    S: PermissionStore,
{
    /// Probe capabilities, pick the initial tier and build the renderer
    pub fn mount<E>(env: &E, host: H, provider: G, platform: P, store: S, options: MountOptions) -> Self
    where
        E: Environment + ?Sized,
    {
        let decision = CapabilityProbe::new().decide(env);
        let settings = &options.settings;

        let mut phases = PhaseMachine::new();
        phases.apply(options.phase);

        let mut controller = OrbController {
            host,
            provider,
            orientation: OrientationPipeline::new(platform, store, settings.orientation_config()),
            ladder: TierLadder::new(decision.tier),
            reduced_motion: decision.prefers_reduced_motion,
            decision,
            renderer: None,
            scheduler: FrameScheduler::new(),
            probe: None,
            probe_started: false,
            phases,
            visible: options.visible,
            size: (options.width, options.height),
            theme: options.theme,
            renderer_config: settings.renderer_config(),
            fps_config: settings.fps_probe_config(),
            pixel_policy: settings.pixel_ratio_policy(),
            mounted: true,
        };

        tracing::info!(
            tier = %controller.tier(),
            reasons = ?controller.decision.reason_names(),
            visible = controller.visible,
            "orb mounted"
        );

        if !controller.enforce_permission_policy() {
            controller.update_input();
            controller.sync_renderer();
        }
        controller
    }

    pub fn tier(&self) -> QualityTier {
        self.ladder.tier()
    }

    /// Applied downgrades, oldest first
    pub fn tier_history(&self) -> &[TierChange] {
        self.ladder.history()
    }

    /// Initial capability decision
    pub fn decision(&self) -> &QualityDecision {
        &self.decision
    }

    pub fn surface(&self) -> SurfaceView {
        if self.renderer.is_some() {
            SurfaceView::Rendered
        } else {
            SurfaceView::StaticFallback
        }
    }

    pub fn phase(&self) -> Phase {
        self.phases.current()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_probing(&self) -> bool {
        self.probe.is_some()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    pub fn renderer(&self) -> Option<&OrbRenderer<G::Context>> {
        self.renderer.as_ref()
    }

    pub fn orientation(&self) -> &OrientationPipeline<P, S> {
        &self.orientation
    }

    pub fn look_target(&self) -> Vec2 {
        self.orientation.look_target()
    }

    pub fn permission_state(&self) -> PermissionState {
        self.orientation.permission_state()
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn provider(&self) -> &G {
        &self.provider
    }

    /// Push the orchestrator's phase
    pub fn set_phase(&mut self, phase: Phase) {
        let update = self.phases.apply(phase);
        let now = self.host.now();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_phase(update.render_phase);
            renderer.set_reduced_motion(self.reduced_motion);
            if update.flash {
                renderer.flash_error(now);
            }
        }
        tracing::debug!(%phase, flash = update.flash, "phase applied");
        self.schedule(Duration::ZERO);
    }

    /// Page visibility changed. Hiding cancels pending work at once;
    /// showing again schedules exactly one fresh frame.
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        tracing::debug!(visible, "visibility changed");
        self.update_input();

        if visible {
            if self.probe.is_some() {
                self.scheduler.request_probe_frame(&mut self.host);
            } else {
                self.schedule(Duration::ZERO);
            }
        } else {
            self.scheduler.cancel(&mut self.host);
            if let Some(probe) = self.probe.as_mut() {
                probe.pause();
            }
        }
    }

    /// Reduced-motion preference changed. Turning it on drops `High`;
    /// turning it off never upgrades.
    pub fn set_reduced_motion(&mut self, reduced: bool) {
        if self.reduced_motion == reduced {
            return;
        }
        self.reduced_motion = reduced;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_reduced_motion(reduced);
        }
        if reduced && self.lower_tier(QualityTier::Medium, DowngradeReason::PrefersReducedMotion) {
            return;
        }
        self.update_input();
        self.schedule(Duration::ZERO);
    }

    /// Container size changed (CSS pixels)
    pub fn resize(&mut self, width: f64, height: f64) {
        self.size = (width, height);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_size(width, height);
            self.schedule(Duration::ZERO);
        }
    }

    /// Orientation samples arrived. Returns true when they moved the look
    /// target enough to schedule a render.
    pub fn on_orientation<I>(&mut self, samples: I) -> bool
    where
        I: IntoIterator<Item = OrientationSample>,
    {
        let changed = self.orientation.consume(samples);
        if changed {
            self.schedule(Duration::ZERO);
        }
        changed
    }

    /// Ask for orientation consent through the platform
    pub fn request_permission(&mut self) -> PermissionState {
        let state = self.orientation.request_permission();
        self.after_permission();
        state
    }

    /// Record a consent prompt the host resolved itself
    pub fn complete_permission(&mut self, outcome: Result<PermissionDecision, OrbError>) -> PermissionState {
        let state = self.orientation.complete_permission(outcome);
        self.after_permission();
        state
    }

    fn after_permission(&mut self) {
        if !self.enforce_permission_policy() {
            self.update_input();
        }
        self.schedule(Duration::ZERO);
    }

    /// Whether the host should show its consent affordance
    pub fn needs_permission_prompt(&self) -> bool {
        self.tier() == QualityTier::High
            && !self.reduced_motion
            && self.visible
            && self.orientation.is_supported()
            && self.orientation.needs_permission()
            && self.orientation.permission_state() == PermissionState::Prompt
    }

    /// A timer armed by the scheduler fired
    pub fn on_timer(&mut self, timer: TimerHandle) -> Option<FrameHandle> {
        self.scheduler.on_timer(&mut self.host, timer)
    }

    /// A frame callback was delivered
    pub fn on_frame(&mut self, frame: FrameHandle, now: FrameTime) -> FrameReport {
        if !self.scheduler.accept_frame(frame) {
            return FrameReport::Stale;
        }
        if self.probe.is_some() {
            return self.probe_frame(now);
        }
        if !self.visible {
            return FrameReport::Skipped;
        }

        let look = self.orientation.look_target();
        let Some(renderer) = self.renderer.as_mut() else {
            return FrameReport::Skipped;
        };
        renderer.set_look_target(look);

        match renderer.update_and_render(now) {
            Ok(outcome) => {
                if let Some(delay) = outcome.next_frame_in {
                    self.schedule(delay);
                }
                FrameReport::Rendered(outcome)
            }
            Err(err) => {
                self.contain(err, "frame");
                FrameReport::Failed
            }
        }
    }

    fn probe_frame(&mut self, now: FrameTime) -> FrameReport {
        let Some(probe) = self.probe.as_mut() else {
            return FrameReport::Skipped;
        };
        let step = probe.on_frame(now, self.visible);
        if step == ProbeStep::Paused {
            return FrameReport::Probed(step);
        }

        let Some(renderer) = self.renderer.as_mut() else {
            self.probe = None;
            return FrameReport::Skipped;
        };
        renderer.set_phase(Phase::Idle);
        renderer.set_look_target(Vec2::ZERO);
        if let Err(err) = renderer.update_and_render(now) {
            self.contain(err, "fps probe");
            return FrameReport::Failed;
        }

        match step {
            ProbeStep::Finished(verdict) => {
                self.probe = None;
                tracing::info!(
                    tier = %verdict.tier,
                    fps = verdict.fps,
                    frames = verdict.frames,
                    "fps probe complete"
                );
                let current = self.phases.current();
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.set_phase(current);
                }
                let lowered = verdict
                    .downgrade_to
                    .is_some_and(|target| self.lower_tier(target, DowngradeReason::LowFrameRate));
                if !lowered {
                    self.schedule(Duration::ZERO);
                }
            }
            _ => {
                self.scheduler.request_probe_frame(&mut self.host);
            }
        }
        FrameReport::Probed(step)
    }

    /// Cancel pending work and release the renderer. Later calls are no-ops.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.scheduler.cancel(&mut self.host);
        self.probe = None;
        self.orientation.set_enabled(false);
        if let Some(mut renderer) = self.renderer.take() {
            renderer.dispose();
        }
        tracing::debug!("orb unmounted");
    }

    fn gate(&self) -> ScheduleGate {
        ScheduleGate {
            visible: self.visible,
            probing: self.probe.is_some(),
            has_renderer: self.mounted && self.renderer.is_some(),
        }
    }

    fn schedule(&mut self, delay: Duration) -> ScheduleOutcome {
        let gate = self.gate();
        self.scheduler.schedule(&mut self.host, gate, delay)
    }

    /// Orientation input runs only at `High`, with motion allowed, while
    /// visible. Turning it off snaps the look to neutral.
    fn update_input(&mut self) {
        let enabled = self.mounted
            && self.tier() == QualityTier::High
            && !self.reduced_motion
            && self.visible;
        let was_enabled = self.orientation.is_enabled();
        self.orientation.set_enabled(enabled);
        if was_enabled && !enabled {
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.reset_look();
            }
        }
    }

    /// A denied consent at `High` on a consent platform drops to `Medium`.
    /// Returns true when the tier changed.
    fn enforce_permission_policy(&mut self) -> bool {
        if self.tier() == QualityTier::High
            && self.orientation.needs_permission()
            && self.orientation.permission_state() == PermissionState::Denied
        {
            return self.lower_tier(QualityTier::Medium, DowngradeReason::OrientationDenied);
        }
        false
    }

    /// Apply a downgrade and bring every component in line with it
    fn lower_tier(&mut self, target: QualityTier, reason: DowngradeReason) -> bool {
        let Some(change) = self.ladder.lower_to(target, reason) else {
            return false;
        };
        tracing::info!(
            from = %change.from,
            to = %change.to,
            reason = %change.reason,
            "tier lowered"
        );
        self.update_input();
        self.sync_renderer();
        true
    }

    fn contain(&mut self, err: OrbError, stage: &'static str) {
        tracing::warn!(error = %err, stage, tier = %self.tier(), "orb pipeline failed, using static fallback");
        if !self.lower_tier(QualityTier::Low, DowngradeReason::PipelineFailure) {
            // Already at the floor: make sure nothing is left running
            self.sync_renderer();
        }
    }

    /// Make the renderer match the current tier
    fn sync_renderer(&mut self) {
        if !self.mounted {
            return;
        }
        let Some(render_tier) = self.tier().render_tier() else {
            self.scheduler.cancel(&mut self.host);
            self.probe = None;
            if let Some(mut renderer) = self.renderer.take() {
                renderer.dispose();
            }
            return;
        };
        let pixel_ratio = self.pixel_policy.for_tier(render_tier);

        if let Some(renderer) = self.renderer.as_mut() {
            let swapped = renderer.set_tier(render_tier, pixel_ratio);
            renderer.set_reduced_motion(self.reduced_motion);
            if let Err(err) = swapped {
                self.contain(err, "tier swap");
                return;
            }
            // A measurement of the old tier says nothing about the new one
            if self.probe.take().is_some() {
                self.scheduler.cancel(&mut self.host);
                tracing::debug!(tier = %render_tier, "fps probe abandoned after tier change");
            }
            self.schedule(Duration::ZERO);
            return;
        }

        let options = RendererOptions {
            tier: render_tier,
            reduced_motion: self.reduced_motion,
            pixel_ratio,
            width: 1,
            height: 1,
            theme: self.theme,
            config: self.renderer_config.clone(),
        };
        let mut renderer = match OrbRenderer::new(&mut self.provider, options) {
            Ok(renderer) => renderer,
            Err(err) => {
                self.contain(err, "renderer construction");
                return;
            }
        };

        renderer.set_size(self.size.0, self.size.1);
        let phase = self.phases.current();
        renderer.set_phase(phase);
        renderer.set_look_target(self.orientation.look_target());
        renderer.set_reduced_motion(self.reduced_motion);
        if phase == Phase::Error {
            renderer.flash_error(self.host.now());
        }
        self.renderer = Some(renderer);

        if !self.probe_started && self.visible {
            self.probe_started = true;
            self.probe = Some(FpsProbe::new(self.fps_config.clone(), render_tier));
            self.scheduler.cancel(&mut self.host);
            self.scheduler.request_probe_frame(&mut self.host);
            tracing::debug!(tier = %render_tier, "fps probe started");
            return;
        }
        self.schedule(Duration::ZERO);
    }
}

impl<H, G, P, S> Drop for OrbController<H, G, P, S>
where
    H: FrameHost,
    G: GraphicsProvider,
    P: SensorPlatform,
    S: PermissionStore,
{
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::QueuedHost;
    use eyeorb_input::MemoryPermissionStore;
    use eyeorb_probe::EnvironmentSnapshot;
    use eyeorb_render::{FailurePlan, HeadlessProvider};

    struct Sensor {
        consent: bool,
        answer: PermissionDecision,
    }

    impl Sensor {
        fn open() -> Self {
            Sensor {
                consent: false,
                answer: PermissionDecision::Granted,
            }
        }

        fn consent(answer: PermissionDecision) -> Self {
            Sensor {
                consent: true,
                answer,
            }
        }
    }

    impl SensorPlatform for Sensor {
        fn is_supported(&self) -> bool {
            true
        }

        fn requires_permission(&self) -> bool {
            self.consent
        }

        fn request_permission(&mut self) -> eyeorb_core::OrbResult<PermissionDecision> {
            Ok(self.answer)
        }
    }

    type Controller = OrbController<QueuedHost, HeadlessProvider, Sensor, MemoryPermissionStore>;

    const FPS_60: u64 = 16_667;
    const FPS_45: u64 = 22_222;
    const FPS_38: u64 = 26_316;

    fn mount(env: EnvironmentSnapshot, provider: &HeadlessProvider, sensor: Sensor) -> Controller {
        OrbController::mount(
            &env,
            QueuedHost::new(),
            provider.clone(),
            sensor,
            MemoryPermissionStore::new(),
            MountOptions::default(),
        )
    }

    fn basic_only() -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            advanced: false,
            ..Default::default()
        }
    }

    /// Virtual clock in microseconds
    struct Clock(u64);

    impl Clock {
        fn now(&self) -> FrameTime {
            FrameTime::from_micros(self.0)
        }
    }

    /// Deliver frames every `interval_us` and fire timers after their delay,
    /// until nothing is outstanding or `limit` frames were delivered
    fn pump(ctrl: &mut Controller, clock: &mut Clock, interval_us: u64, limit: u32) -> u32 {
        let mut delivered = 0;
        while delivered < limit {
            if let Some(frame) = ctrl.host_mut().pop_frame() {
                clock.0 += interval_us;
                ctrl.host_mut().set_now(clock.now());
                ctrl.on_frame(frame, clock.now());
                delivered += 1;
            } else if let Some((timer, delay)) = ctrl.host_mut().pop_timer() {
                clock.0 += delay.as_micros() as u64;
                ctrl.host_mut().set_now(clock.now());
                ctrl.on_timer(timer);
            } else {
                break;
            }
        }
        delivered
    }

    fn finish_probe(ctrl: &mut Controller, clock: &mut Clock, interval_us: u64) {
        while ctrl.is_probing() {
            assert!(pump(ctrl, clock, interval_us, 1) == 1, "probe stalled");
        }
    }

    #[test]
    fn test_mount_high_starts_probe() {
        let provider = HeadlessProvider::new();
        let ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());

        assert_eq!(ctrl.tier(), QualityTier::High);
        assert_eq!(ctrl.surface(), SurfaceView::Rendered);
        assert!(ctrl.is_probing());
        assert_eq!(ctrl.host().pending_frames(), 1);

        let log = provider.log();
        assert_eq!(log.contexts_created, 1);
        assert_eq!(log.programs, vec![eyeorb_core::RenderTier::High]);
    }

    #[test]
    fn test_mount_without_graphics_is_static() {
        let provider = HeadlessProvider::new();
        let env = EnvironmentSnapshot {
            graphics_supported: false,
            ..Default::default()
        };
        let ctrl = mount(env, &provider, Sensor::open());

        assert_eq!(ctrl.tier(), QualityTier::Low);
        assert_eq!(ctrl.surface(), SurfaceView::StaticFallback);
        assert_eq!(ctrl.host().outstanding(), 0);
        assert_eq!(provider.log().contexts_created, 0);
    }

    #[test]
    fn test_fast_device_keeps_tier_and_settles() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());
        let mut clock = Clock(1_000_000);

        finish_probe(&mut ctrl, &mut clock, FPS_60);
        assert_eq!(ctrl.tier(), QualityTier::High);
        assert!(ctrl.tier_history().is_empty());

        pump(&mut ctrl, &mut clock, FPS_60, 100);
        assert_eq!(ctrl.host().outstanding(), 0);
    }

    #[test]
    fn test_slow_high_swaps_to_medium_in_place() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());
        let mut clock = Clock(0);

        finish_probe(&mut ctrl, &mut clock, FPS_45);

        assert_eq!(ctrl.tier(), QualityTier::Medium);
        assert_eq!(ctrl.surface(), SurfaceView::Rendered);
        assert_eq!(ctrl.tier_history()[0].reason, DowngradeReason::LowFrameRate);
        let log = provider.log();
        assert_eq!(log.contexts_created, 1);
        assert_eq!(
            log.programs,
            vec![eyeorb_core::RenderTier::High, eyeorb_core::RenderTier::Medium]
        );
        // No second probe at the new tier
        assert!(!ctrl.is_probing());
    }

    #[test]
    fn test_slow_medium_drops_to_static() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(basic_only(), &provider, Sensor::open());
        let mut clock = Clock(0);
        assert_eq!(ctrl.tier(), QualityTier::Medium);

        finish_probe(&mut ctrl, &mut clock, FPS_38);

        assert_eq!(ctrl.tier(), QualityTier::Low);
        assert_eq!(ctrl.surface(), SurfaceView::StaticFallback);
        assert_eq!(ctrl.host().outstanding(), 0);
        assert_eq!(provider.log().live_contexts(), 0);
        assert_eq!(provider.log().contexts_lost, 1);
    }

    #[test]
    fn test_hidden_cancels_and_resume_schedules_once() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());
        let mut clock = Clock(0);
        finish_probe(&mut ctrl, &mut clock, FPS_60);
        pump(&mut ctrl, &mut clock, FPS_60, 100);

        ctrl.set_phase(Phase::Thinking);
        assert_eq!(ctrl.host().outstanding(), 1);

        ctrl.set_visible(false);
        assert_eq!(ctrl.host().outstanding(), 0);
        ctrl.set_phase(Phase::Streaming);
        ctrl.resize(300.0, 300.0);
        assert_eq!(ctrl.host().outstanding(), 0);

        ctrl.set_visible(true);
        assert_eq!(ctrl.host().pending_frames(), 1);
        assert_eq!(ctrl.host().outstanding(), 1);
    }

    #[test]
    fn test_stale_frame_is_ignored() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());
        let mut clock = Clock(0);
        finish_probe(&mut ctrl, &mut clock, FPS_60);
        pump(&mut ctrl, &mut clock, FPS_60, 100);

        ctrl.set_phase(Phase::Thinking);
        let frame = ctrl.host_mut().pop_frame().unwrap();
        ctrl.set_visible(false);

        let draws = provider.log().draws;
        assert_eq!(ctrl.on_frame(frame, clock.now()), FrameReport::Stale);
        assert_eq!(provider.log().draws, draws);
    }

    #[test]
    fn test_hidden_probe_pauses_and_resumes() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());
        let mut clock = Clock(0);

        pump(&mut ctrl, &mut clock, FPS_60, 30);
        ctrl.set_visible(false);
        assert!(ctrl.is_probing());
        assert_eq!(ctrl.host().outstanding(), 0);

        clock.0 += 10_000_000;
        ctrl.set_visible(true);
        assert_eq!(ctrl.host().pending_frames(), 1);

        finish_probe(&mut ctrl, &mut clock, FPS_60);
        assert_eq!(ctrl.tier(), QualityTier::High);
    }

    #[test]
    fn test_hidden_mount_skips_probe() {
        let provider = HeadlessProvider::new();
        let options = MountOptions {
            visible: false,
            ..Default::default()
        };
        let mut ctrl: Controller = OrbController::mount(
            &EnvironmentSnapshot::default(),
            QueuedHost::new(),
            provider.clone(),
            Sensor::open(),
            MemoryPermissionStore::new(),
            options,
        );

        assert!(!ctrl.is_probing());
        assert_eq!(ctrl.host().outstanding(), 0);

        ctrl.set_visible(true);
        assert!(!ctrl.is_probing());
        assert_eq!(ctrl.host().pending_frames(), 1);
    }

    #[test]
    fn test_error_phase_flash_starts_on_entry() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());
        let mut clock = Clock(0);
        finish_probe(&mut ctrl, &mut clock, FPS_60);
        pump(&mut ctrl, &mut clock, FPS_60, 100);

        ctrl.set_phase(Phase::Error);
        pump(&mut ctrl, &mut clock, FPS_60, 1);

        // One frame interval after entry
        let elapsed = FPS_60 as f32 / 200_000.0;
        let uniforms = ctrl.renderer().unwrap().uniforms();
        assert!((uniforms.error_flash - (1.0 - elapsed * elapsed)).abs() < 1e-4);
        assert_eq!(ctrl.renderer().unwrap().phase(), Phase::Idle);

        // The pulse decays to zero and the loop stops
        pump(&mut ctrl, &mut clock, FPS_60, 500);
        assert_eq!(ctrl.host().outstanding(), 0);
        assert_eq!(ctrl.renderer().unwrap().uniforms().error_flash, 0.0);
    }

    #[test]
    fn test_error_raised_and_cleared_while_hidden_never_flashes() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());
        let mut clock = Clock(0);
        finish_probe(&mut ctrl, &mut clock, FPS_60);
        pump(&mut ctrl, &mut clock, FPS_60, 100);

        ctrl.set_visible(false);
        ctrl.set_phase(Phase::Error);
        ctrl.set_phase(Phase::Idle);
        assert_eq!(ctrl.host().outstanding(), 0);

        clock.0 += 60_000_000;
        ctrl.host_mut().set_now(clock.now());
        ctrl.set_visible(true);
        assert_eq!(pump(&mut ctrl, &mut clock, FPS_60, 1), 1);

        assert_eq!(ctrl.renderer().unwrap().uniforms().error_flash, 0.0);
    }

    #[test]
    fn test_reduced_motion_drops_high_and_never_upgrades() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());
        let mut clock = Clock(0);
        finish_probe(&mut ctrl, &mut clock, FPS_60);

        ctrl.set_reduced_motion(true);
        assert_eq!(ctrl.tier(), QualityTier::Medium);
        assert_eq!(
            ctrl.tier_history()[0].reason,
            DowngradeReason::PrefersReducedMotion
        );

        ctrl.set_reduced_motion(false);
        assert_eq!(ctrl.tier(), QualityTier::Medium);
        assert_eq!(ctrl.tier_history().len(), 1);
    }

    #[test]
    fn test_pipeline_failure_falls_back() {
        let provider = HeadlessProvider::failing(FailurePlan {
            build_program: true,
            ..Default::default()
        });
        let ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());

        assert_eq!(ctrl.tier(), QualityTier::Low);
        assert_eq!(ctrl.surface(), SurfaceView::StaticFallback);
        assert_eq!(ctrl.tier_history()[0].reason, DowngradeReason::PipelineFailure);
        assert_eq!(provider.log().live_contexts(), 0);
        assert_eq!(ctrl.host().outstanding(), 0);
    }

    #[test]
    fn test_draw_failure_mid_probe_falls_back() {
        let provider = HeadlessProvider::failing(FailurePlan {
            draw_after: Some(3),
            ..Default::default()
        });
        let mut ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());
        let mut clock = Clock(0);

        pump(&mut ctrl, &mut clock, FPS_60, 10);

        assert_eq!(ctrl.tier(), QualityTier::Low);
        assert!(!ctrl.is_probing());
        assert_eq!(ctrl.host().outstanding(), 0);
        assert_eq!(provider.log().live_contexts(), 0);
    }

    #[test]
    fn test_permission_denied_drops_to_medium() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(
            EnvironmentSnapshot::default(),
            &provider,
            Sensor::consent(PermissionDecision::Denied),
        );
        assert!(ctrl.needs_permission_prompt());

        assert_eq!(ctrl.request_permission(), PermissionState::Denied);
        assert_eq!(ctrl.tier(), QualityTier::Medium);
        assert_eq!(ctrl.tier_history()[0].reason, DowngradeReason::OrientationDenied);
        assert!(!ctrl.needs_permission_prompt());
    }

    #[test]
    fn test_persisted_denial_applies_at_mount() {
        let provider = HeadlessProvider::new();
        let ctrl: Controller = OrbController::mount(
            &EnvironmentSnapshot::default(),
            QueuedHost::new(),
            provider.clone(),
            Sensor::consent(PermissionDecision::Granted),
            MemoryPermissionStore::with_decision(PermissionDecision::Denied),
            MountOptions::default(),
        );

        assert_eq!(ctrl.tier(), QualityTier::Medium);
        assert_eq!(provider.log().programs, vec![eyeorb_core::RenderTier::Medium]);
    }

    #[test]
    fn test_orientation_only_drives_high() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());
        let mut clock = Clock(0);
        finish_probe(&mut ctrl, &mut clock, FPS_60);

        let samples: Vec<_> = (0..10)
            .map(|i| OrientationSample::new(0.0, 30.0, FrameTime::from_millis(5_000 + i * 16)))
            .collect();
        assert!(ctrl.on_orientation(samples.clone()));
        assert!(ctrl.look_target().x < 0.0);
        assert_eq!(ctrl.host().pending_frames(), 1);

        ctrl.set_reduced_motion(true);
        assert_eq!(ctrl.look_target(), Vec2::ZERO);
        assert_eq!(ctrl.renderer().unwrap().look(), Vec2::ZERO);
        assert!(!ctrl.on_orientation(samples));
    }

    #[test]
    fn test_unmount_is_idempotent() {
        let provider = HeadlessProvider::new();
        let mut ctrl = mount(EnvironmentSnapshot::default(), &provider, Sensor::open());

        ctrl.unmount();
        ctrl.unmount();
        assert!(!ctrl.is_mounted());
        assert_eq!(ctrl.surface(), SurfaceView::StaticFallback);
        assert_eq!(ctrl.host().outstanding(), 0);

        ctrl.set_phase(Phase::Thinking);
        ctrl.set_visible(false);
        ctrl.set_visible(true);
        assert_eq!(ctrl.host().outstanding(), 0);

        drop(ctrl);
        let log = provider.log();
        assert_eq!(log.contexts_released, 1);
        assert_eq!(log.contexts_lost, 1);
    }
}
