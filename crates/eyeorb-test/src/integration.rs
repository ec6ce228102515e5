//! End-to-end scenarios
//!
//! Full mount-to-unmount runs of the controller on the simulated host:
//! - FPS probe verdicts on devices of different speed
//! - Visibility cancel and resume
//! - Phase sequences and the error pulse
//! - Orientation input and consent across sessions
//! - Resource release and single-flight scheduling

use std::time::Duration;

use eyeorb_core::{QualityTier, TierChange};
use eyeorb_probe::Environment;
use eyeorb_runtime::{MountOptions, SurfaceView};

use crate::scenario::{PhaseScript, RunStats, Simulation};
use crate::scripted::ScriptedSensor;
use crate::simulator::{FrameTiming, HostStats};

/// Upper bound on callbacks any scenario may need to settle
pub const MAX_EVENTS: u64 = 10_000;

// ============================================================================
// SCENARIO REPORT
// ============================================================================

/// Final state of a scenario run
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub tier: QualityTier,
    pub history: Vec<TierChange>,
    pub surface: SurfaceView,
    pub live_contexts: u32,
    pub contexts_lost: u32,
    pub outstanding: usize,
    pub run: RunStats,
    pub host: HostStats,
}

impl ScenarioReport {
    pub fn capture(sim: &Simulation) -> Self {
        let log = sim.log();
        let controller = sim.controller();
        ScenarioReport {
            tier: controller.tier(),
            history: controller.tier_history().to_vec(),
            surface: controller.surface(),
            live_contexts: log.live_contexts(),
            contexts_lost: log.contexts_lost,
            outstanding: sim.host().outstanding(),
            run: sim.stats(),
            host: sim.host().stats(),
        }
    }

    /// Never more than one request outstanding
    pub fn single_flight(&self) -> bool {
        self.host.peak_outstanding <= 1
    }

    /// Tier only ever moved down
    pub fn monotonic(&self) -> bool {
        self.history.iter().all(|change| change.to < change.from)
            && self.history.windows(2).all(|pair| pair[1].from == pair[0].to)
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// Mount, run the FPS probe to completion and let the orb settle
pub fn probe_scenario<E>(env: &E, timing: FrameTiming, seed: u64) -> ScenarioReport
where
    E: Environment + ?Sized,
{
    let mut sim = Simulation::mount(env, timing, seed, ScriptedSensor::open(), MountOptions::default());
    sim.finish_probe(MAX_EVENTS);
    sim.run_until_idle(MAX_EVENTS);
    ScenarioReport::capture(&sim)
}

/// Mount, play `script`, then unmount
pub fn script_scenario<E>(env: &E, timing: FrameTiming, seed: u64, script: &PhaseScript) -> ScenarioReport
where
    E: Environment + ?Sized,
{
    let mut sim = Simulation::mount(env, timing, seed, ScriptedSensor::open(), MountOptions::default());
    sim.finish_probe(MAX_EVENTS);
    sim.play(script);
    sim.controller_mut().unmount();
    ScenarioReport::capture(&sim)
}

/// Time for eased values to land within a fraction of a percent
pub fn settle_time() -> Duration {
    Duration::from_millis(2_000)
}
