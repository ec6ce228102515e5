//! Scenario driver - a mounted controller on a simulated host
//!
//! The driver plays the host's role: it pulls the earliest callback off the
//! virtual clock and feeds it back to the controller, and it applies scripted
//! phase changes at their scheduled times.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use eyeorb_core::{FrameTime, Phase};
use eyeorb_input::{MemoryPermissionStore, OrientationSample, PermissionStore};
use eyeorb_probe::Environment;
use eyeorb_render::{HeadlessLog, HeadlessProvider};
use eyeorb_runtime::{FrameHost, FrameReport, MountOptions, OrbController};
use thiserror::Error;

use crate::scripted::ScriptedSensor;
use crate::simulator::{FrameTiming, HostEvent, SimulatedHost};

/// Controller type every scenario drives
pub type SimController<S = MemoryPermissionStore> =
    OrbController<SimulatedHost, HeadlessProvider, ScriptedSensor, S>;

/// Errors parsing a phase script
#[derive(Debug, Error, PartialEq)]
pub enum ScriptError {
    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    #[error("step `{0}` is not `phase:millis`")]
    MalformedStep(String),
}

/// Phases to apply, each held for a duration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhaseScript {
    steps: Vec<(Phase, Duration)>,
}

impl PhaseScript {
    pub fn new(steps: Vec<(Phase, Duration)>) -> Self {
        PhaseScript { steps }
    }

    pub fn steps(&self) -> &[(Phase, Duration)] {
        &self.steps
    }

    pub fn total(&self) -> Duration {
        self.steps.iter().map(|(_, held)| *held).sum()
    }
}

fn parse_phase(name: &str) -> Result<Phase, ScriptError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "idle" => Ok(Phase::Idle),
        "thinking" => Ok(Phase::Thinking),
        "streaming" => Ok(Phase::Streaming),
        "error" => Ok(Phase::Error),
        other => Err(ScriptError::UnknownPhase(other.to_string())),
    }
}

/// `idle:500,thinking:1500,streaming:2000`
impl FromStr for PhaseScript {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let steps = s
            .split(',')
            .filter(|step| !step.trim().is_empty())
            .map(|step| {
                let (name, millis) = step
                    .split_once(':')
                    .ok_or_else(|| ScriptError::MalformedStep(step.to_string()))?;
                let millis: u64 = millis
                    .trim()
                    .parse()
                    .map_err(|_| ScriptError::MalformedStep(step.to_string()))?;
                Ok((parse_phase(name)?, Duration::from_millis(millis)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PhaseScript { steps })
    }
}

impl fmt::Display for PhaseScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (phase, held)) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", phase, held.as_millis())?;
        }
        Ok(())
    }
}

/// Counts of what the controller reported for delivered frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub rendered: u64,
    pub probed: u64,
    pub stale: u64,
    pub skipped: u64,
    pub failed: u64,
    pub timers: u64,
}

impl RunStats {
    fn record(&mut self, report: FrameReport) {
        match report {
            FrameReport::Rendered(_) => self.rendered += 1,
            FrameReport::Probed(_) => self.probed += 1,
            FrameReport::Stale => self.stale += 1,
            FrameReport::Skipped => self.skipped += 1,
            FrameReport::Failed => self.failed += 1,
        }
    }
}

/// A mounted controller plus the provider log it renders into
pub struct Simulation<S: PermissionStore = MemoryPermissionStore> {
    controller: SimController<S>,
    provider: HeadlessProvider,
    stats: RunStats,
}

impl Simulation<MemoryPermissionStore> {
    /// Mount with an in-memory permission store
    pub fn mount<E>(env: &E, timing: FrameTiming, seed: u64, sensor: ScriptedSensor, options: MountOptions) -> Self
    where
        E: Environment + ?Sized,
    {
        Self::mount_with_store(
            env,
            timing,
            seed,
            HeadlessProvider::new(),
            sensor,
            MemoryPermissionStore::new(),
            options,
        )
    }
}

impl<S: PermissionStore> Simulation<S> {
    pub fn mount_with_store<E>(
        env: &E,
        timing: FrameTiming,
        seed: u64,
        provider: HeadlessProvider,
        sensor: ScriptedSensor,
        store: S,
        options: MountOptions,
    ) -> Self
    where
        E: Environment + ?Sized,
    {
        let host = SimulatedHost::new(timing, seed);
        let controller = OrbController::mount(env, host, provider.clone(), sensor, store, options);
        Simulation {
            controller,
            provider,
            stats: RunStats::default(),
        }
    }

    pub fn controller(&self) -> &SimController<S> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SimController<S> {
        &mut self.controller
    }

    pub fn host(&self) -> &SimulatedHost {
        self.controller.host()
    }

    pub fn host_mut(&mut self) -> &mut SimulatedHost {
        self.controller.host_mut()
    }

    pub fn now(&self) -> FrameTime {
        self.host().now()
    }

    pub fn log(&self) -> HeadlessLog {
        self.provider.log()
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Deliver the earliest outstanding callback
    pub fn step(&mut self) -> Option<HostEvent> {
        let event = self.host_mut().next_event()?;
        match event {
            HostEvent::Frame(frame, at) => {
                let report = self.controller.on_frame(frame, at);
                self.stats.record(report);
            }
            HostEvent::Timer(timer, _) => {
                self.stats.timers += 1;
                self.controller.on_timer(timer);
            }
        }
        Some(event)
    }

    /// Deliver every callback due within `span`, then move the clock to its
    /// end. Returns the number of callbacks delivered.
    pub fn run_for(&mut self, span: Duration) -> u64 {
        let deadline = self.now().saturating_add(span);
        let mut delivered = 0;
        while self.host().next_due().is_some_and(|due| due <= deadline) {
            self.step();
            delivered += 1;
        }
        let now = self.now();
        if deadline > now {
            self.host_mut().advance(deadline.since(now));
        }
        delivered
    }

    /// Deliver callbacks until none are outstanding. False when `max_events`
    /// ran out first (something keeps animating).
    pub fn run_until_idle(&mut self, max_events: u64) -> bool {
        for _ in 0..max_events {
            if self.step().is_none() {
                return true;
            }
        }
        self.host().outstanding() == 0
    }

    /// Run until the FPS probe has finished. False if it never does.
    pub fn finish_probe(&mut self, max_events: u64) -> bool {
        for _ in 0..max_events {
            if !self.controller.is_probing() {
                return true;
            }
            if self.step().is_none() {
                break;
            }
        }
        !self.controller.is_probing()
    }

    /// Apply each scripted phase and let it play for its duration
    pub fn play(&mut self, script: &PhaseScript) {
        for (phase, held) in script.steps() {
            self.controller.set_phase(*phase);
            self.run_for(*held);
        }
    }

    /// Feed a batch of orientation samples
    pub fn tilt(&mut self, samples: Vec<OrientationSample>) -> bool {
        self.controller.on_orientation(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script: PhaseScript = "idle:500, thinking:1500,STREAMING:20".parse().unwrap();

        assert_eq!(
            script.steps(),
            &[
                (Phase::Idle, Duration::from_millis(500)),
                (Phase::Thinking, Duration::from_millis(1500)),
                (Phase::Streaming, Duration::from_millis(20)),
            ]
        );
        assert_eq!(script.total(), Duration::from_millis(2020));
        assert_eq!(script.to_string(), "idle:500,thinking:1500,streaming:20");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "dreaming:10".parse::<PhaseScript>(),
            Err(ScriptError::UnknownPhase("dreaming".into()))
        );
        assert_eq!(
            "idle".parse::<PhaseScript>(),
            Err(ScriptError::MalformedStep("idle".into()))
        );
        assert_eq!(
            "idle:soon".parse::<PhaseScript>(),
            Err(ScriptError::MalformedStep("idle:soon".into()))
        );
    }
}
