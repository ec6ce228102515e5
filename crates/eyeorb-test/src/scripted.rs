//! Scripted environment and sensor
//!
//! Both answer from fixed scripts and record how they were queried, so tests
//! can assert on detection and consent traffic.

use std::cell::Cell;
use std::collections::VecDeque;
use std::time::Duration;

use eyeorb_core::{FrameTime, OrbError, OrbResult};
use eyeorb_input::{OrientationSample, PermissionDecision, SensorPlatform};
use eyeorb_probe::{Environment, EnvironmentSnapshot};

/// Capability environment with injectable detection failures
#[derive(Debug, Clone, Default)]
pub struct ScriptedEnvironment {
    pub snapshot: EnvironmentSnapshot,
    /// The reduced-motion query throws
    pub fail_preference_query: bool,
    /// Creating the advanced context throws
    pub fail_advanced_context: bool,
    contexts_attempted: Cell<u32>,
}

impl ScriptedEnvironment {
    pub fn new(snapshot: EnvironmentSnapshot) -> Self {
        ScriptedEnvironment {
            snapshot,
            ..Default::default()
        }
    }

    /// Desktop with an advanced API and plenty of memory
    pub fn desktop() -> Self {
        Self::new(EnvironmentSnapshot {
            memory_gb: Some(16.0),
            ..Default::default()
        })
    }

    /// Only the basic graphics API is available
    pub fn basic_only() -> Self {
        Self::new(EnvironmentSnapshot {
            advanced: false,
            ..Default::default()
        })
    }

    pub fn without_graphics() -> Self {
        Self::new(EnvironmentSnapshot {
            graphics_supported: false,
            ..Default::default()
        })
    }

    /// Throwaway contexts created so far
    pub fn contexts_attempted(&self) -> u32 {
        self.contexts_attempted.get()
    }

    fn attempt(&self) {
        self.contexts_attempted.set(self.contexts_attempted.get() + 1);
    }
}

impl Environment for ScriptedEnvironment {
    fn prefers_reduced_motion(&self) -> OrbResult<bool> {
        if self.fail_preference_query {
            return Err(OrbError::DetectionFailed("media query threw".into()));
        }
        self.snapshot.prefers_reduced_motion()
    }

    fn create_advanced_context(&self) -> OrbResult<bool> {
        self.attempt();
        if self.fail_advanced_context {
            return Err(OrbError::GraphicsUnavailable("advanced context threw".into()));
        }
        self.snapshot.create_advanced_context()
    }

    fn create_basic_context(&self) -> OrbResult<bool> {
        self.attempt();
        self.snapshot.create_basic_context()
    }

    fn device_memory_gb(&self) -> Option<f32> {
        self.snapshot.device_memory_gb()
    }
}

/// Tilt sensor answering consent prompts from a queue
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    pub supported: bool,
    pub requires_consent: bool,
    answers: VecDeque<OrbResult<PermissionDecision>>,
    prompts: u32,
}

impl ScriptedSensor {
    /// Sensor that needs no consent
    pub fn open() -> Self {
        ScriptedSensor {
            supported: true,
            requires_consent: false,
            answers: VecDeque::new(),
            prompts: 0,
        }
    }

    /// Sensor that asks for consent and gets `answers` in order
    pub fn consent<I>(answers: I) -> Self
    where
        I: IntoIterator<Item = OrbResult<PermissionDecision>>,
    {
        ScriptedSensor {
            supported: true,
            requires_consent: true,
            answers: answers.into_iter().collect(),
            prompts: 0,
        }
    }

    pub fn prompts(&self) -> u32 {
        self.prompts
    }
}

impl SensorPlatform for ScriptedSensor {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn requires_permission(&self) -> bool {
        self.requires_consent
    }

    fn request_permission(&mut self) -> OrbResult<PermissionDecision> {
        self.prompts += 1;
        self.answers
            .pop_front()
            .unwrap_or_else(|| Err(OrbError::PermissionRequest("no scripted answer".into())))
    }
}

/// `count` identical tilt readings spaced `interval` apart starting at `start`
pub fn tilt_samples(
    start: FrameTime,
    interval: Duration,
    beta: f64,
    gamma: f64,
    count: usize,
) -> Vec<OrientationSample> {
    (0..count)
        .map(|i| {
            let at = start.saturating_add(interval * i as u32);
            OrientationSample::new(beta, gamma, at)
        })
        .collect()
}
