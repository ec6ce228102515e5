//! Capability probe - the initial quality decision
//!
//! Runs once at mount, synchronously, with no side effects beyond the
//! throwaway graphics contexts the environment creates to answer.

use eyeorb_core::{DowngradeReason, OrbResult, QualityTier};

/// Graphics API level a throwaway context could be created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicsSupport {
    None,
    Basic,
    Advanced,
}

/// What the host environment can tell us about the device
pub trait Environment {
    /// Reduced-motion accessibility preference
    fn prefers_reduced_motion(&self) -> OrbResult<bool>;

    /// Try to create an advanced graphics context
    fn create_advanced_context(&self) -> OrbResult<bool>;

    /// Try to create a basic graphics context
    fn create_basic_context(&self) -> OrbResult<bool>;

    /// Approximate device memory in GB, if the platform exposes it
    fn device_memory_gb(&self) -> Option<f32>;
}

/// The initial quality decision
#[derive(Debug, Clone, PartialEq)]
pub struct QualityDecision {
    pub tier: QualityTier,
    /// Why the tier is below `High`, in detection order
    pub reasons: Vec<DowngradeReason>,
    pub supports_basic: bool,
    pub supports_advanced: bool,
    pub prefers_reduced_motion: bool,
    pub device_memory_gb: Option<f32>,
}

impl QualityDecision {
    fn unsupported(reason: DowngradeReason) -> Self {
        QualityDecision {
            tier: QualityTier::Low,
            reasons: vec![reason],
            supports_basic: false,
            supports_advanced: false,
            prefers_reduced_motion: false,
            device_memory_gb: None,
        }
    }

    pub fn reason_names(&self) -> Vec<&'static str> {
        self.reasons.iter().map(|r| r.as_str()).collect()
    }
}

/// Capability probe
#[derive(Debug, Clone)]
pub struct CapabilityProbe {
    /// Devices reporting this much memory or less are capped at medium
    pub low_memory_gb: f32,
}

impl Default for CapabilityProbe {
    fn default() -> Self {
        CapabilityProbe { low_memory_gb: 4.0 }
    }
}

impl CapabilityProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide the initial tier. Never fails: detection errors land on `Low`.
    pub fn decide<E: Environment + ?Sized>(&self, env: &E) -> QualityDecision {
        let decision = match self.try_decide(env) {
            Ok(decision) => decision,
            Err(err) => {
                tracing::debug!(error = %err, "capability detection failed");
                QualityDecision::unsupported(DowngradeReason::DetectionFailed)
            }
        };

        tracing::info!(
            tier = %decision.tier,
            reasons = ?decision.reason_names(),
            "initial quality decision"
        );
        decision
    }

    fn try_decide<E: Environment + ?Sized>(&self, env: &E) -> OrbResult<QualityDecision> {
        let prefers_reduced_motion = env.prefers_reduced_motion()?;
        let support = graphics_support(env);

        if support == GraphicsSupport::None {
            return Ok(QualityDecision::unsupported(DowngradeReason::NoGraphics));
        }

        let device_memory_gb = env.device_memory_gb().filter(|gb| gb.is_finite());
        let mut reasons = Vec::new();

        if prefers_reduced_motion {
            reasons.push(DowngradeReason::PrefersReducedMotion);
        }
        if matches!(device_memory_gb, Some(gb) if gb <= self.low_memory_gb) {
            reasons.push(DowngradeReason::LowDeviceMemory);
        }
        if support == GraphicsSupport::Basic {
            reasons.push(DowngradeReason::BasicGraphicsOnly);
        }

        let tier = if reasons.is_empty() {
            QualityTier::High
        } else {
            QualityTier::Medium
        };

        Ok(QualityDecision {
            tier,
            reasons,
            supports_basic: true,
            supports_advanced: support == GraphicsSupport::Advanced,
            prefers_reduced_motion,
            device_memory_gb,
        })
    }
}

/// Advanced first, then basic. A context that throws counts as unavailable.
fn graphics_support<E: Environment + ?Sized>(env: &E) -> GraphicsSupport {
    match env.create_advanced_context() {
        Ok(true) => return GraphicsSupport::Advanced,
        Ok(false) => {}
        Err(err) => tracing::debug!(error = %err, "advanced graphics context failed"),
    }
    match env.create_basic_context() {
        Ok(true) => GraphicsSupport::Basic,
        Ok(false) => GraphicsSupport::None,
        Err(err) => {
            tracing::debug!(error = %err, "basic graphics context failed");
            GraphicsSupport::None
        }
    }
}

/// Fixed answers, for hosts that gather capabilities up front
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentSnapshot {
    pub graphics_supported: bool,
    pub advanced: bool,
    pub reduced_motion: bool,
    pub memory_gb: Option<f32>,
}

impl Default for EnvironmentSnapshot {
    fn default() -> Self {
        EnvironmentSnapshot {
            graphics_supported: true,
            advanced: true,
            reduced_motion: false,
            memory_gb: None,
        }
    }
}

impl Environment for EnvironmentSnapshot {
    fn prefers_reduced_motion(&self) -> OrbResult<bool> {
        Ok(self.reduced_motion)
    }

    fn create_advanced_context(&self) -> OrbResult<bool> {
        Ok(self.graphics_supported && self.advanced)
    }

    fn create_basic_context(&self) -> OrbResult<bool> {
        Ok(self.graphics_supported)
    }

    fn device_memory_gb(&self) -> Option<f32> {
        self.memory_gb
    }
}
