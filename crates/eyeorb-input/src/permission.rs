//! Orientation consent state machine
//!
//! ```text
//! no sensor API            -> Unavailable (terminal)
//! sensor, no consent model -> Granted
//! sensor, consent required -> persisted decision, else Prompt
//! Prompt --request--> Granted | Denied   (errors resolve to Denied)
//! ```

use std::fmt;

use eyeorb_core::OrbResult;

use crate::{PermissionDecision, PermissionStore};

/// Consent state as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionState {
    Unavailable,
    Prompt,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Prompt => "prompt",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

impl From<PermissionDecision> for PermissionState {
    fn from(decision: PermissionDecision) -> Self {
        match decision {
            PermissionDecision::Granted => Self::Granted,
            PermissionDecision::Denied => Self::Denied,
        }
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Platform tilt sensor access
pub trait SensorPlatform {
    /// Whether the platform exposes an orientation sensor at all
    fn is_supported(&self) -> bool;

    /// Whether reading the sensor requires an explicit user grant
    fn requires_permission(&self) -> bool;

    /// Ask the user. Only called when consent is required.
    fn request_permission(&mut self) -> OrbResult<PermissionDecision>;
}

/// Consent state plus its durable store
pub struct PermissionGate<P, S> {
    platform: P,
    store: S,
    state: PermissionState,
}

impl<P: SensorPlatform, S: PermissionStore> PermissionGate<P, S> {
    pub fn new(platform: P, store: S) -> Self {
        let state = if !platform.is_supported() {
            PermissionState::Unavailable
        } else if !platform.requires_permission() {
            PermissionState::Granted
        } else {
            match store.load() {
                Ok(Some(decision)) => decision.into(),
                Ok(None) => PermissionState::Prompt,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read orientation permission");
                    PermissionState::Prompt
                }
            }
        };

        PermissionGate {
            platform,
            store,
            state,
        }
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }

    pub fn is_supported(&self) -> bool {
        self.state != PermissionState::Unavailable
    }

    /// Consent is required on this platform
    pub fn needs_permission(&self) -> bool {
        self.is_supported() && self.platform.requires_permission()
    }

    /// Samples may be consumed
    pub fn allows_input(&self) -> bool {
        self.state == PermissionState::Granted
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Prompt through the platform and record the outcome
    pub fn request(&mut self) -> PermissionState {
        if !self.is_supported() {
            return PermissionState::Unavailable;
        }
        if !self.platform.requires_permission() {
            self.state = PermissionState::Granted;
            return self.state;
        }
        let outcome = self.platform.request_permission();
        self.complete_request(outcome)
    }

    /// Record the outcome of a prompt the host resolved itself.
    /// A failed prompt is persisted as a denial.
    pub fn complete_request(&mut self, outcome: OrbResult<PermissionDecision>) -> PermissionState {
        if !self.needs_permission() {
            return self.state;
        }
        let decision = match outcome {
            Ok(decision) => decision,
            Err(err) => {
                tracing::debug!(error = %err, "orientation permission request failed");
                PermissionDecision::Denied
            }
        };

        if let Err(err) = self.store.save(decision) {
            tracing::warn!(error = %err, "failed to persist orientation permission");
        }
        self.state = decision.into();
        tracing::info!(state = %self.state, "orientation permission resolved");
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryPermissionStore;
    use eyeorb_core::OrbError;

    struct FakeSensor {
        supported: bool,
        consent: bool,
        answer: Option<PermissionDecision>,
        prompts: u32,
    }

    impl FakeSensor {
        fn consent(answer: Option<PermissionDecision>) -> Self {
            FakeSensor {
                supported: true,
                consent: true,
                answer,
                prompts: 0,
            }
        }
    }

    impl SensorPlatform for FakeSensor {
        fn is_supported(&self) -> bool {
            self.supported
        }

        fn requires_permission(&self) -> bool {
            self.consent
        }

        fn request_permission(&mut self) -> OrbResult<PermissionDecision> {
            self.prompts += 1;
            self.answer
                .ok_or_else(|| OrbError::PermissionRequest("gesture required".into()))
        }
    }

    #[test]
    fn test_unsupported_is_terminal() {
        let sensor = FakeSensor {
            supported: false,
            consent: true,
            answer: Some(PermissionDecision::Granted),
            prompts: 0,
        };
        let mut gate = PermissionGate::new(sensor, MemoryPermissionStore::new());

        assert_eq!(gate.state(), PermissionState::Unavailable);
        assert_eq!(gate.request(), PermissionState::Unavailable);
        assert_eq!(gate.platform().prompts, 0);
        assert!(!gate.needs_permission());
    }

    #[test]
    fn test_no_consent_platform_is_granted() {
        let sensor = FakeSensor {
            consent: false,
            ..FakeSensor::consent(None)
        };
        let gate = PermissionGate::new(sensor, MemoryPermissionStore::new());

        assert_eq!(gate.state(), PermissionState::Granted);
        assert!(gate.allows_input());
        assert!(!gate.needs_permission());
    }

    #[test]
    fn test_prompt_then_grant_persists() {
        let store = MemoryPermissionStore::new();
        let mut gate = PermissionGate::new(
            FakeSensor::consent(Some(PermissionDecision::Granted)),
            store.clone(),
        );

        assert_eq!(gate.state(), PermissionState::Prompt);
        assert_eq!(gate.request(), PermissionState::Granted);
        assert_eq!(store.get(), Some(PermissionDecision::Granted));

        // Next session starts from the stored decision
        let next = PermissionGate::new(FakeSensor::consent(None), store);
        assert_eq!(next.state(), PermissionState::Granted);
    }

    #[test]
    fn test_request_error_is_persisted_denial() {
        let store = MemoryPermissionStore::new();
        let mut gate = PermissionGate::new(FakeSensor::consent(None), store.clone());

        assert_eq!(gate.request(), PermissionState::Denied);
        assert_eq!(store.get(), Some(PermissionDecision::Denied));
        assert!(!gate.allows_input());
    }

    #[test]
    fn test_external_completion() {
        let store = MemoryPermissionStore::new();
        let mut gate = PermissionGate::new(FakeSensor::consent(None), store.clone());

        let state = gate.complete_request(Ok(PermissionDecision::Granted));
        assert_eq!(state, PermissionState::Granted);
        assert_eq!(gate.platform().prompts, 0);
        assert_eq!(store.get(), Some(PermissionDecision::Granted));
    }
}
