//! Eye Orb Probe - Deciding how much rendering the device can afford
//!
//! - Capability probe: one-shot inspection producing the initial tier
//! - FPS probe: a short measured warmup that may lower the tier once

pub mod capability;
pub mod fps;

pub use capability::*;
pub use fps::*;
