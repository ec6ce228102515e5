//! Eye Orb Input - Tilt sensor samples to a smoothed look vector
//!
//! This crate implements the orientation input pipeline:
//! - Normalization, deadzone and clamping of raw tilt angles
//! - Frame-rate independent low-pass smoothing
//! - Consent state machine with a durable decision store
//! - Enable/disable handling with instantaneous reset

pub mod filter;
pub mod permission;
pub mod pipeline;
pub mod store;

pub use filter::*;
pub use permission::*;
pub use pipeline::*;
pub use store::*;
