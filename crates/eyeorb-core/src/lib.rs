//! Eye Orb Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by the orb subsystem:
//! - Quality tiers and the one-way degradation ladder
//! - Agent phases and the edge-triggered error flash
//! - Frame time primitives
//! - 2D vectors and frame-rate independent easing
//! - Error types

pub mod error;
pub mod math;
pub mod phase;
pub mod tier;
pub mod time;

pub use error::*;
pub use math::*;
pub use phase::*;
pub use tier::*;
pub use time::*;
