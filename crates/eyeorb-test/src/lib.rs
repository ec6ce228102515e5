//! Eye orb test harness - deterministic simulation of a mounted orb
//!
//! This crate provides:
//! - A frame host on a virtual clock with seeded frame jitter
//! - Scripted capability environments and tilt sensors
//! - A scenario driver with phase scripts
//! - The `orb-sim` command line simulator

pub mod integration;
pub mod scenario;
pub mod scripted;
pub mod simulator;

pub use integration::*;
pub use scenario::*;
pub use scripted::*;
pub use simulator::*;
