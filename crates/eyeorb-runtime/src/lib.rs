//! Eye Orb Runtime - Host-facing orchestration
//!
//! This crate ties the components together:
//! - Frame scheduling with at most one pending request
//! - The controller owning tier state, renderer, probe and input
//! - Settings loading and validation
//! - Logging setup

pub mod config;
pub mod controller;
pub mod host;
pub mod observability;
pub mod scheduler;

pub use config::*;
pub use controller::*;
pub use host::*;
pub use observability::*;
pub use scheduler::*;
