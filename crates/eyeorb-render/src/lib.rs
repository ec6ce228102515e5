//! Eye Orb Render - GPU renderer lifecycle
//!
//! The renderer does not know which graphics API it drives. It talks to a
//! [`GraphicsContext`], created by a [`GraphicsProvider`]:
//! - [`HeadlessProvider`]: records calls, used by tests and simulations
//! - `WgpuProvider` (feature `wgpu`): offscreen rendering with wgpu
//!
//! Per frame the renderer eases its state, uploads uniforms and issues one
//! draw, in that order.

pub mod backend;
pub mod geometry;
pub mod headless;
pub mod renderer;
pub mod shader;
pub mod theme;

#[cfg(feature = "wgpu")]
pub mod gpu;

pub use backend::*;
pub use geometry::*;
pub use headless::*;
pub use renderer::*;
pub use shader::*;
pub use theme::*;

#[cfg(feature = "wgpu")]
pub use gpu::*;
