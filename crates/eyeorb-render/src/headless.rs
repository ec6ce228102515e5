//! Headless backend that records what a GPU would have been asked to do
//!
//! Clones of a provider share one [`HeadlessLog`], so a test can keep a
//! handle while the renderer owns the context. Failures can be injected at
//! every step of the pipeline.

use std::cell::RefCell;
use std::rc::Rc;

use eyeorb_core::{OrbError, OrbResult, RenderTier};

use crate::backend::{backing_size, ContextDescriptor, GraphicsContext, GraphicsProvider};
use crate::geometry::SphereMesh;
use crate::shader::{ShaderProgram, Uniforms};

/// Everything the headless backend has been asked to do
#[derive(Debug, Clone, Default)]
pub struct HeadlessLog {
    pub contexts_created: u32,
    pub contexts_released: u32,
    pub contexts_lost: u32,
    pub descriptors: Vec<ContextDescriptor>,
    pub programs: Vec<RenderTier>,
    pub geometry_segments: Vec<u32>,
    pub pixel_ratios: Vec<f32>,
    pub backing_size: (u32, u32),
    pub draws: u64,
    pub last_uniforms: Option<Uniforms>,
}

impl HeadlessLog {
    /// Contexts created and not yet released
    pub fn live_contexts(&self) -> u32 {
        self.contexts_created - self.contexts_released
    }
}

/// Injected failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePlan {
    pub create_context: bool,
    pub upload_geometry: bool,
    pub build_program: bool,
    /// Fail every draw after this many successful ones
    pub draw_after: Option<u64>,
}

/// Recording provider
#[derive(Debug, Clone, Default)]
pub struct HeadlessProvider {
    log: Rc<RefCell<HeadlessLog>>,
    failures: Rc<RefCell<FailurePlan>>,
}

impl HeadlessProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(plan: FailurePlan) -> Self {
        let provider = Self::default();
        provider.set_failures(plan);
        provider
    }

    pub fn set_failures(&self, plan: FailurePlan) {
        *self.failures.borrow_mut() = plan;
    }

    /// Snapshot of the shared log
    pub fn log(&self) -> HeadlessLog {
        self.log.borrow().clone()
    }
}

impl GraphicsProvider for HeadlessProvider {
    type Context = HeadlessContext;

    fn create_context(&mut self, descriptor: &ContextDescriptor) -> OrbResult<HeadlessContext> {
        if self.failures.borrow().create_context {
            return Err(OrbError::GraphicsUnavailable("headless context refused".into()));
        }

        let mut log = self.log.borrow_mut();
        log.contexts_created += 1;
        log.descriptors.push(descriptor.clone());
        log.backing_size = descriptor.backing_size();

        Ok(HeadlessContext {
            log: Rc::clone(&self.log),
            failures: Rc::clone(&self.failures),
            size: (descriptor.width, descriptor.height),
            pixel_ratio: descriptor.pixel_ratio,
            draws: 0,
            ready: (false, false),
            released: false,
        })
    }
}

/// Recording context
#[derive(Debug)]
pub struct HeadlessContext {
    log: Rc<RefCell<HeadlessLog>>,
    failures: Rc<RefCell<FailurePlan>>,
    size: (u32, u32),
    pixel_ratio: f32,
    draws: u64,
    /// (geometry, program)
    ready: (bool, bool),
    released: bool,
}

impl HeadlessContext {
    fn update_backing(&self) {
        self.log.borrow_mut().backing_size = backing_size(self.size.0, self.size.1, self.pixel_ratio);
    }
}

impl GraphicsContext for HeadlessContext {
    fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.pixel_ratio = pixel_ratio;
        self.log.borrow_mut().pixel_ratios.push(pixel_ratio);
        self.update_backing();
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.update_backing();
    }

    fn upload_geometry(&mut self, mesh: &SphereMesh) -> OrbResult<()> {
        if self.failures.borrow().upload_geometry {
            return Err(OrbError::GeometryUpload("headless upload refused".into()));
        }
        self.ready.0 = true;
        self.log.borrow_mut().geometry_segments.push(mesh.segments);
        Ok(())
    }

    fn build_program(&mut self, program: &ShaderProgram) -> OrbResult<()> {
        if self.failures.borrow().build_program {
            return Err(OrbError::ProgramBuild("headless compile refused".into()));
        }
        self.ready.1 = true;
        self.log.borrow_mut().programs.push(program.tier);
        Ok(())
    }

    fn draw(&mut self, uniforms: &Uniforms) -> OrbResult<()> {
        if self.released {
            return Err(OrbError::ContextLost);
        }
        if self.ready != (true, true) {
            return Err(OrbError::DrawFailed("pipeline not built".into()));
        }
        if let Some(limit) = self.failures.borrow().draw_after {
            if self.draws >= limit {
                return Err(OrbError::DrawFailed("headless draw refused".into()));
            }
        }

        self.draws += 1;
        let mut log = self.log.borrow_mut();
        log.draws += 1;
        log.last_uniforms = Some(*uniforms);
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.log.borrow_mut().contexts_released += 1;
        }
    }

    fn lose_context(&mut self) -> OrbResult<()> {
        self.log.borrow_mut().contexts_lost += 1;
        Ok(())
    }
}
