//! wgpu backend rendering into an offscreen texture
//!
//! The host composites [`WgpuContext::output`] itself. High tier renders
//! with 4x MSAA resolved into the output texture.

use wgpu::util::DeviceExt;

use eyeorb_core::{OrbError, OrbResult};

use crate::backend::{
    backing_size, ContextDescriptor, GraphicsContext, GraphicsProvider, PowerPreference,
};
use crate::geometry::SphereMesh;
use crate::shader::{ShaderProgram, Uniforms, UNIFORM_FLOATS};

const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const MSAA_SAMPLES: u32 = 4;
const VERTEX_STRIDE: u64 = 6 * std::mem::size_of::<f32>() as u64;
const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

/// Creates one device per context
pub struct WgpuProvider {
    instance: wgpu::Instance,
}

impl WgpuProvider {
    pub fn new() -> Self {
        WgpuProvider {
            instance: wgpu::Instance::default(),
        }
    }
}

impl Default for WgpuProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsProvider for WgpuProvider {
    type Context = WgpuContext;

    fn create_context(&mut self, descriptor: &ContextDescriptor) -> OrbResult<WgpuContext> {
        let power_preference = match descriptor.power_preference {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
        };
        let adapter = pollster::block_on(self.instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|err| OrbError::GraphicsUnavailable(err.to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("eyeorb device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| OrbError::GraphicsUnavailable(err.to_string()))?;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("orb uniforms"),
            size: (UNIFORM_FLOATS * std::mem::size_of::<f32>()) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("orb uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("orb uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("orb pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        let sample_count = if descriptor.antialias { MSAA_SAMPLES } else { 1 };
        let (width, height) = descriptor.backing_size();
        let targets = RenderTargets::new(&device, width, height, sample_count);

        tracing::info!(
            adapter = %adapter.get_info().name,
            width,
            height,
            sample_count,
            "wgpu context created"
        );

        Ok(WgpuContext {
            device,
            queue,
            uniform_buffer,
            uniform_bind_group,
            pipeline_layout,
            pipeline: None,
            mesh: None,
            targets: Some(targets),
            sample_count,
            css_size: (descriptor.width, descriptor.height),
            pixel_ratio: descriptor.pixel_ratio,
        })
    }
}

struct RenderTargets {
    output: wgpu::Texture,
    output_view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
}

impl RenderTargets {
    fn new(device: &wgpu::Device, width: u32, height: u32, sample_count: u32) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = |label: &str, samples: u32, usage: wgpu::TextureUsages| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: samples,
                dimension: wgpu::TextureDimension::D2,
                format: OUTPUT_FORMAT,
                usage,
                view_formats: &[],
            })
        };

        let output = texture(
            "orb output",
            1,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        );
        let output_view = output.create_view(&wgpu::TextureViewDescriptor::default());
        let msaa_view = (sample_count > 1).then(|| {
            texture("orb msaa", sample_count, wgpu::TextureUsages::RENDER_ATTACHMENT)
                .create_view(&wgpu::TextureViewDescriptor::default())
        });

        RenderTargets {
            output,
            output_view,
            msaa_view,
        }
    }
}

struct MeshBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

/// GPU resources of one renderer
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    pipeline_layout: wgpu::PipelineLayout,
    pipeline: Option<wgpu::RenderPipeline>,
    mesh: Option<MeshBuffers>,
    targets: Option<RenderTargets>,
    sample_count: u32,
    css_size: (u32, u32),
    pixel_ratio: f32,
}

impl WgpuContext {
    /// Texture holding the last rendered frame
    pub fn output(&self) -> Option<&wgpu::Texture> {
        self.targets.as_ref().map(|targets| &targets.output)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn rebuild_targets(&mut self) {
        if self.targets.is_none() {
            return;
        }
        let (width, height) = backing_size(self.css_size.0, self.css_size.1, self.pixel_ratio);
        self.targets = Some(RenderTargets::new(&self.device, width, height, self.sample_count));
    }

    fn validated<T>(&self, build: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }
}

impl GraphicsContext for WgpuContext {
    fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.pixel_ratio = pixel_ratio;
        self.rebuild_targets();
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.css_size != (width, height) {
            self.css_size = (width, height);
            self.rebuild_targets();
        }
    }

    fn upload_geometry(&mut self, mesh: &SphereMesh) -> OrbResult<()> {
        let vertices = mesh.interleaved();
        let index_count = u32::try_from(mesh.indices.len())
            .map_err(|_| OrbError::GeometryUpload("index count exceeds u32".into()))?;

        let buffers = self
            .validated(|device| MeshBuffers {
                vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("orb vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("orb indices"),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                index_count,
            })
            .map_err(OrbError::GeometryUpload)?;

        if let Some(old) = self.mesh.replace(buffers) {
            old.vertices.destroy();
            old.indices.destroy();
        }
        Ok(())
    }

    fn build_program(&mut self, program: &ShaderProgram) -> OrbResult<()> {
        let layout = &self.pipeline_layout;
        let sample_count = self.sample_count;

        let pipeline = self
            .validated(|device| {
                let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("orb program"),
                    source: wgpu::ShaderSource::Wgsl(program.source.as_str().into()),
                });

                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("orb pipeline"),
                    layout: Some(layout),
                    vertex: wgpu::VertexState {
                        module: &module,
                        entry_point: Some(ShaderProgram::VERTEX_ENTRY),
                        buffers: &[wgpu::VertexBufferLayout {
                            array_stride: VERTEX_STRIDE,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &VERTEX_ATTRIBUTES,
                        }],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: Some(wgpu::Face::Back),
                        polygon_mode: wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState {
                        count: sample_count,
                        ..Default::default()
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &module,
                        entry_point: Some(ShaderProgram::FRAGMENT_ENTRY),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: OUTPUT_FORMAT,
                            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    multiview: None,
                    cache: None,
                })
            })
            .map_err(OrbError::ProgramBuild)?;

        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn draw(&mut self, uniforms: &Uniforms) -> OrbResult<()> {
        let (Some(pipeline), Some(mesh), Some(targets)) =
            (self.pipeline.as_ref(), self.mesh.as_ref(), self.targets.as_ref())
        else {
            return Err(OrbError::DrawFailed("pipeline not built".into()));
        };

        let block = uniforms.to_block();
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&block));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("orb frame"),
            });

        let (view, resolve_target) = match targets.msaa_view.as_ref() {
            Some(msaa) => (msaa, Some(&targets.output_view)),
            None => (&targets.output_view, None),
        };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("orb pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertices.slice(..));
            pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn release(&mut self) {
        self.pipeline = None;
        if let Some(mesh) = self.mesh.take() {
            mesh.vertices.destroy();
            mesh.indices.destroy();
        }
        if let Some(targets) = self.targets.take() {
            targets.output.destroy();
        }
        self.uniform_buffer.destroy();
    }

    fn lose_context(&mut self) -> OrbResult<()> {
        self.device.destroy();
        Ok(())
    }
}
