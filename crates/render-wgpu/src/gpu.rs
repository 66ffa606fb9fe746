use crate::mesh::{self, MeshData, MeshVertex};
use crate::shaders;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use worldview_camera::CameraInfo;
use worldview_common::Color;
use worldview_render::{
    ColoredVertex, CommandDefinition, DrawBatch, Gpu, GpuError, GpuStats, Instance, Primitive,
    RenderTarget, Shape,
};

/// Hitmap pixels must round-trip exact bytes.
const HITMAP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Maps OpenGL clip depth `[-w, w]` to wgpu's `[0, w]`.
#[rustfmt::skip]
const GL_TO_WGPU: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct InstanceData {
    model_0: [f32; 4],
    model_1: [f32; 4],
    model_2: [f32; 4],
    model_3: [f32; 4],
    color: [f32; 4],
}

impl From<&Instance> for InstanceData {
    fn from(instance: &Instance) -> Self {
        let cols = instance.model.to_cols_array_2d();
        Self {
            model_0: cols[0],
            model_1: cols[1],
            model_2: cols[2],
            model_3: cols[3],
            color: instance.color.to_array(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ColoredVertexData {
    position: [f32; 3],
    color: [f32; 4],
}

impl From<&ColoredVertex> for ColoredVertexData {
    fn from(v: &ColoredVertex) -> Self {
        Self {
            position: v.position.to_array(),
            color: v.color.to_array(),
        }
    }
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct Framebuffer {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct PipelineSet {
    mesh: wgpu::RenderPipeline,
    triangles: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
}

struct Pipelines {
    canvas: PipelineSet,
    hitmap: PipelineSet,
}

/// Compiled program of the wgpu backend.
pub struct WgpuCommand {
    label: &'static str,
    pipelines: Arc<Pipelines>,
}

impl std::fmt::Debug for WgpuCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuCommand").field("label", &self.label).finish()
    }
}

enum UploadedBatch {
    Instances {
        shape: Shape,
        buffer: wgpu::Buffer,
        count: u32,
    },
    Vertices {
        primitive: Primitive,
        buffer: wgpu::Buffer,
        count: u32,
    },
}

struct PendingDraw {
    pipelines: Arc<Pipelines>,
    bind_group: wgpu::BindGroup,
    batches: Vec<UploadedBatch>,
}

struct Frame {
    target: RenderTarget,
    clear: Color,
    draws: Vec<PendingDraw>,
}

/// [`Gpu`] backend on a wgpu device.
///
/// Draws are uploaded as they arrive and encoded into one render pass when
/// the frame ends. Canvas frames go to the view handed over with
/// [`set_canvas_view`](Self::set_canvas_view), or to an offscreen texture
/// when none was given.
pub struct WgpuGpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
    canvas_format: wgpu::TextureFormat,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    mesh_shader: wgpu::ShaderModule,
    colored_shader: wgpu::ShaderModule,
    meshes: HashMap<Shape, GpuMesh>,
    canvas: Framebuffer,
    canvas_view: Option<wgpu::TextureView>,
    hitmap: Option<Framebuffer>,
    frame: Option<Frame>,
    transient_buffers: usize,
    compiled: usize,
    draw_calls: u64,
    destroyed: bool,
}

impl WgpuGpu {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        canvas_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("worldview_uniforms_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("worldview_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mesh_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::MESH_SHADER.into()),
        });
        let colored_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("colored_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::COLORED_SHADER.into()),
        });

        let meshes = [
            (Shape::Cube, mesh::cube()),
            (Shape::Sphere, mesh::sphere(24, 16)),
            (Shape::Cylinder, mesh::cylinder(24)),
            (Shape::Cone, mesh::cone(24)),
        ]
        .into_iter()
        .map(|(shape, data)| (shape, upload_mesh(&device, shape, &data)))
        .collect();

        let canvas = create_framebuffer(&device, canvas_format, width, height, "canvas");

        Self {
            device,
            queue,
            canvas_format,
            bind_group_layout,
            pipeline_layout,
            mesh_shader,
            colored_shader,
            meshes,
            canvas,
            canvas_view: None,
            hitmap: None,
            frame: None,
            transient_buffers: 0,
            compiled: 0,
            draw_calls: 0,
            destroyed: false,
        }
    }

    /// Backend on the first available adapter with no window. Canvas frames
    /// render to an offscreen RGBA8 texture.
    pub async fn offscreen(width: u32, height: u32) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| GpuError::Surface("no compatible adapter".into()))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("worldview_offscreen_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuError::Surface(e.to_string()))?;
        tracing::info!(backend = adapter.get_info().backend.to_str(), "offscreen wgpu device ready");
        Ok(Self::new(device, queue, wgpu::TextureFormat::Rgba8Unorm, width, height))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn canvas_format(&self) -> wgpu::TextureFormat {
        self.canvas_format
    }

    /// Resize the canvas depth buffer and offscreen color target.
    pub fn resize_canvas(&mut self, width: u32, height: u32) {
        if (self.canvas.width, self.canvas.height) != (width.max(1), height.max(1)) {
            self.canvas = create_framebuffer(&self.device, self.canvas_format, width, height, "canvas");
        }
    }

    /// Target of the next canvas frame, typically the current surface
    /// texture. Consumed when that frame ends.
    pub fn set_canvas_view(&mut self, view: wgpu::TextureView) {
        self.canvas_view = Some(view);
    }

    fn alive(&self) -> Result<(), GpuError> {
        if self.destroyed {
            Err(GpuError::ContextLost)
        } else {
            Ok(())
        }
    }

    fn pipeline_set(&self, format: wgpu::TextureFormat, hitmap: bool, label: &str) -> PipelineSet {
        let blend = if hitmap {
            wgpu::BlendState::REPLACE
        } else {
            wgpu::BlendState::ALPHA_BLENDING
        };
        let mesh_buffers = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<MeshVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<InstanceData>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &wgpu::vertex_attr_array![
                    2 => Float32x4,
                    3 => Float32x4,
                    4 => Float32x4,
                    5 => Float32x4,
                    6 => Float32x4,
                ],
            },
        ];
        let colored_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ColoredVertexData>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4],
        }];
        let fs_mesh = if hitmap { "fs_hitmap" } else { "fs_main" };
        let pipeline = |name: &str,
                        module: &wgpu::ShaderModule,
                        vs: &str,
                        fs: &str,
                        buffers: &[wgpu::VertexBufferLayout<'_>],
                        topology: wgpu::PrimitiveTopology| {
            self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("{label}_{name}")),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some(vs),
                    compilation_options: Default::default(),
                    buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(fs),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        };
        PipelineSet {
            mesh: pipeline(
                "mesh",
                &self.mesh_shader,
                "vs_main",
                fs_mesh,
                &mesh_buffers,
                wgpu::PrimitiveTopology::TriangleList,
            ),
            triangles: pipeline(
                "triangles",
                &self.colored_shader,
                "vs_colored",
                "fs_colored",
                &colored_buffers,
                wgpu::PrimitiveTopology::TriangleList,
            ),
            lines: pipeline(
                "lines",
                &self.colored_shader,
                "vs_colored",
                "fs_colored",
                &colored_buffers,
                wgpu::PrimitiveTopology::LineList,
            ),
        }
    }

    fn upload(&self, batch: &DrawBatch) -> UploadedBatch {
        match batch {
            DrawBatch::Instances { shape, instances } => {
                let data: Vec<InstanceData> = instances.iter().map(InstanceData::from).collect();
                UploadedBatch::Instances {
                    shape: *shape,
                    buffer: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("instance_buffer"),
                        contents: bytemuck::cast_slice(&data),
                        usage: wgpu::BufferUsages::VERTEX,
                    }),
                    count: data.len() as u32,
                }
            }
            DrawBatch::Vertices {
                primitive,
                vertices,
            } => {
                let data: Vec<ColoredVertexData> =
                    vertices.iter().map(ColoredVertexData::from).collect();
                UploadedBatch::Vertices {
                    primitive: *primitive,
                    buffer: self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("vertex_buffer"),
                        contents: bytemuck::cast_slice(&data),
                        usage: wgpu::BufferUsages::VERTEX,
                    }),
                    count: data.len() as u32,
                }
            }
        }
    }

    fn encode(
        &self,
        frame: &Frame,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
    ) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("worldview_frame_encoder"),
        });
        {
            let [r, g, b, a] = frame.clear.to_array().map(f64::from);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(match frame.target {
                    RenderTarget::Canvas => "canvas_pass",
                    RenderTarget::Hitmap => "hitmap_pass",
                }),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for draw in &frame.draws {
                let set = match frame.target {
                    RenderTarget::Canvas => &draw.pipelines.canvas,
                    RenderTarget::Hitmap => &draw.pipelines.hitmap,
                };
                pass.set_bind_group(0, &draw.bind_group, &[]);
                for batch in &draw.batches {
                    match batch {
                        UploadedBatch::Instances {
                            shape,
                            buffer,
                            count,
                        } => {
                            let Some(mesh) = self.meshes.get(shape) else {
                                continue;
                            };
                            pass.set_pipeline(&set.mesh);
                            pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                            pass.set_vertex_buffer(1, buffer.slice(..));
                            pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint16);
                            pass.draw_indexed(0..mesh.index_count, 0, 0..*count);
                        }
                        UploadedBatch::Vertices {
                            primitive,
                            buffer,
                            count,
                        } => {
                            pass.set_pipeline(match primitive {
                                Primitive::Triangles => &set.triangles,
                                Primitive::Lines => &set.lines,
                            });
                            pass.set_vertex_buffer(0, buffer.slice(..));
                            pass.draw(0..*count, 0..1);
                        }
                    }
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn read_hitmap_region(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>, GpuError> {
        self.alive()?;
        let fb = self
            .hitmap
            .as_ref()
            .ok_or_else(|| GpuError::Readback("hitmap framebuffer not sized".into()))?;
        if width == 0 || height == 0 || x + width > fb.width || y + height > fb.height {
            return Err(GpuError::Readback(format!(
                "region {x},{y} {width}x{height} outside {}x{} framebuffer",
                fb.width, fb.height
            )));
        }

        let unpadded = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("hitmap_readback"),
            size: (padded * height) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // textures are stored top-down, reads are addressed bottom-up
        let top = fb.height - (y + height);
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("hitmap_readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &fb.color,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y: top, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let status = self.device.poll(wgpu::Maintain::Wait);
        let received = rx.try_recv();
        if received.is_err() {
            tracing::warn!(
                queue_empty = status.is_queue_empty(),
                "hitmap readback never mapped after waiting on the device"
            );
        }
        map_outcome(received)?;

        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded as usize).rev() {
                pixels.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        staging.unmap();
        Ok(pixels)
    }
}

impl Gpu for WgpuGpu {
    type Command = WgpuCommand;

    fn compile(&mut self, definition: &CommandDefinition) -> Result<WgpuCommand, GpuError> {
        self.alive()?;
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipelines = Pipelines {
            canvas: self.pipeline_set(self.canvas_format, false, definition.label),
            hitmap: self.pipeline_set(HITMAP_FORMAT, true, definition.label),
        };
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::Compile {
                label: definition.label,
                reason: err.to_string(),
            });
        }
        self.compiled += 1;
        tracing::debug!(command = definition.label, "compiled wgpu pipelines");
        Ok(WgpuCommand {
            label: definition.label,
            pipelines: Arc::new(pipelines),
        })
    }

    fn resize_hitmap(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        self.alive()?;
        let current = self.hitmap.as_ref().map(|fb| (fb.width, fb.height));
        if current != Some((width.max(1), height.max(1))) {
            self.hitmap = Some(create_framebuffer(&self.device, HITMAP_FORMAT, width, height, "hitmap"));
        }
        Ok(())
    }

    fn begin_frame(&mut self, target: RenderTarget, clear: Color) -> Result<(), GpuError> {
        self.alive()?;
        self.frame = Some(Frame {
            target,
            clear,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw(
        &mut self,
        command: &WgpuCommand,
        camera: &CameraInfo,
        batches: &[DrawBatch],
    ) -> Result<(), GpuError> {
        self.alive()?;
        if self.frame.is_none() {
            return Err(GpuError::NoFrame);
        }
        let uniforms = Uniforms {
            view_proj: (GL_TO_WGPU * camera.view_projection()).to_cols_array_2d(),
        };
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("draw_uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let uploaded: Vec<UploadedBatch> = batches.iter().map(|b| self.upload(b)).collect();
        self.draw_calls += 1;
        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(PendingDraw {
                pipelines: command.pipelines.clone(),
                bind_group,
                batches: uploaded,
            });
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        self.alive()?;
        let frame = self.frame.take().ok_or(GpuError::NoFrame)?;
        let external = match frame.target {
            RenderTarget::Canvas => self.canvas_view.take(),
            RenderTarget::Hitmap => None,
        };
        let (color, depth) = match frame.target {
            RenderTarget::Canvas => (
                external.as_ref().unwrap_or(&self.canvas.color_view),
                &self.canvas.depth_view,
            ),
            RenderTarget::Hitmap => {
                let fb = self
                    .hitmap
                    .as_ref()
                    .ok_or_else(|| GpuError::Surface("hitmap framebuffer not sized".into()))?;
                (&fb.color_view, &fb.depth_view)
            }
        };
        self.encode(&frame, color, depth);
        self.transient_buffers = frame.draws.iter().map(|d| 1 + d.batches.len()).sum();
        Ok(())
    }

    fn read_pixels(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> impl Future<Output = Result<Vec<u8>, GpuError>> {
        std::future::ready(self.read_hitmap_region(x, y, width, height))
    }

    fn poll(&mut self) {
        if !self.destroyed {
            let status = self.device.poll(wgpu::Maintain::Poll);
            tracing::trace!(queue_empty = status.is_queue_empty(), "device polled");
        }
    }

    fn stats(&self) -> GpuStats {
        let framebuffers = 1 + usize::from(self.hitmap.is_some());
        GpuStats {
            buffer_count: self.meshes.len() * 2 + self.transient_buffers,
            texture_count: framebuffers * 2,
            compiled_commands: self.compiled,
            draw_calls: self.draw_calls,
        }
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        self.frame = None;
        self.canvas_view = None;
        self.hitmap = None;
        self.meshes.clear();
        self.transient_buffers = 0;
        tracing::info!("wgpu backend destroyed");
    }
}

fn upload_mesh(device: &wgpu::Device, shape: Shape, data: &MeshData) -> GpuMesh {
    let label = format!("{shape:?}").to_lowercase();
    GpuMesh {
        vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_vertex_buffer")),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }),
        indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_index_buffer")),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        }),
        index_count: data.indices.len() as u32,
    }
}

fn create_framebuffer(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    label: &str,
) -> Framebuffer {
    let size = wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = |format: wgpu::TextureFormat, usage: wgpu::TextureUsages, name: &str| {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{label}_{name}")),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        })
    };
    let color = texture(
        format,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        "color",
    );
    let depth = texture(DEPTH_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT, "depth");
    Framebuffer {
        color_view: color.create_view(&Default::default()),
        depth_view: depth.create_view(&Default::default()),
        color,
        width: size.width,
        height: size.height,
    }
}

/// Result of mapping a staging buffer once the device has been waited on. A
/// callback that never ran means the device went away underneath the read.
fn map_outcome(
    received: Result<Result<(), wgpu::BufferAsyncError>, std::sync::mpsc::TryRecvError>,
) -> Result<(), GpuError> {
    match received {
        Ok(result) => result.map_err(|e| GpuError::Readback(e.to_string())),
        Err(_) => Err(GpuError::ContextLost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::TryRecvError;

    #[test]
    fn unmapped_readback_reports_lost_context() {
        assert!(map_outcome(Ok(Ok(()))).is_ok());
        assert!(matches!(
            map_outcome(Ok(Err(wgpu::BufferAsyncError))),
            Err(GpuError::Readback(_))
        ));
        assert!(matches!(map_outcome(Err(TryRecvError::Empty)), Err(GpuError::ContextLost)));
        assert!(matches!(
            map_outcome(Err(TryRecvError::Disconnected)),
            Err(GpuError::ContextLost)
        ));
    }

    #[test]
    fn clip_depth_is_remapped() {
        let near = GL_TO_WGPU * glam::Vec4::new(0.0, 0.0, -1.0, 1.0);
        let far = GL_TO_WGPU * glam::Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(near.z, 0.0);
        assert_eq!(far.z, 1.0);
    }

    #[test]
    fn instance_data_is_column_major() {
        let instance = Instance {
            model: Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0)),
            color: Color::WHITE,
        };
        let data = InstanceData::from(&instance);
        assert_eq!(data.model_3, [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(data.color, [1.0; 4]);
    }
}
