//! wgpu backend
//!
//! Renders the draw list into an offscreen RGBA8 target with one
//! textured-quad pipeline. Fills and strokes sample a 1x1 white texture, so
//! every command is the same kind of quad. Sprite clipping is done on the CPU
//! by trimming the quad and its UVs.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::config::Viewport;
use crate::error::{PreviewError, PreviewResult};
use crate::render::{
    BackendFactory, BackendKind, Color, DrawCommand, DrawList, Rect, RenderBackend, SurfaceInfo,
};
use crate::texture::Texture;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Frames a cached texture may go unused before it is dropped
const TEXTURE_IDLE_FRAMES: u64 = 120;

const READBACK_TIMEOUT: Duration = Duration::from_secs(2);

const QUAD_SHADER_WGSL: &str = r#"
struct Globals {
    viewport: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> globals: Globals;
@group(1) @binding(0) var sprite_tex: texture_2d<f32>;
@group(1) @binding(1) var sprite_sampler: sampler;

struct VsIn {
    @location(0) pos: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec4<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    let ndc = vec2<f32>(
        in.pos.x / globals.viewport.x * 2.0 - 1.0,
        1.0 - in.pos.y / globals.viewport.y * 2.0,
    );
    out.clip = vec4<f32>(ndc, 0.0, 1.0);
    out.uv = in.uv;
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(sprite_tex, sprite_sampler, in.uv) * in.color;
}
"#;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct QuadVertex {
    pos: [f32; 2],
    uv: [f32; 2],
    color: [f32; 4],
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct Globals {
    viewport: [f32; 2],
    _pad: [f32; 2],
}

struct CachedTexture {
    bind_group: wgpu::BindGroup,
    last_used: u64,
}

/// Consecutive quads sharing one texture
struct Batch {
    texture: Option<u64>,
    vertices: Range<u32>,
}

/// GPU renderer bound to one offscreen target
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white: wgpu::BindGroup,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    width: u32,
    height: u32,
    device_pixel_ratio: f32,
    generation: u32,
    textures: HashMap<u64, CachedTexture>,
    frame: u64,
    lost: Arc<AtomicBool>,
    adapter_info: wgpu::AdapterInfo,
}

impl GpuBackend {
    /// Create device, pipeline and target (async)
    pub async fn new(
        width: u32,
        height: u32,
        device_pixel_ratio: f32,
        generation: u32,
        power_preference: wgpu::PowerPreference,
    ) -> PreviewResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| PreviewError::BackendInit(format!("no suitable GPU adapter: {}", e)))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using GPU: {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("rf-preview device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await
            .map_err(|e| PreviewError::BackendInit(e.to_string()))?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::warn!("GPU device lost ({:?}): {}", reason, message);
            flag.store(true, Ordering::Release);
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quad_shader"),
            source: wgpu::ShaderSource::Wgsl(QUAD_SHADER_WGSL.into()),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals_bgl"),
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

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad_pl"),
            bind_group_layouts: &[&globals_layout, &texture_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("quad_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("globals"),
            contents: bytemuck::bytes_of(&Globals {
                viewport: [width as f32, height as f32],
                _pad: [0.0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals_bg"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprite_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let white = upload(&device, &queue, &texture_layout, &sampler, 1, 1, &[255; 4]);
        let (target, target_view) = create_target(&device, width, height)?;

        Ok(Self {
            device,
            queue,
            pipeline,
            globals_buffer,
            globals_bind_group,
            texture_layout,
            sampler,
            white,
            target,
            target_view,
            width,
            height,
            device_pixel_ratio,
            generation,
            textures: HashMap::new(),
            frame: 0,
            lost,
            adapter_info,
        })
    }

    /// Create backend (blocking)
    pub fn new_blocking(
        width: u32,
        height: u32,
        device_pixel_ratio: f32,
        generation: u32,
        power_preference: wgpu::PowerPreference,
    ) -> PreviewResult<Self> {
        pollster::block_on(Self::new(
            width,
            height,
            device_pixel_ratio,
            generation,
            power_preference,
        ))
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    fn ensure_texture(&mut self, texture: &Texture) {
        let frame = self.frame;
        if let Some(cached) = self.textures.get_mut(&texture.id()) {
            cached.last_used = frame;
            return;
        }
        let bind_group = upload(
            &self.device,
            &self.queue,
            &self.texture_layout,
            &self.sampler,
            texture.width,
            texture.height,
            &texture.pixels,
        );
        self.textures.insert(
            texture.id(),
            CachedTexture {
                bind_group,
                last_used: frame,
            },
        );
    }

    fn evict_stale_textures(&mut self) {
        let frame = self.frame;
        self.textures
            .retain(|_, cached| frame.saturating_sub(cached.last_used) <= TEXTURE_IDLE_FRAMES);
    }

    /// Flatten the draw list into vertices and per-texture batches
    fn tessellate(&mut self, list: &DrawList) -> (Vec<QuadVertex>, Vec<Batch>) {
        let s = self.device_pixel_ratio;
        let mut vertices: Vec<QuadVertex> = Vec::with_capacity(list.len() * 6);
        let mut batches: Vec<Batch> = Vec::new();

        let mut push = |vertices: &mut Vec<QuadVertex>, texture: Option<u64>, quad: [QuadVertex; 6]| {
            let start = vertices.len() as u32;
            vertices.extend_from_slice(&quad);
            let end = vertices.len() as u32;
            match batches.last_mut() {
                Some(batch) if batch.texture == texture && batch.vertices.end == start => {
                    batch.vertices.end = end;
                }
                _ => batches.push(Batch {
                    texture,
                    vertices: start..end,
                }),
            }
        };

        for command in &list.commands {
            match command {
                DrawCommand::FillRect { rect, color } => {
                    push(&mut vertices, None, quad(&rect_scaled(rect, s), [0.0, 0.0, 1.0, 1.0], *color));
                }
                DrawCommand::StrokeRect {
                    rect,
                    color,
                    thickness,
                } => {
                    let t = thickness.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
                    if t <= 0.0 {
                        continue;
                    }
                    let inner_h = rect.height - 2.0 * t;
                    for edge in [
                        Rect::new(rect.x, rect.y, rect.width, t),
                        Rect::new(rect.x, rect.bottom() - t, rect.width, t),
                        Rect::new(rect.x, rect.y + t, t, inner_h),
                        Rect::new(rect.right() - t, rect.y + t, t, inner_h),
                    ] {
                        push(&mut vertices, None, quad(&rect_scaled(&edge, s), [0.0, 0.0, 1.0, 1.0], *color));
                    }
                }
                DrawCommand::Sprite {
                    texture,
                    rect,
                    alpha,
                    clip,
                } => {
                    if *alpha <= 0.0 || rect.width <= 0.0 || rect.height <= 0.0 {
                        continue;
                    }
                    let Some((visible, uv)) = clip_quad(rect, clip.as_ref()) else {
                        continue;
                    };
                    self.ensure_texture(texture);
                    let tint = Color::WHITE.with_alpha(*alpha);
                    push(&mut vertices, Some(texture.id()), quad(&rect_scaled(&visible, s), uv, tint));
                }
            }
        }
        (vertices, batches)
    }
}

impl RenderBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) -> PreviewResult<()> {
        if self.lost.load(Ordering::Acquire) {
            return Err(PreviewError::ContextLost);
        }
        if width != self.width || height != self.height {
            let (target, view) = create_target(&self.device, width, height)?;
            self.target = target;
            self.target_view = view;
            self.width = width;
            self.height = height;
        }
        self.device_pixel_ratio = device_pixel_ratio;
        Ok(())
    }

    fn render(&mut self, list: &DrawList) -> PreviewResult<()> {
        if self.lost.load(Ordering::Acquire) {
            return Err(PreviewError::ContextLost);
        }
        self.frame += 1;

        self.queue.write_buffer(
            &self.globals_buffer,
            0,
            bytemuck::bytes_of(&Globals {
                viewport: [self.width as f32, self.height as f32],
                _pad: [0.0; 2],
            }),
        );

        let (vertices, batches) = self.tessellate(list);
        let vertex_buffer = (!vertices.is_empty()).then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quads"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        let clear = list.clear_color.unwrap_or(Color::BLACK);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quad_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.r as f64,
                            g: clear.g as f64,
                            b: clear.b as f64,
                            a: clear.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(buffer) = &vertex_buffer {
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &self.globals_bind_group, &[]);
                pass.set_vertex_buffer(0, buffer.slice(..));
                for batch in &batches {
                    let bind_group = match batch.texture.and_then(|id| self.textures.get(&id)) {
                        Some(cached) => &cached.bind_group,
                        None => &self.white,
                    };
                    pass.set_bind_group(1, bind_group, &[]);
                    pass.draw(batch.vertices.clone(), 0..1);
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.evict_stale_textures();

        if self.lost.load(Ordering::Acquire) {
            return Err(PreviewError::ContextLost);
        }
        Ok(())
    }

    fn surface(&self) -> SurfaceInfo {
        SurfaceInfo {
            kind: BackendKind::Gpu,
            width: self.width,
            height: self.height,
            device_pixel_ratio: self.device_pixel_ratio,
            generation: self.generation,
        }
    }

    fn read_pixels(&mut self) -> PreviewResult<Vec<u8>> {
        if self.lost.load(Ordering::Acquire) {
            return Err(PreviewError::ContextLost);
        }
        let unpadded = self.width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;
        let size = padded as u64 * self.height as u64;

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(READBACK_TIMEOUT),
            })
            .map_err(|e| PreviewError::Render(format!("readback poll failed: {}", e)))?;
        match rx.recv_timeout(READBACK_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PreviewError::Render(format!("readback map failed: {}", e))),
            Err(_) => return Err(PreviewError::Render("readback timed out".into())),
        }

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * self.height) as usize);
        for row in data.chunks_exact(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
        drop(data);
        readback.unmap();
        Ok(pixels)
    }
}

/// Creates `GpuBackend`s
#[derive(Debug, Clone, Copy)]
pub struct GpuFactory {
    pub power_preference: wgpu::PowerPreference,
}

impl Default for GpuFactory {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

impl BackendFactory for GpuFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn create(&self, viewport: &Viewport, generation: u32) -> PreviewResult<Box<dyn RenderBackend>> {
        let (width, height) = viewport.physical_size();
        let backend = GpuBackend::new_blocking(
            width,
            height,
            viewport.effective_pixel_ratio(),
            generation,
            self.power_preference,
        )?;
        Ok(Box::new(backend))
    }
}

fn create_target(device: &wgpu::Device, width: u32, height: u32) -> PreviewResult<(wgpu::Texture, wgpu::TextureView)> {
    let limit = device.limits().max_texture_dimension_2d;
    if width == 0 || height == 0 || width > limit || height > limit {
        return Err(PreviewError::Render(format!(
            "surface {}x{} out of range (max {})",
            width, height, limit
        )));
    }
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("preview_target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok((texture, view))
}

fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> wgpu::BindGroup {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("sprite_texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("sprite_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn rect_scaled(rect: &Rect, s: f32) -> Rect {
    Rect::new(rect.x * s, rect.y * s, rect.width * s, rect.height * s)
}

/// Visible part of `rect` and its UV window `[u0, v0, u1, v1]`
fn clip_quad(rect: &Rect, clip: Option<&Rect>) -> Option<(Rect, [f32; 4])> {
    let visible = match clip {
        Some(clip) => rect.intersect(clip)?,
        None => *rect,
    };
    let u0 = (visible.x - rect.x) / rect.width;
    let v0 = (visible.y - rect.y) / rect.height;
    let u1 = (visible.right() - rect.x) / rect.width;
    let v1 = (visible.bottom() - rect.y) / rect.height;
    Some((visible, [u0, v0, u1, v1]))
}

fn quad(rect: &Rect, uv: [f32; 4], color: Color) -> [QuadVertex; 6] {
    let color = [color.r, color.g, color.b, color.a];
    let [u0, v0, u1, v1] = uv;
    let v = |x: f32, y: f32, u: f32, w: f32| QuadVertex {
        pos: [x, y],
        uv: [u, w],
        color,
    };
    let tl = v(rect.x, rect.y, u0, v0);
    let tr = v(rect.right(), rect.y, u1, v0);
    let br = v(rect.right(), rect.bottom(), u1, v1);
    let bl = v(rect.x, rect.bottom(), u0, v1);
    [tl, tr, br, tl, br, bl]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_quad_trims_uvs() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let clip = Rect::new(0.0, 5.0, 10.0, 10.0);
        let (visible, uv) = clip_quad(&rect, Some(&clip)).unwrap();
        assert_eq!(visible, Rect::new(0.0, 5.0, 10.0, 5.0));
        assert_eq!(uv, [0.0, 0.5, 1.0, 1.0]);
        assert!(clip_quad(&rect, Some(&Rect::new(20.0, 20.0, 1.0, 1.0))).is_none());
    }

    #[test]
    fn test_quad_winding() {
        let q = quad(&Rect::new(1.0, 2.0, 3.0, 4.0), [0.0, 0.0, 1.0, 1.0], Color::WHITE);
        assert_eq!(q[0].pos, [1.0, 2.0]);
        assert_eq!(q[2].pos, [4.0, 6.0]);
        assert_eq!(q[5].uv, [0.0, 1.0]);
    }
}
