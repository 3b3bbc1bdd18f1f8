use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use playercount_sdk::AngularPosition;
use wgpu::util::DeviceExt;

use crate::camera::{self, CubeFace, OrbitCamera};
use crate::marker::{MarkerInstance, MarkerScene};
use crate::mesh::{self, GlobeVertex, QuadVertex, SphereMesh};
use crate::shader;
use crate::style::{GlobeStyle, GlobeTextures};
use crate::GlobeError;

pub const CUBEMAP_RESOLUTION: u32 = 512;
pub const CUBEMAP_NEAR: f32 = 0.5;
pub const CUBEMAP_FAR: f32 = 2.0;
pub const MARKER_SIZE: f32 = 0.9;
pub const MARKER_CORE_THRESHOLD: f32 = 0.975;
pub const SPHERE_SEGMENTS: (u32, u32) = (64, 32);

const OVERLAY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const MIN_INSTANCE_CAPACITY: usize = 16;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct GlobeUniform {
    view_proj: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    land: [f32; 4],
    sea: [f32; 4],
    fresnel: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FaceUniform {
    view_proj: [[f32; 4]; 4],
    params: [f32; 4],
}

/// Square region of the render target the globe is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl Viewport {
    /// Largest square centred in a `width` x `height` target.
    pub fn centred(width: u32, height: u32) -> Self {
        let size = camera::fit_resolution(width, height);
        Self {
            x: (width - size) / 2,
            y: (height - size) / 2,
            size,
        }
    }
}

/// Rotating globe with player markers.
///
/// Markers are not drawn directly. Each [`update_positions`] call renders
/// them into an offscreen cubemap seen from the globe's centre, and the
/// globe shader looks that cubemap up by surface direction. The marker scene
/// is emptied again before the call returns.
///
/// [`update_positions`]: PositionVisualizer::update_positions
pub struct PositionVisualizer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    style: GlobeStyle,
    camera: OrbitCamera,
    viewport: Viewport,
    scene: MarkerScene,

    globe_pipeline: wgpu::RenderPipeline,
    globe_uniform: wgpu::Buffer,
    globe_bind_group: wgpu::BindGroup,
    surface_bind_group: wgpu::BindGroup,
    sphere_vertices: wgpu::Buffer,
    sphere_indices: wgpu::Buffer,
    sphere_index_count: u32,

    marker_pipeline: wgpu::RenderPipeline,
    face_bind_groups: Vec<wgpu::BindGroup>,
    quad_vertices: wgpu::Buffer,
    quad_indices: wgpu::Buffer,
    instances: wgpu::Buffer,
    instance_capacity: usize,

    overlay: wgpu::Texture,
    face_views: Vec<wgpu::TextureView>,
}

impl PositionVisualizer {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        target_format: wgpu::TextureFormat,
        textures: &GlobeTextures,
        style: GlobeStyle,
    ) -> Result<Self, GlobeError> {
        let land = textures.land_or_default()?;
        let highlight = textures.highlight_or_default()?;

        // overlay cubemap
        let overlay = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("overlay_cubemap"),
            size: wgpu::Extent3d {
                width: CUBEMAP_RESOLUTION,
                height: CUBEMAP_RESOLUTION,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OVERLAY_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let overlay_view = overlay.create_view(&wgpu::TextureViewDescriptor {
            label: Some("overlay_cube_view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            array_layer_count: Some(6),
            ..Default::default()
        });
        let face_views = CubeFace::ALL
            .iter()
            .map(|face| {
                overlay.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(face.label()),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: face.layer(),
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        // globe
        let globe_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globe_uniform"),
            size: size_of::<GlobeUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_layout = uniform_bind_layout(&device, "globe_uniform_layout");
        let globe_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globe_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globe_uniform.as_entire_binding(),
            }],
        });

        let land_texture = create_mask(&device, &queue, "land_mask", &land);
        let highlight_texture = create_mask(&device, &queue, "highlight_mask", &highlight);
        let land_view = land_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let highlight_view = highlight_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = linear_sampler(&device);
        let surface_layout = surface_bind_layout(&device);
        let surface_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globe_surface_bind_group"),
            layout: &surface_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&land_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&highlight_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&overlay_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let sphere = SphereMesh::uv_sphere(1.0, SPHERE_SEGMENTS.0, SPHERE_SEGMENTS.1);
        let sphere_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere_vertices"),
            contents: bytemuck::cast_slice(&sphere.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let sphere_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere_indices"),
            contents: bytemuck::cast_slice(&sphere.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let globe_pipeline = make_render_pipeline(
            &device,
            PipelineSpec {
                label: "globe_pipeline",
                shader: shader::create(&device, "globe_shader", shader::GLOBE),
                bind_group_layouts: &[&uniform_layout, &surface_layout],
                buffers: &[GlobeVertex::desc()],
                format: target_format,
                blend: wgpu::BlendState::REPLACE,
                cull_mode: Some(wgpu::Face::Back),
            },
        );

        // markers
        let face_layout = uniform_bind_layout(&device, "face_uniform_layout");
        let face_bind_groups = CubeFace::ALL
            .iter()
            .map(|face| {
                let uniform = FaceUniform {
                    view_proj: face
                        .view_projection(CUBEMAP_NEAR, CUBEMAP_FAR)
                        .to_cols_array_2d(),
                    params: [MARKER_CORE_THRESHOLD, 0.0, 0.0, 0.0],
                };
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(face.label()),
                    contents: bytemuck::bytes_of(&uniform),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(face.label()),
                    layout: &face_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            })
            .collect();

        let quad_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("marker_quad_vertices"),
            contents: bytemuck::cast_slice(&mesh::marker_quad(MARKER_SIZE)),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("marker_quad_indices"),
            contents: bytemuck::cast_slice(&mesh::QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        let instances = create_instance_buffer(&device, MIN_INSTANCE_CAPACITY);

        // Overlapping markers keep the brightest value of each channel.
        let max_blend = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Max,
        };
        let marker_pipeline = make_render_pipeline(
            &device,
            PipelineSpec {
                label: "marker_pipeline",
                shader: shader::create(&device, "marker_shader", shader::MARKER),
                bind_group_layouts: &[&face_layout],
                buffers: &[QuadVertex::desc(), MarkerInstance::desc()],
                format: OVERLAY_FORMAT,
                blend: wgpu::BlendState {
                    color: max_blend,
                    alpha: max_blend,
                },
                cull_mode: None,
            },
        );

        let mut visualizer = Self {
            device,
            queue,
            style,
            camera: OrbitCamera::default(),
            viewport: Viewport::centred(0, 0),
            scene: MarkerScene::new(),
            globe_pipeline,
            globe_uniform,
            globe_bind_group,
            surface_bind_group,
            sphere_vertices,
            sphere_indices,
            sphere_index_count: sphere.indices.len() as u32,
            marker_pipeline,
            face_bind_groups,
            quad_vertices,
            quad_indices,
            instances,
            instance_capacity: MIN_INSTANCE_CAPACITY,
            overlay,
            face_views,
        };
        // Start from a cleared overlay rather than undefined texels.
        visualizer.update_positions(&[]);
        Ok(visualizer)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Number of markers currently in the scene. Zero outside of
    /// [`update_positions`](Self::update_positions).
    pub fn pending_markers(&self) -> usize {
        self.scene.len()
    }

    /// Replace the marker set and re-render the overlay. An empty slice
    /// clears it.
    pub fn update_positions(&mut self, positions: &[AngularPosition]) {
        self.scene.populate(positions);
        self.upload_instances();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("overlay_encoder"),
            });
        for face in CubeFace::ALL {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(face.label()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.face_views[face.layer() as usize],
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if self.scene.is_empty() {
                continue;
            }
            pass.set_pipeline(&self.marker_pipeline);
            pass.set_bind_group(0, &self.face_bind_groups[face.layer() as usize], &[]);
            pass.set_vertex_buffer(0, self.quad_vertices.slice(..));
            pass.set_vertex_buffer(1, self.instances.slice(..));
            pass.set_index_buffer(self.quad_indices.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(
                0..mesh::QUAD_INDICES.len() as u32,
                0,
                0..self.scene.len() as u32,
            );
        }
        self.queue.submit(Some(encoder.finish()));

        tracing::trace!(markers = self.scene.len(), "overlay refreshed");
        self.scene.clear();
    }

    /// Re-fit to a `width` x `height` target. Returns the new square size.
    pub fn resize(&mut self, width: u32, height: u32) -> u32 {
        self.viewport = Viewport::centred(width, height);
        self.viewport.size
    }

    /// Draw one frame into `target`, rotated for `elapsed` since start.
    pub fn render(&self, target: &wgpu::TextureView, elapsed: Duration) {
        let yaw = camera::pivot_yaw(elapsed);
        let uniform = GlobeUniform {
            view_proj: self.camera.view_projection(yaw).to_cols_array_2d(),
            view: self.camera.view(yaw).to_cols_array_2d(),
            land: self.style.land_linear(),
            sea: self.style.sea_linear(),
            fresnel: self.style.fresnel_linear(),
        };
        self.queue
            .write_buffer(&self.globe_uniform, 0, bytemuck::bytes_of(&uniform));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("globe_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("globe_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if self.viewport.size > 0 {
                let Viewport { x, y, size } = self.viewport;
                pass.set_viewport(x as f32, y as f32, size as f32, size as f32, 0.0, 1.0);
                pass.set_pipeline(&self.globe_pipeline);
                pass.set_bind_group(0, &self.globe_bind_group, &[]);
                pass.set_bind_group(1, &self.surface_bind_group, &[]);
                pass.set_vertex_buffer(0, self.sphere_vertices.slice(..));
                pass.set_index_buffer(self.sphere_indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..self.sphere_index_count, 0, 0..1);
            }
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn upload_instances(&mut self) {
        let instances = self.scene.instances();
        if instances.is_empty() {
            return;
        }
        if instances.len() > self.instance_capacity {
            self.instance_capacity = instances.len().next_power_of_two();
            self.instances = create_instance_buffer(&self.device, self.instance_capacity);
            tracing::debug!(capacity = self.instance_capacity, "grew marker instance buffer");
        }
        self.queue
            .write_buffer(&self.instances, 0, bytemuck::cast_slice(instances));
    }
}

struct PipelineSpec<'a> {
    label: &'a str,
    shader: wgpu::ShaderModule,
    bind_group_layouts: &'a [&'a wgpu::BindGroupLayout],
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
    cull_mode: Option<wgpu::Face>,
}

fn make_render_pipeline(device: &wgpu::Device, spec: PipelineSpec<'_>) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(spec.label),
        bind_group_layouts: spec.bind_group_layouts,
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &spec.shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: spec.buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: &spec.shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: spec.format,
                blend: Some(spec.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: spec.cull_mode,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn uniform_bind_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
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
    })
}

fn surface_bind_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding, view_dimension| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    };
    let sampler = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("globe_surface_layout"),
        entries: &[
            texture(0, wgpu::TextureViewDimension::D2),
            texture(1, wgpu::TextureViewDimension::D2),
            sampler(2),
            texture(3, wgpu::TextureViewDimension::Cube),
            sampler(4),
        ],
    })
}

fn linear_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("globe_sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn create_mask(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    image: &image::RgbaImage,
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: image.width(),
        height: image.height(),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: MASK_FORMAT,
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
        image.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.width),
            rows_per_image: Some(size.height),
        },
        size,
    );
    texture
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("marker_instances"),
        size: (capacity * size_of::<MarkerInstance>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_is_centred_square() {
        assert_eq!(Viewport::centred(800, 600), Viewport { x: 100, y: 0, size: 600 });
        assert_eq!(Viewport::centred(300, 500), Viewport { x: 0, y: 100, size: 300 });
        assert_eq!(Viewport::centred(0, 0).size, 0);
    }

    #[test]
    fn test_uniform_layouts_are_16_byte_aligned() {
        assert_eq!(size_of::<GlobeUniform>() % 16, 0);
        assert_eq!(size_of::<FaceUniform>(), 80);
        assert_eq!(size_of::<MarkerInstance>(), 64);
    }

    fn gpu() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok()?;
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("test_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: Default::default(),
            trace: Default::default(),
        }))
        .ok()
    }

    /// One RGBA texel of `layer` in `texture`. Rows of `width` texels must be
    /// a multiple of 256 bytes.
    fn read_texel(
        visualizer: &PositionVisualizer,
        texture: &wgpu::Texture,
        layer: u32,
        (x, y): (u32, u32),
    ) -> [u8; 4] {
        let (width, height) = (texture.width(), texture.height());
        let bytes_per_row = 4 * width;
        let buffer = visualizer.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size: (bytes_per_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = visualizer
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        visualizer.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        visualizer.device.poll(wgpu::PollType::Wait).unwrap();
        let data = slice.get_mapped_range();
        let offset = (y * bytes_per_row + x * 4) as usize;
        [data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]
    }

    /// Centre texel of one cubemap face, as RGBA.
    fn face_centre(visualizer: &PositionVisualizer, face: CubeFace) -> [u8; 4] {
        let mid = CUBEMAP_RESOLUTION / 2;
        read_texel(visualizer, &visualizer.overlay, face.layer(), (mid, mid))
    }

    #[test]
    fn test_overlay_marks_the_right_face_and_clears() {
        let Some((device, queue)) = gpu() else {
            eprintln!("no graphics adapter, skipping");
            return;
        };
        let mut visualizer = PositionVisualizer::new(
            device,
            queue,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            &GlobeTextures::default(),
            GlobeStyle::default(),
        )
        .unwrap();

        // Longitude 180 on the equator is +Z.
        visualizer.update_positions(&[AngularPosition::new(180.0, 0.0)]);
        assert_eq!(visualizer.pending_markers(), 0);
        let hit = face_centre(&visualizer, CubeFace::PositiveZ);
        assert_eq!(hit[1], 255, "marker core missing: {hit:?}");
        assert!(hit[0] > 250);
        assert_eq!(face_centre(&visualizer, CubeFace::NegativeZ), [0, 0, 0, 0]);

        visualizer.update_positions(&[]);
        assert_eq!(face_centre(&visualizer, CubeFace::PositiveZ), [0, 0, 0, 0]);
    }

    fn offscreen_target(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    fn assert_close(texel: [u8; 4], hex: u32) {
        let expected = [(hex >> 16) as u8, (hex >> 8) as u8, hex as u8, 255];
        let close = texel
            .iter()
            .zip(expected)
            .all(|(got, want)| got.abs_diff(want) <= 2);
        assert!(close, "got {texel:?}, expected about {expected:?}");
    }

    #[test]
    fn test_render_draws_globe_in_centred_square() {
        let Some((device, queue)) = gpu() else {
            eprintln!("no graphics adapter, skipping");
            return;
        };
        let style = GlobeStyle::default();
        let mut visualizer = PositionVisualizer::new(
            device,
            queue,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            &GlobeTextures::default(),
            style,
        )
        .unwrap();
        assert_eq!(visualizer.resize(320, 256), 256);
        assert_eq!(visualizer.viewport(), Viewport { x: 32, y: 0, size: 256 });

        let target = offscreen_target(visualizer.device(), 320, 256);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        visualizer.render(&view, Duration::from_millis(1234));

        // Default masks are all land, there are no markers and no fresnel,
        // so the middle of the disc is the plain land colour.
        assert_close(read_texel(&visualizer, &target, 0, (160, 128)), style.land);
        // Outside the viewport the target is only cleared.
        assert_eq!(read_texel(&visualizer, &target, 0, (2, 128)), [0, 0, 0, 0]);
    }

    #[test]
    fn test_render_with_many_markers() {
        let Some((device, queue)) = gpu() else {
            eprintln!("no graphics adapter, skipping");
            return;
        };
        let mut visualizer = PositionVisualizer::new(
            device,
            queue,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            &GlobeTextures::default(),
            GlobeStyle::default(),
        )
        .unwrap();
        visualizer.resize(320, 256);

        let target = offscreen_target(visualizer.device(), 320, 256);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let positions: Vec<_> = (0..40)
            .map(|i| AngularPosition::new(i as f64 * 9.0 - 180.0, (i % 9) as f64 * 20.0 - 80.0))
            .collect();
        visualizer.update_positions(&positions);
        visualizer.render(&view, Duration::from_millis(1234));

        // 40 markers outgrow the initial instance buffer.
        assert!(visualizer.instance_capacity >= 40);
        // Markers only brighten the surface, never darken it below land.
        let centre = read_texel(&visualizer, &target, 0, (160, 128));
        assert!(centre[..3].iter().all(|&c| c >= 0x50), "got {centre:?}");
        assert_eq!(centre[3], 255);
    }
}
