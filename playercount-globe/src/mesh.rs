//! CPU-side geometry: the globe sphere and the marker quad.

use std::f32::consts::{PI, TAU};

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GlobeVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl GlobeVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub(crate) fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<GlobeVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Indexed triangle list.
#[derive(Debug, Clone, Default)]
pub struct SphereMesh {
    pub vertices: Vec<GlobeVertex>,
    pub indices: Vec<u32>,
}

impl SphereMesh {
    /// Latitude/longitude sphere. `u` runs west to east around +Y, `v` runs
    /// from the north pole (0) to the south pole (1), matching image rows.
    ///
    /// The seam column is duplicated so it can carry both `u = 0` and `u = 1`,
    /// and the degenerate triangles at the poles are skipped.
    pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);
        let columns = width_segments + 1;

        let mut vertices = Vec::with_capacity((columns * (height_segments + 1)) as usize);
        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            let polar = v * PI;
            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let azimuth = u * TAU;
                let normal = [
                    -azimuth.cos() * polar.sin(),
                    polar.cos(),
                    azimuth.sin() * polar.sin(),
                ];
                vertices.push(GlobeVertex {
                    position: normal.map(|c| c * radius),
                    normal,
                    uv: [u, v],
                });
            }
        }

        let mut indices = Vec::new();
        for iy in 0..height_segments {
            for ix in 0..width_segments {
                let a = iy * columns + ix + 1;
                let b = iy * columns + ix;
                let c = (iy + 1) * columns + ix;
                let d = (iy + 1) * columns + ix + 1;
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height_segments - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        Self { vertices, indices }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    pub(crate) fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

/// Square of side `size` in the local XY plane, centred on the origin.
pub fn marker_quad(size: f32) -> [QuadVertex; 4] {
    let h = size * 0.5;
    [
        QuadVertex { position: [-h, -h], uv: [0.0, 1.0] },
        QuadVertex { position: [h, -h], uv: [1.0, 1.0] },
        QuadVertex { position: [-h, h], uv: [0.0, 0.0] },
        QuadVertex { position: [h, h], uv: [1.0, 0.0] },
    ]
}
