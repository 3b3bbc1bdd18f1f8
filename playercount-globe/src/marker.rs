//! Transient marker scene rendered into the overlay cubemap.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use playercount_sdk::AngularPosition;

use crate::coords::to_unit_sphere;

/// Per-instance model matrix, column-major.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MarkerInstance {
    pub model: [[f32; 4]; 4],
}

impl MarkerInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        2 => Float32x4, 3 => Float32x4, 4 => Float32x4, 5 => Float32x4
    ];

    pub(crate) fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<MarkerInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }

    /// Marker centred on `at`, its quad normal pointing at the origin.
    pub fn facing_origin(at: Vec3) -> Self {
        let forward = (-at).normalize_or(Vec3::NEG_Z);
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-8 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let right = up.cross(forward).normalize();
        let up = forward.cross(right);
        let model = Mat4::from_cols(
            right.extend(0.0),
            up.extend(0.0),
            forward.extend(0.0),
            at.extend(1.0),
        );
        Self {
            model: model.to_cols_array_2d(),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }
}

/// Marker instances for one overlay refresh. Populated, drawn, then cleared;
/// it is empty between refreshes.
#[derive(Debug, Default)]
pub struct MarkerScene {
    instances: Vec<MarkerInstance>,
}

impl MarkerScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the scene contents with one marker per position.
    pub fn populate(&mut self, positions: &[AngularPosition]) {
        self.instances.clear();
        self.instances.extend(
            positions
                .iter()
                .map(|&p| MarkerInstance::facing_origin(to_unit_sphere(p))),
        );
    }

    pub fn instances(&self) -> &[MarkerInstance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_sits_on_the_sphere_and_faces_origin() {
        for position in [
            AngularPosition::new(0.0, 0.0),
            AngularPosition::new(45.0, 30.0),
            AngularPosition::new(-120.0, -60.0),
        ] {
            let at = to_unit_sphere(position);
            let m = MarkerInstance::facing_origin(at).matrix();
            assert!(m.transform_point3(Vec3::ZERO).abs_diff_eq(at, 1e-6));
            let normal = m.transform_vector3(Vec3::Z);
            assert!(normal.abs_diff_eq(-at, 1e-5));
        }
    }

    #[test]
    fn test_pole_markers_are_not_degenerate() {
        for at in [Vec3::Y, Vec3::NEG_Y] {
            let m = MarkerInstance::facing_origin(at).matrix();
            assert!((m.determinant().abs() - 1.0).abs() < 1e-5);
            assert!(m.transform_vector3(Vec3::Z).abs_diff_eq(-at, 1e-6));
        }
    }

    #[test]
    fn test_scene_is_replaced_not_merged() {
        let mut scene = MarkerScene::new();
        scene.populate(&[AngularPosition::new(1.0, 2.0), AngularPosition::new(3.0, 4.0)]);
        assert_eq!(scene.len(), 2);
        scene.populate(&[AngularPosition::new(5.0, 6.0)]);
        assert_eq!(scene.len(), 1);
        scene.clear();
        assert!(scene.is_empty());
    }

    #[test]
    fn test_quad_corners_stay_on_tangent_plane() {
        let at = to_unit_sphere(AngularPosition::new(10.0, 20.0));
        let m = MarkerInstance::facing_origin(at).matrix();
        let corner = m.transform_point3(Vec3::new(0.45, 0.45, 0.0));
        assert!((corner - at).dot(at).abs() < 1e-5);
    }
}
