//! View and projection math for the globe and the cubemap pass.

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use glam::{Mat4, Quat, Vec3};

/// Pivot rotation speed, radians per millisecond.
pub const ROTATION_SPEED: f32 = 0.0005;

/// Yaw of the camera pivot after `elapsed` time.
pub fn pivot_yaw(elapsed: Duration) -> f32 {
    (elapsed.as_secs_f64() * 1000.0 * ROTATION_SPEED as f64) as f32
}

/// Square output size for a container of `width` x `height`.
pub fn fit_resolution(width: u32, height: u32) -> u32 {
    width.min(height)
}

/// Orthographic camera on a pivot that spins around +Y at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
    /// Distance from the pivot along the pivot's +Z.
    pub distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            half_extent: 1.1,
            near: 0.0,
            far: 4.0,
            distance: 2.0,
        }
    }
}

impl OrbitCamera {
    pub fn position(&self, yaw: f32) -> Vec3 {
        Quat::from_rotation_y(yaw) * Vec3::new(0.0, 0.0, self.distance)
    }

    pub fn view(&self, yaw: f32) -> Mat4 {
        let world = Mat4::from_rotation_y(yaw) * Mat4::from_translation(Vec3::Z * self.distance);
        world.inverse()
    }

    pub fn projection(&self) -> Mat4 {
        let e = self.half_extent;
        Mat4::orthographic_rh(-e, e, -e, e, self.near, self.far)
    }

    pub fn view_projection(&self, yaw: f32) -> Mat4 {
        self.projection() * self.view(yaw)
    }
}

/// One face of the overlay cubemap, in array-layer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn layer(self) -> u32 {
        self as u32
    }

    pub fn label(self) -> &'static str {
        match self {
            CubeFace::PositiveX => "cube_face_+x",
            CubeFace::NegativeX => "cube_face_-x",
            CubeFace::PositiveY => "cube_face_+y",
            CubeFace::NegativeY => "cube_face_-y",
            CubeFace::PositiveZ => "cube_face_+z",
            CubeFace::NegativeZ => "cube_face_-z",
        }
    }

    /// Look direction and up vector for this face.
    pub fn basis(self) -> (Vec3, Vec3) {
        match self {
            CubeFace::PositiveX => (Vec3::X, Vec3::Y),
            CubeFace::NegativeX => (Vec3::NEG_X, Vec3::Y),
            CubeFace::PositiveY => (Vec3::Y, Vec3::NEG_Z),
            CubeFace::NegativeY => (Vec3::NEG_Y, Vec3::Z),
            CubeFace::PositiveZ => (Vec3::Z, Vec3::Y),
            CubeFace::NegativeZ => (Vec3::NEG_Z, Vec3::Y),
        }
    }

    /// View-projection for rendering this face from the origin.
    ///
    /// Cube sampling is left-handed in texture space, so the face cameras
    /// are too. Rendering with these matrices and sampling the result with a
    /// world direction returns the texel that direction hit.
    pub fn view_projection(self, near: f32, far: f32) -> Mat4 {
        let (forward, up) = self.basis();
        let view = Mat4::look_to_lh(Vec3::ZERO, forward, up);
        let projection = Mat4::perspective_lh(FRAC_PI_2, 1.0, near, far);
        projection * view
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3Swizzles, Vec4Swizzles};

    use super::*;

    fn project(m: Mat4, p: Vec3) -> Vec3 {
        let clip = m * p.extend(1.0);
        clip.xyz() / clip.w
    }

    #[test]
    fn test_pivot_yaw() {
        assert_eq!(pivot_yaw(Duration::ZERO), 0.0);
        assert!((pivot_yaw(Duration::from_millis(2000)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fit_resolution() {
        assert_eq!(fit_resolution(800, 600), 600);
        assert_eq!(fit_resolution(300, 1024), 300);
        assert_eq!(fit_resolution(0, 10), 0);
    }

    #[test]
    fn test_orbit_camera_frames_the_globe() {
        let camera = OrbitCamera::default();
        let vp = camera.view_projection(0.0);
        let centre = project(vp, Vec3::ZERO);
        assert!(centre.xy().abs_diff_eq(Vec2::ZERO, 1e-6));
        assert!((0.0..=1.0).contains(&centre.z));

        // The front of the unit sphere sits nearer than its centre.
        let front = project(vp, Vec3::Z);
        assert!(front.z < centre.z);

        // Edge of the globe lands inside the 1.1 frame.
        let edge = project(vp, Vec3::X);
        assert!((edge.x - 1.0 / 1.1).abs() < 1e-5);
    }

    #[test]
    fn test_orbit_camera_rotates_with_pivot() {
        let camera = OrbitCamera::default();
        let yaw = FRAC_PI_2;
        assert!(camera.position(yaw).abs_diff_eq(Vec3::X * 2.0, 1e-5));
        let centre = project(camera.view_projection(yaw), Vec3::ZERO);
        assert!(centre.xy().abs_diff_eq(Vec2::ZERO, 1e-5));
    }

    #[test]
    fn test_each_face_sees_its_axis() {
        for face in CubeFace::ALL {
            let (forward, _) = face.basis();
            let p = project(face.view_projection(0.5, 2.0), forward);
            assert!(p.xy().abs_diff_eq(Vec2::ZERO, 1e-5), "{face:?}");
            assert!((0.0..=1.0).contains(&p.z), "{face:?}");
        }
    }

    #[test]
    fn test_face_orientation_matches_cube_sampling() {
        // +X face: texel s grows toward -Z, texel t grows toward -Y.
        let vp = CubeFace::PositiveX.view_projection(0.5, 2.0);
        let p = project(vp, Vec3::new(1.0, 0.0, -0.5));
        assert!(p.x > 0.0);
        let p = project(vp, Vec3::new(1.0, 0.5, 0.0));
        assert!(p.y > 0.0);

        // +Y face: s grows toward +X, t grows toward +Z.
        let vp = CubeFace::PositiveY.view_projection(0.5, 2.0);
        let p = project(vp, Vec3::new(0.5, 1.0, 0.0));
        assert!(p.x > 0.0);
        let p = project(vp, Vec3::new(0.0, 1.0, 0.5));
        assert!(p.y < 0.0);
    }

    #[test]
    fn test_unit_sphere_is_inside_face_depth_range() {
        let vp = CubeFace::NegativeZ.view_projection(0.5, 2.0);
        let p = project(vp, Vec3::NEG_Z);
        assert!(p.z > 0.0 && p.z < 1.0);
        // Behind the near plane.
        let p = project(vp, Vec3::NEG_Z * 0.25);
        assert!(p.z < 0.0);
    }

    #[test]
    fn test_layers_are_in_order() {
        let layers: Vec<u32> = CubeFace::ALL.iter().map(|f| f.layer()).collect();
        assert_eq!(layers, vec![0, 1, 2, 3, 4, 5]);
    }
}
