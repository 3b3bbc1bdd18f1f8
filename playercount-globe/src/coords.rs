//! Angular position to unit-sphere conversion.

use std::f64::consts::FRAC_PI_2;

use glam::Vec3;
use playercount_sdk::AngularPosition;

/// Map a longitude/latitude pair (degrees) onto the unit sphere.
///
/// `θ = π/2 − lon`, `φ = lat − π/2`, point `(sin φ cos θ, cos φ, sin φ sin θ)`.
/// Latitude 90 is the +Y pole. The math runs in f64 and is narrowed once.
pub fn to_unit_sphere(position: AngularPosition) -> Vec3 {
    let theta = -position.longitude_deg.to_radians() + FRAC_PI_2;
    let phi = position.latitude_deg.to_radians() - FRAC_PI_2;
    Vec3::new(
        (phi.sin() * theta.cos()) as f32,
        phi.cos() as f32,
        (phi.sin() * theta.sin()) as f32,
    )
}
