//! Spherical Fibonacci hemisphere sampling.
//!
//! A deterministic low-discrepancy direction set used to seed diffuse bounce
//! directions per sample slot, in place of a per-bounce random draw. The
//! table is generated once for a given slot count and reused across frames.

use lux_math::Vec3;
use std::f32::consts::PI;

/// Generate `n` unit directions approximately evenly distributed over the
/// upper (y >= 0) hemisphere.
///
/// Walks z downward from `1 - dz/2` in steps of `dz = 1/n` while advancing
/// phi by the golden angle `pi * (3 - sqrt(5))`, so the points trace a
/// Fibonacci spiral over the hemisphere. Purely arithmetic; identical input
/// always yields the identical table.
pub fn hemisphere(n: usize) -> Vec<Vec3> {
    let golden_angle = PI * (3.0 - 5.0_f32.sqrt());
    let dz = 1.0 / n as f32;
    let mut z = 1.0 - dz / 2.0;
    let mut phi = 0.0f32;

    let mut directions = Vec::with_capacity(n);
    for _ in 0..n {
        let theta = z.clamp(-1.0, 1.0).acos();
        let sin_theta = theta.sin();
        directions.push(Vec3::new(phi.cos() * sin_theta, z, phi.sin() * sin_theta));
        z -= dz;
        phi += golden_angle;
    }

    directions
}

/// Mirror a hemisphere table into a full sphere.
///
/// Used only for visualizing the lattice; the transport loop samples the
/// hemisphere table directly.
pub fn mirror_to_sphere(hemisphere: &[Vec3]) -> Vec<Vec3> {
    let mut directions = Vec::with_capacity(hemisphere.len() * 2);
    directions.extend_from_slice(hemisphere);
    directions.extend(hemisphere.iter().map(|d| Vec3::new(d.x, -d.y, d.z)));
    directions
}

/// Flip a lattice direction into the hemisphere around `normal`.
///
/// The flipped direction satisfies dot(result, normal) >= 0, so
/// `normal + result` can never cancel to a near-zero vector.
#[inline]
pub fn orient(direction: Vec3, normal: Vec3) -> Vec3 {
    if direction.dot(normal) < 0.0 {
        -direction
    } else {
        direction
    }
}
