//! Material model for surface scattering.
//!
//! Materials form a closed set, so they are represented as a tagged enum
//! with a single dispatch function rather than trait objects. This keeps
//! the per-lane transport loop branch-predictable and lets scenes reference
//! materials by plain index.

use crate::hittable::HitRecord;
use crate::rng::{gen_f32, LaneRng};
use crate::Ray;
use lux_math::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Color type alias (RGB values typically 0-1)
pub type Color = Vec3;

/// Index of a material within a scene's material table.
pub type MaterialId = usize;

/// Scatter directions with every component closer to zero than this are
/// treated as degenerate and replaced by the surface normal.
const NEAR_ZERO: f32 = 1e-4;

/// Upper clamp for metal fuzz, keeping it inside [0, 1).
const MAX_FUZZ: f32 = 0.999;

/// Result of a successful scatter.
#[derive(Debug, Clone, Copy)]
pub struct Scatter {
    /// Color multiplier applied to the lane's throughput
    pub attenuation: Color,
    /// Outgoing ray continuing the path
    pub scattered: Ray,
}

/// Surface material variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Material {
    /// Diffuse surface scattering around the normal.
    Lambertian { albedo: [f32; 3] },
    /// Specular surface; fuzz > 0 blurs the reflection.
    Metal { albedo: [f32; 3], fuzz: f32 },
    /// Glass-like surface with the given index of refraction.
    Dielectric { ior: f32 },
}

impl Material {
    /// Create a Lambertian material with the given albedo color.
    pub fn lambertian(albedo: Color) -> Self {
        Self::Lambertian {
            albedo: albedo.to_array(),
        }
    }

    /// Create a metal material.
    ///
    /// - `albedo`: the color of the metal
    /// - `fuzz`: roughness, 0.0 = perfect mirror; clamped into [0, 1)
    pub fn metal(albedo: Color, fuzz: f32) -> Self {
        Self::Metal {
            albedo: albedo.to_array(),
            fuzz: fuzz.clamp(0.0, MAX_FUZZ),
        }
    }

    /// Create a dielectric material.
    ///
    /// - `ior`: index of refraction (1.0 = air, 1.5 = glass, 2.4 = diamond)
    pub fn dielectric(ior: f32) -> Self {
        Self::Dielectric { ior }
    }

    /// Scatter an incoming ray at a hit point.
    ///
    /// Returns the attenuation and outgoing ray, or None if the ray is
    /// absorbed. `diffuse_seed` optionally supplies a precomputed unit
    /// direction (the sample slot's lattice entry, already oriented into the
    /// normal's hemisphere) for the diffuse term; when absent the lane's
    /// random stream is used.
    pub fn scatter(
        &self,
        ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut LaneRng,
        diffuse_seed: Option<Vec3>,
    ) -> Option<Scatter> {
        match *self {
            Material::Lambertian { albedo } => {
                let unit = diffuse_seed.unwrap_or_else(|| random_unit_vector(rng));
                let mut direction = rec.normal + unit;

                // Catch degenerate scatter direction
                if near_zero(direction) {
                    direction = rec.normal;
                }

                Some(Scatter {
                    attenuation: Color::from_array(albedo),
                    scattered: Ray::new(rec.point, direction, ray_in.time()),
                })
            }
            Material::Metal { albedo, fuzz } => {
                let reflected = reflect(ray_in.direction().normalize(), rec.normal);
                let direction = if fuzz > 0.0 {
                    reflected + fuzz * random_in_unit_sphere(rng)
                } else {
                    reflected
                };

                // Reflections pushed under the surface count as absorbed
                if direction.dot(rec.normal) <= 0.0 {
                    return None;
                }

                Some(Scatter {
                    attenuation: Color::from_array(albedo),
                    scattered: Ray::new(rec.point, direction, ray_in.time()),
                })
            }
            Material::Dielectric { ior } => {
                let refraction_ratio = if rec.front_face { 1.0 / ior } else { ior };

                let unit_direction = ray_in.direction().normalize();
                let cos_theta = (-unit_direction).dot(rec.normal).min(1.0);
                let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

                // Total internal reflection leaves no choice
                let cannot_refract = refraction_ratio * sin_theta > 1.0;

                let direction = if cannot_refract
                    || reflectance(cos_theta, refraction_ratio) > gen_f32(rng)
                {
                    reflect(unit_direction, rec.normal)
                } else {
                    refract(unit_direction, rec.normal, refraction_ratio)
                };

                Some(Scatter {
                    attenuation: Color::ONE,
                    scattered: Ray::new(rec.point, direction, ray_in.time()),
                })
            }
        }
    }
}

/// Schlick's approximation for reflectance at a dielectric boundary.
pub fn reflectance(cosine: f32, eta: f32) -> f32 {
    let r0 = ((1.0 - eta) / (1.0 + eta)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
}

/// True when every component of v is within NEAR_ZERO of zero.
#[inline]
fn near_zero(v: Vec3) -> bool {
    v.abs().max_element() < NEAR_ZERO
}

/// Reflect a vector about a normal.
#[inline]
fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a vector through a surface via Snell decomposition.
#[inline]
fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}

/// Generate a random unit vector on the unit sphere.
fn random_unit_vector(rng: &mut LaneRng) -> Vec3 {
    random_in_unit_sphere(rng).normalize()
}

/// Generate a random vector strictly inside the unit sphere.
fn random_in_unit_sphere(rng: &mut LaneRng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen::<f32>() * 2.0 - 1.0,
            rng.gen::<f32>() * 2.0 - 1.0,
            rng.gen::<f32>() * 2.0 - 1.0,
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-6 && len_sq < 1.0 {
            return v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::lane_rng;

    fn head_on_record(material: MaterialId) -> (Ray, HitRecord) {
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let rec = HitRecord::new(&ray, Vec3::new(0.0, 0.0, 1.0), 1.0, material);
        (ray, rec)
    }

    #[test]
    fn test_lambertian_always_scatters() {
        let material = Material::lambertian(Color::new(0.5, 0.5, 0.5));
        let (ray, rec) = head_on_record(0);

        for sample in 0..100 {
            let mut rng = lane_rng(0, 0, sample, 1);
            let scatter = material
                .scatter(&ray, &rec, &mut rng, None)
                .expect("lambertian never absorbs");
            assert!(scatter.scattered.direction().length() > NEAR_ZERO);
            assert_eq!(scatter.attenuation, Color::new(0.5, 0.5, 0.5));
        }
    }

    #[test]
    fn test_lambertian_degenerate_falls_back_to_normal() {
        let material = Material::lambertian(Color::ONE);
        let (ray, rec) = head_on_record(0);
        let mut rng = lane_rng(0, 0, 0, 1);

        // A seed exactly cancelling the normal triggers the fallback
        let scatter = material
            .scatter(&ray, &rec, &mut rng, Some(-rec.normal))
            .unwrap();
        assert_eq!(scatter.scattered.direction(), rec.normal);
    }

    #[test]
    fn test_lambertian_uses_seed_direction() {
        let material = Material::lambertian(Color::ONE);
        let (ray, rec) = head_on_record(0);
        let mut rng = lane_rng(0, 0, 0, 1);

        let seed = Vec3::new(0.0, 1.0, 0.0);
        let scatter = material.scatter(&ray, &rec, &mut rng, Some(seed)).unwrap();
        assert_eq!(scatter.scattered.direction(), rec.normal + seed);
    }

    #[test]
    fn test_metal_mirror_reflection() {
        let material = Material::metal(Color::new(0.8, 0.8, 0.8), 0.0);

        // 45 degree incidence on a +Y normal
        let ray = Ray::new_simple(Vec3::new(-1.0, 1.0, 0.0), Vec3::new(1.0, -1.0, 0.0));
        let rec = HitRecord::new(&ray, Vec3::Y, 1.0, 0);
        let mut rng = lane_rng(0, 0, 0, 1);

        let scatter = material.scatter(&ray, &rec, &mut rng, None).unwrap();
        let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!((scatter.scattered.direction().normalize() - expected).length() < 1e-5);
    }

    #[test]
    fn test_metal_absorbs_iff_below_surface() {
        // High fuzz at grazing incidence: every outcome must satisfy the
        // hemisphere rule, absorbed or not
        let material = Material::metal(Color::ONE, 0.95);
        let ray = Ray::new_simple(Vec3::new(-10.0, 0.2, 0.0), Vec3::new(10.0, -0.2, 0.0));
        let rec = HitRecord::new(&ray, Vec3::Y, 1.0, 0);

        let mut absorbed = 0;
        for sample in 0..200 {
            let mut rng = lane_rng(0, 0, sample, 1);
            match material.scatter(&ray, &rec, &mut rng, None) {
                Some(s) => assert!(s.scattered.direction().dot(rec.normal) > 0.0),
                None => absorbed += 1,
            }
        }
        // Grazing + heavy fuzz must absorb part of the time
        assert!(absorbed > 0);
    }

    #[test]
    fn test_metal_fuzz_clamped() {
        match Material::metal(Color::ONE, 7.0) {
            Material::Metal { fuzz, .. } => assert!((0.0..1.0).contains(&fuzz)),
            _ => unreachable!(),
        }
        match Material::metal(Color::ONE, -3.0) {
            Material::Metal { fuzz, .. } => assert_eq!(fuzz, 0.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_dielectric_unit_ior_passes_straight_through() {
        let material = Material::dielectric(1.0);

        // Near-normal incidence keeps the Schlick reflect probability
        // negligible, so the ray must refract, and with eta ratio 1 the
        // refracted direction equals the incoming one
        for (sample, dir) in [
            Vec3::new(0.05, 0.0, -1.0),
            Vec3::new(-0.1, 0.08, -1.0),
            Vec3::new(0.0, 0.2, -1.0),
        ]
        .into_iter()
        .enumerate()
        {
            let ray = Ray::new_simple(Vec3::ZERO, dir);
            let rec = HitRecord::new(&ray, Vec3::new(0.0, 0.0, 1.0), 1.0, 0);
            let mut rng = lane_rng(0, 0, sample as u32, 1);

            let scatter = material.scatter(&ray, &rec, &mut rng, None).unwrap();
            let out = scatter.scattered.direction();
            assert!((out - dir.normalize()).length() < 1e-5);
            assert_eq!(scatter.attenuation, Color::ONE);
        }
    }

    #[test]
    fn test_dielectric_total_internal_reflection() {
        // Inside glass (back face), steep incidence: ratio * sin_theta > 1
        // forces reflection
        let material = Material::dielectric(1.5);
        // Ray travelling along +Z inside the glass hits the back face of a
        // surface whose outward normal is +Z
        let ray = Ray::new_simple(Vec3::ZERO, Vec3::new(0.9, 0.0, 0.45).normalize());
        let rec = HitRecord::new(&ray, Vec3::new(0.0, 0.0, 1.0), 1.0, 0);
        assert!(!rec.front_face);

        let mut rng = lane_rng(0, 0, 0, 1);
        let scatter = material.scatter(&ray, &rec, &mut rng, None).unwrap();

        let expected = reflect(ray.direction().normalize(), rec.normal);
        assert!((scatter.scattered.direction() - expected).length() < 1e-5);
    }

    #[test]
    fn test_reflectance_normal_incidence_is_r0() {
        let eta = 1.5f32;
        let r0 = ((1.0 - eta) / (1.0 + eta)).powi(2);
        assert_eq!(reflectance(1.0, eta), r0);
    }

    #[test]
    fn test_reflectance_grazing_approaches_one() {
        assert!(reflectance(0.0, 1.5) > 0.99);
        assert!(reflectance(0.01, 2.4) > 0.95);
    }

    #[test]
    fn test_refract_bends_toward_surface_entering_glass() {
        // Entering a denser medium bends the ray toward the normal
        let incoming = Vec3::new(1.0, -1.0, 0.0).normalize();
        let n = Vec3::Y;
        let out = refract(incoming, n, 1.0 / 1.5);

        assert!((out.length() - 1.0).abs() < 1e-5);
        // Horizontal component shrinks
        assert!(out.x.abs() < incoming.x.abs());
        assert!(out.y < 0.0);
    }
}
