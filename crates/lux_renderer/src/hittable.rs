//! Hittable trait and HitRecord for ray-object intersection.

use crate::material::MaterialId;
use crate::Ray;
use lux_math::{Interval, Vec3};

/// Record of a ray-object intersection.
#[derive(Debug, Clone, Copy)]
pub struct HitRecord {
    /// Point of intersection
    pub point: Vec3,
    /// Surface normal at intersection (always points against ray)
    pub normal: Vec3,
    /// Parameter t where the intersection occurs
    pub t: f32,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
    /// Material at the intersection point
    pub material: MaterialId,
}

impl HitRecord {
    /// Build a record from the geometric (uncorrected) outward normal.
    ///
    /// Surfaces pass the raw outward normal here; orientation is derived,
    /// never set by callers.
    pub fn new(ray: &Ray, outward_normal: Vec3, t: f32, material: MaterialId) -> Self {
        let mut rec = Self {
            point: ray.at(t),
            normal: Vec3::ZERO,
            t,
            front_face: false,
            material,
        };
        rec.set_face_normal(ray, outward_normal);
        rec
    }

    /// Set the face normal based on ray direction and outward normal.
    ///
    /// The normal is always stored pointing against the ray direction,
    /// so we need to track whether we hit the front or back face.
    pub fn set_face_normal(&mut self, ray: &Ray, outward_normal: Vec3) {
        // If the ray and normal point in the same direction, we're inside
        self.front_face = ray.direction().dot(outward_normal) < 0.0;

        // Normal always points against the ray
        self.normal = if self.front_face {
            outward_normal
        } else {
            -outward_normal
        };
    }
}

/// Trait for objects that can be hit by rays.
pub trait Hittable: Send + Sync {
    /// Test if a ray hits this object within the given t interval.
    ///
    /// Returns the nearest intersection in the interval, or None on a miss.
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord>;
}
