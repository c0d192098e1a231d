//! Scene container: sphere list plus material table.
//!
//! Scenes are validated at load time so non-physical configurations are
//! rejected before they can propagate NaNs into the transport loop. Every
//! mutation bumps a version counter which the progressive scheduler folds
//! into its change detection.

use crate::{
    hittable::{HitRecord, Hittable},
    material::{Material, MaterialId},
    Ray, Sphere,
};
use bytemuck::{Pod, Zeroable};
use lux_math::{Interval, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while building or loading a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sphere {index} has non-positive radius {radius}")]
    InvalidRadius { index: usize, radius: f32 },

    #[error("sphere {sphere} references material {material}, but only {count} are defined")]
    MaterialOutOfRange {
        sphere: usize,
        material: MaterialId,
        count: usize,
    },

    #[error("material {index} has non-physical index of refraction {ior}")]
    InvalidIor { index: usize, ior: f32 },
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;

/// Number of floats per sphere in the packed external layout.
pub const PACKED_SPHERE_FLOATS: usize = 8;

/// Fixed-stride sphere record for an external compute substrate.
///
/// Exactly 8 floats: center, radius, material index, padding. Producers and
/// consumers of this buffer must agree on the stride.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PackedSphere {
    pub center: [f32; 3],
    pub radius: f32,
    pub material: f32,
    pub _pad: [f32; 3],
}

/// Sphere declaration as it appears in a scene file.
#[derive(Debug, Serialize, Deserialize)]
pub struct SphereDecl {
    pub center: [f32; 3],
    pub radius: f32,
    pub material: MaterialId,
}

/// On-disk scene description.
#[derive(Debug, Serialize, Deserialize)]
pub struct SceneFile {
    pub materials: Vec<Material>,
    pub spheres: Vec<SphereDecl>,
}

/// A validated sphere scene.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    spheres: Vec<Sphere>,
    materials: Vec<Material>,
    version: u64,
}

impl Scene {
    /// Create a new empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a material, returning its index for spheres to reference.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        self.version += 1;
        self.materials.len() - 1
    }

    /// Add a sphere to the scene.
    pub fn add_sphere(&mut self, center: Vec3, radius: f32, material: MaterialId) {
        self.spheres.push(Sphere::new(center, radius, material));
        self.version += 1;
    }

    /// Remove all spheres and materials.
    pub fn clear(&mut self) {
        self.spheres.clear();
        self.materials.clear();
        self.version += 1;
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Look up a material by index.
    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id]
    }

    /// Monotonic geometry version, bumped on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Check the scene for non-physical configurations.
    pub fn validate(&self) -> SceneResult<()> {
        for (index, material) in self.materials.iter().enumerate() {
            if let Material::Dielectric { ior } = *material {
                if !(ior > 0.0 && ior.is_finite()) {
                    return Err(SceneError::InvalidIor { index, ior });
                }
            }
        }

        for (index, sphere) in self.spheres.iter().enumerate() {
            if !(sphere.radius() > 0.0 && sphere.radius().is_finite()) {
                return Err(SceneError::InvalidRadius {
                    index,
                    radius: sphere.radius(),
                });
            }
            if sphere.material() >= self.materials.len() {
                return Err(SceneError::MaterialOutOfRange {
                    sphere: index,
                    material: sphere.material(),
                    count: self.materials.len(),
                });
            }
        }

        Ok(())
    }

    /// Build a validated scene from a JSON scene description.
    pub fn from_json(json: &str) -> SceneResult<Self> {
        let file: SceneFile = serde_json::from_str(json)?;

        let mut scene = Scene::new();
        for material in file.materials {
            scene.add_material(clamp_material(material));
        }
        for decl in file.spheres {
            scene.add_sphere(Vec3::from_array(decl.center), decl.radius, decl.material);
        }

        scene.validate()?;
        Ok(scene)
    }

    /// Load a validated scene from a JSON file on disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SceneResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Pack the sphere list into the fixed-stride external layout.
    pub fn pack_spheres(&self) -> Vec<PackedSphere> {
        self.spheres
            .iter()
            .map(|s| PackedSphere {
                center: s.center().to_array(),
                radius: s.radius(),
                material: s.material() as f32,
                _pad: [0.0; 3],
            })
            .collect()
    }
}

/// Clamp loaded material parameters into their physical ranges.
fn clamp_material(material: Material) -> Material {
    match material {
        Material::Metal { albedo, fuzz } => Material::metal(Vec3::from_array(albedo), fuzz),
        other => other,
    }
}

impl Hittable for Scene {
    fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<HitRecord> {
        let mut closest_so_far = ray_t.max;
        let mut hit = None;

        for sphere in &self.spheres {
            if let Some(rec) = sphere.hit(ray, Interval::new(ray_t.min, closest_so_far)) {
                closest_so_far = rec.t;
                hit = Some(rec);
            }
        }

        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Color;

    fn one_sphere_scene() -> Scene {
        let mut scene = Scene::new();
        let grey = scene.add_material(Material::lambertian(Color::new(0.5, 0.5, 0.5)));
        scene.add_sphere(Vec3::new(0.0, 0.0, -1.0), 0.5, grey);
        scene
    }

    #[test]
    fn test_validate_ok() {
        assert!(one_sphere_scene().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_radius() {
        let mut scene = Scene::new();
        let grey = scene.add_material(Material::lambertian(Color::ONE));
        scene.add_sphere(Vec3::ZERO, -1.0, grey);

        assert!(matches!(
            scene.validate(),
            Err(SceneError::InvalidRadius { index: 0, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_missing_material() {
        let mut scene = Scene::new();
        scene.add_sphere(Vec3::ZERO, 1.0, 3);

        assert!(matches!(
            scene.validate(),
            Err(SceneError::MaterialOutOfRange {
                sphere: 0,
                material: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_version_bumps_on_mutation() {
        let mut scene = Scene::new();
        let v0 = scene.version();
        let grey = scene.add_material(Material::lambertian(Color::ONE));
        let v1 = scene.version();
        scene.add_sphere(Vec3::ZERO, 1.0, grey);
        let v2 = scene.version();

        assert!(v0 < v1 && v1 < v2);
    }

    #[test]
    fn test_packed_sphere_stride() {
        assert_eq!(
            std::mem::size_of::<PackedSphere>(),
            PACKED_SPHERE_FLOATS * std::mem::size_of::<f32>()
        );

        let packed = one_sphere_scene().pack_spheres();
        assert_eq!(packed.len(), 1);
        assert_eq!(packed[0].center, [0.0, 0.0, -1.0]);
        assert_eq!(packed[0].radius, 0.5);
        assert_eq!(packed[0].material, 0.0);
    }

    #[test]
    fn test_scene_hit_selects_nearest() {
        let mut scene = Scene::new();
        let grey = scene.add_material(Material::lambertian(Color::ONE));
        scene.add_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0, grey);
        scene.add_sphere(Vec3::new(0.0, 0.0, -2.0), 0.5, grey);

        let ray = Ray::new_simple(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let rec = scene
            .hit(&ray, Interval::new(0.001, f32::INFINITY))
            .unwrap();
        assert!((rec.t - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "materials": [
                { "kind": "lambertian", "albedo": [0.5, 0.5, 0.5] },
                { "kind": "metal", "albedo": [0.8, 0.8, 0.8], "fuzz": 1.7 },
                { "kind": "dielectric", "ior": 1.5 }
            ],
            "spheres": [
                { "center": [0.0, 0.0, -1.0], "radius": 0.5, "material": 0 },
                { "center": [1.0, 0.0, -1.0], "radius": 0.5, "material": 1 }
            ]
        }"#;

        let scene = Scene::from_json(json).unwrap();
        assert_eq!(scene.spheres().len(), 2);
        assert_eq!(scene.materials().len(), 3);

        // Out-of-range fuzz is clamped at load time
        match scene.material(1) {
            Material::Metal { fuzz, .. } => assert!((0.0..1.0).contains(fuzz)),
            _ => panic!("expected metal"),
        }
    }

    #[test]
    fn test_from_json_rejects_bad_scene() {
        let json = r#"{
            "materials": [],
            "spheres": [ { "center": [0.0, 0.0, 0.0], "radius": 1.0, "material": 0 } ]
        }"#;
        assert!(Scene::from_json(json).is_err());
    }
}
