//! LUX Renderer - Progressive CPU Path Tracing
//!
//! A physically-inspired Monte Carlo path tracer over analytic sphere
//! scenes. Radiance samples accumulate across frames until the image
//! converges; any tracked camera or scene parameter change resets
//! accumulation and starts over.

mod camera;
mod hittable;
mod material;
mod progressive;
mod ray;
mod resolve;
mod scene;
mod sphere;

pub mod rng;
pub mod sampler;

pub use camera::Camera;
pub use hittable::{HitRecord, Hittable};
pub use material::{reflectance, Color, Material, MaterialId, Scatter};
pub use progressive::{
    Accumulator, FrameReport, FrameState, PackedPathState, PathState, ProgressiveTracer,
    RenderSettings, SkyMode, TracerError,
};
pub use ray::Ray;
pub use resolve::{color_to_rgba, linear_to_gamma, ResolvedImage};
pub use scene::{
    PackedSphere, Scene, SceneError, SceneFile, SceneResult, SphereDecl, PACKED_SPHERE_FLOATS,
};
pub use sphere::Sphere;

/// Re-export common math types from lux_math
pub use lux_math::{Interval, Mat4, Vec3};
