//! Camera for ray generation.

use crate::rng::{gen_f32, LaneRng};
use crate::Ray;
use lux_math::{Mat4, Vec3};

/// Camera for generating rays into the scene.
///
/// Exposes its view and projection matrices so the progressive scheduler
/// can detect parameter changes by exact comparison.
#[derive(Debug, Clone)]
pub struct Camera {
    // Image settings
    pub image_width: u32,
    pub image_height: u32,

    // Camera positioning
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    // Lens settings
    vfov: f32,       // Vertical field of view in degrees
    aperture: f32,   // Lens diameter; 0 disables depth of field
    focus_dist: f32, // Distance from camera to plane of perfect focus

    // Animation clock, stamped onto generated rays
    time: f32,

    // Cached computed values (set by initialize())
    center: Vec3,
    pixel00_loc: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
    u: Vec3,
    v: Vec3,
    w: Vec3,
    defocus_disk_u: Vec3,
    defocus_disk_v: Vec3,
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self {
            image_width: 800,
            image_height: 450,
            look_from: Vec3::new(0.0, 0.0, 0.0),
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::new(0.0, 1.0, 0.0),
            vfov: 90.0,
            aperture: 0.0,
            focus_dist: 1.0,
            time: 0.0,
            center: Vec3::ZERO,
            pixel00_loc: Vec3::ZERO,
            pixel_delta_u: Vec3::ZERO,
            pixel_delta_v: Vec3::ZERO,
            u: Vec3::X,
            v: Vec3::Y,
            w: Vec3::Z,
            defocus_disk_u: Vec3::ZERO,
            defocus_disk_v: Vec3::ZERO,
        }
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// Set lens settings.
    pub fn with_lens(mut self, vfov: f32, aperture: f32, focus_dist: f32) -> Self {
        self.vfov = vfov;
        self.aperture = aperture;
        self.focus_dist = focus_dist;
        self
    }

    /// Move the camera while keeping the rest of the configuration.
    pub fn set_position(&mut self, look_from: Vec3, look_at: Vec3) {
        self.look_from = look_from;
        self.look_at = look_at;
    }

    /// Set the lens aperture (diameter).
    pub fn set_aperture(&mut self, aperture: f32) {
        self.aperture = aperture;
    }

    /// Set the focus distance.
    pub fn set_focus_dist(&mut self, focus_dist: f32) {
        self.focus_dist = focus_dist;
    }

    /// Advance the animation clock. Does not invalidate accumulation.
    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    pub fn aperture(&self) -> f32 {
        self.aperture
    }

    pub fn focus_dist(&self) -> f32 {
        self.focus_dist
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// World-to-view matrix for the current position.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.look_from, self.look_at, self.vup)
    }

    /// Projection matrix for the current lens and resolution.
    pub fn projection_matrix(&self) -> Mat4 {
        let aspect = self.image_width as f32 / self.image_height as f32;
        Mat4::perspective_rh(self.vfov.to_radians(), aspect, 0.1, 1000.0)
    }

    /// Initialize cached viewport values (must be called before get_ray).
    pub fn initialize(&mut self) {
        self.center = self.look_from;

        // Calculate viewport dimensions
        let theta = self.vfov.to_radians();
        let h = (theta / 2.0).tan();
        let viewport_height = 2.0 * h * self.focus_dist;
        let viewport_width = viewport_height * (self.image_width as f32 / self.image_height as f32);

        // Calculate camera basis vectors
        self.w = (self.look_from - self.look_at).normalize();
        self.u = self.vup.cross(self.w).normalize();
        self.v = self.w.cross(self.u);

        // Calculate viewport vectors
        let viewport_u = viewport_width * self.u;
        let viewport_v = -viewport_height * self.v;

        // Calculate pixel delta vectors
        self.pixel_delta_u = viewport_u / self.image_width as f32;
        self.pixel_delta_v = viewport_v / self.image_height as f32;

        // Calculate upper left pixel location
        let viewport_upper_left =
            self.center - self.focus_dist * self.w - viewport_u / 2.0 - viewport_v / 2.0;

        self.pixel00_loc = viewport_upper_left + 0.5 * (self.pixel_delta_u + self.pixel_delta_v);

        // Calculate defocus disk basis vectors
        let defocus_radius = self.aperture / 2.0;
        self.defocus_disk_u = self.u * defocus_radius;
        self.defocus_disk_v = self.v * defocus_radius;
    }

    /// Generate a ray for pixel (i, j) with jittered sampling.
    pub fn get_ray(&self, i: u32, j: u32, rng: &mut LaneRng) -> Ray {
        let offset = sample_square(rng);

        let pixel_sample = self.pixel00_loc
            + ((i as f32) + offset.x) * self.pixel_delta_u
            + ((j as f32) + offset.y) * self.pixel_delta_v;

        let ray_origin = if self.aperture <= 0.0 {
            self.center
        } else {
            self.defocus_disk_sample(rng)
        };

        let ray_direction = pixel_sample - ray_origin;

        Ray::new(ray_origin, ray_direction, self.time)
    }

    /// Sample a point on the defocus disk.
    fn defocus_disk_sample(&self, rng: &mut LaneRng) -> Vec3 {
        let p = random_in_unit_disk(rng);
        self.center + p.x * self.defocus_disk_u + p.y * self.defocus_disk_v
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample a random point in the unit square [-0.5, 0.5] x [-0.5, 0.5].
fn sample_square(rng: &mut LaneRng) -> Vec3 {
    Vec3::new(gen_f32(rng) - 0.5, gen_f32(rng) - 0.5, 0.0)
}

/// Sample a random point in the unit disk.
fn random_in_unit_disk(rng: &mut LaneRng) -> Vec3 {
    loop {
        let p = Vec3::new(gen_f32(rng) * 2.0 - 1.0, gen_f32(rng) * 2.0 - 1.0, 0.0);
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}
