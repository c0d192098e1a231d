//! Progressive accumulation scheduler.
//!
//! Drives one logical lane per (pixel, sample-slot) pair through camera-ray
//! generation and iterative bounce generations, then folds the resulting
//! radiance into a running accumulation buffer. Accumulation continues
//! across frames until a tracked control parameter changes, at which point
//! the buffer and sample counter are reset.
//!
//! Lanes never share mutable state during a generation; each parallel sweep
//! completing is the barrier before the next generation begins.

use crate::camera::Camera;
use crate::hittable::Hittable;
use crate::material::Color;
use crate::resolve::ResolvedImage;
use crate::rng::lane_rng;
use crate::sampler;
use crate::scene::{Scene, SceneError};
use crate::Ray;
use bytemuck::{Pod, Zeroable};
use lux_math::{Interval, Mat4, Vec3};
use rayon::prelude::*;
use thiserror::Error;

/// Shadow-acne offset: intersections closer than this are ignored.
const T_MIN: f32 = 1e-3;

/// Errors from the progressive tracer.
#[derive(Error, Debug)]
pub enum TracerError {
    #[error("frame buffers are not acquired; call activate() first")]
    NotActivated,

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Miss-term policy for rays that leave the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkyMode {
    /// White-to-blue vertical gradient.
    Gradient,
    /// Constant background color.
    Solid(Color),
}

/// Render configuration for the progressive tracer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Sample slots traced per pixel each frame
    pub samples_per_frame: u32,
    /// Maximum bounce generations per frame
    pub max_bounces: u32,
    /// Background term for rays that miss all geometry
    pub sky: SkyMode,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 450,
            samples_per_frame: 4,
            max_bounces: 8,
            sky: SkyMode::Gradient,
        }
    }
}

/// Scheduler state reported for each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// No tracked parameter changed; accumulation continued.
    Stable,
    /// A tracked parameter changed; accumulation was reset this frame.
    Invalidated,
}

/// Outcome of one progressive frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameReport {
    /// Index of the frame that was just traced
    pub frame: u64,
    /// Whether accumulation was reset before tracing
    pub state: FrameState,
    /// Per-pixel sample count after accumulation
    pub samples: u32,
}

/// Cached control parameters. Any difference between consecutive frames
/// triggers invalidation; comparison is exact, with no epsilon tolerance.
#[derive(Debug, Clone, PartialEq)]
struct FrameSnapshot {
    view: Mat4,
    projection: Mat4,
    aperture: f32,
    focus_dist: f32,
    max_bounces: u32,
    scene_version: u64,
    width: u32,
    height: u32,
    samples_per_frame: u32,
    sky: SkyMode,
}

/// Per-lane transport state for one (pixel, sample-slot) pair.
///
/// Created at camera-ray init each frame, mutated once per bounce
/// generation, retired when the ray misses, is absorbed, or runs out of
/// bounces.
#[derive(Debug, Clone, Copy)]
pub struct PathState {
    /// Current ray segment
    pub ray: Ray,
    /// Radiance gathered along the path so far
    pub radiance: Color,
    /// Product of attenuations along the path
    pub throughput: Color,
    /// Completed bounce count
    pub bounce: u32,
    /// Whether the lane still participates in bounce generations
    pub active: bool,
    /// Flat pixel index
    pub pixel: u32,
    /// Sample slot within the pixel
    pub sample: u32,
}

impl PathState {
    /// Pack into the externalized record layout.
    pub fn pack(&self) -> PackedPathState {
        PackedPathState {
            origin: self.ray.origin().to_array(),
            // Retired lanes are encoded with a zero direction; live lanes
            // never have one because degenerate scatter directions are
            // redirected to the surface normal
            direction: if self.active {
                self.ray.direction().to_array()
            } else {
                [0.0; 3]
            },
            radiance: self.radiance.to_array(),
            throughput: self.throughput.to_array(),
            bounce: self.bounce as f32,
            pixel: self.pixel,
            sample: self.sample,
        }
    }
}

/// Fixed-size per-lane record for an external compute substrate:
/// 13 floats followed by 2 integers.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PackedPathState {
    pub origin: [f32; 3],
    pub direction: [f32; 3],
    pub radiance: [f32; 3],
    pub throughput: [f32; 3],
    pub bounce: f32,
    pub pixel: u32,
    pub sample: u32,
}

/// Running per-pixel radiance sums plus the global sample counter.
#[derive(Debug, Clone)]
pub struct Accumulator {
    width: u32,
    height: u32,
    sum: Vec<Color>,
    samples: u32,
}

impl Accumulator {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sum: vec![Color::ZERO; (width * height) as usize],
            samples: 0,
        }
    }

    fn reset(&mut self) {
        self.sum.fill(Color::ZERO);
        self.samples = 0;
    }

    /// Per-pixel samples accumulated so far.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Displayed color for a pixel: accumulated sum over sample count.
    pub fn resolve_pixel(&self, x: u32, y: u32) -> Color {
        if self.samples == 0 {
            return Color::ZERO;
        }
        self.sum[(y * self.width + x) as usize] / self.samples as f32
    }

    /// Normalize the whole buffer for presentation.
    pub fn resolve(&self) -> ResolvedImage {
        let pixels = if self.samples == 0 {
            vec![Color::ZERO; self.sum.len()]
        } else {
            let scale = 1.0 / self.samples as f32;
            self.sum.iter().map(|&c| c * scale).collect()
        };
        ResolvedImage::new(self.width, self.height, pixels)
    }
}

/// Frame-lifetime buffers, acquired on activation and released together.
struct FrameBuffers {
    accum: Accumulator,
    paths: Vec<PathState>,
}

/// Owner-constructed progressive tracer context.
///
/// Holds the camera, render settings, the sample-slot lattice, and the
/// accumulation state. The scene is borrowed per frame, so geometry cannot
/// change underneath an in-flight frame.
pub struct ProgressiveTracer {
    camera: Camera,
    settings: RenderSettings,
    lattice: Vec<Vec3>,
    buffers: Option<FrameBuffers>,
    cached: Option<FrameSnapshot>,
    frame: u64,
}

impl ProgressiveTracer {
    /// Create a tracer. Buffers are not acquired until [`activate`].
    ///
    /// [`activate`]: ProgressiveTracer::activate
    pub fn new(camera: Camera, settings: RenderSettings) -> Self {
        Self {
            camera,
            settings,
            lattice: Vec::new(),
            buffers: None,
            cached: None,
            frame: 0,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Mutable camera access; changes are picked up by change detection on
    /// the next frame.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RenderSettings {
        &mut self.settings
    }

    /// Per-pixel samples accumulated so far (0 when not activated).
    pub fn samples_accumulated(&self) -> u32 {
        self.buffers.as_ref().map_or(0, |b| b.accum.samples())
    }

    /// Read access to the accumulation buffer for the presentation stage.
    pub fn accumulator(&self) -> Option<&Accumulator> {
        self.buffers.as_ref().map(|b| &b.accum)
    }

    /// Whether frame buffers are currently acquired.
    pub fn is_active(&self) -> bool {
        self.buffers.is_some()
    }

    /// Acquire frame buffers for the current settings.
    pub fn activate(&mut self) {
        let slot_count = self.settings.samples_per_frame as usize;
        self.lattice = sampler::hemisphere(slot_count);
        self.buffers = Some(self.make_buffers());
        self.cached = None;
        log::debug!(
            "acquired buffers: {}x{} pixels, {} slots",
            self.settings.width,
            self.settings.height,
            slot_count
        );
    }

    /// Release all frame buffers. Idempotent; also runs on drop.
    pub fn release(&mut self) {
        if self.buffers.take().is_some() {
            log::debug!("released frame buffers");
        }
        self.cached = None;
        self.lattice.clear();
    }

    fn make_buffers(&self) -> FrameBuffers {
        let lanes =
            (self.settings.width * self.settings.height * self.settings.samples_per_frame) as usize;
        FrameBuffers {
            accum: Accumulator::new(self.settings.width, self.settings.height),
            paths: vec![
                PathState {
                    ray: Ray::default(),
                    radiance: Color::ZERO,
                    throughput: Color::ONE,
                    bounce: 0,
                    active: false,
                    pixel: 0,
                    sample: 0,
                };
                lanes
            ],
        }
    }

    fn snapshot(&self, scene: &Scene) -> FrameSnapshot {
        FrameSnapshot {
            view: self.camera.view_matrix(),
            projection: self.camera.projection_matrix(),
            aperture: self.camera.aperture(),
            focus_dist: self.camera.focus_dist(),
            max_bounces: self.settings.max_bounces,
            scene_version: scene.version(),
            width: self.settings.width,
            height: self.settings.height,
            samples_per_frame: self.settings.samples_per_frame,
            sky: self.settings.sky,
        }
    }

    /// Trace one progressive frame and fold it into the accumulation buffer.
    ///
    /// Detects control-parameter changes against the previous frame's
    /// snapshot, resetting accumulation when any of them differ; then runs
    /// camera-ray init and `max_bounces` bounce generations over every
    /// (pixel, sample-slot) lane, and accumulates the gathered radiance.
    pub fn advance_frame(&mut self, scene: &Scene) -> Result<FrameReport, TracerError> {
        if self.buffers.is_none() {
            return Err(TracerError::NotActivated);
        }
        debug_assert!(self.settings.samples_per_frame > 0);

        self.camera.initialize();
        let snapshot = self.snapshot(scene);
        let state = if self.cached.as_ref() == Some(&snapshot) {
            FrameState::Stable
        } else {
            // Geometry is only re-checked when it can have changed
            scene.validate()?;
            if self.lattice.len() != self.settings.samples_per_frame as usize {
                self.lattice = sampler::hemisphere(self.settings.samples_per_frame as usize);
            }
            self.buffers = Some(self.make_buffers());
            self.cached = Some(snapshot);
            log::info!("parameters changed, accumulation reset at frame {}", self.frame);
            FrameState::Invalidated
        };

        let frame = self.frame;
        let width = self.settings.width;
        let spf = self.settings.samples_per_frame;
        let max_bounces = self.settings.max_bounces;
        let sky = self.settings.sky;
        let camera = &self.camera;
        let lattice = &self.lattice;
        let Some(buffers) = self.buffers.as_mut() else {
            return Err(TracerError::NotActivated);
        };

        // Camera-ray init: one lane per (pixel, sample slot). Stream 0 of a
        // lane's generator is reserved for camera jitter.
        buffers
            .paths
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, lane)| {
                let pixel = (index / spf as usize) as u32;
                let sample = (index % spf as usize) as u32;
                let mut rng = lane_rng(frame, pixel, sample, 0);
                *lane = PathState {
                    ray: camera.get_ray(pixel % width, pixel / width, &mut rng),
                    radiance: Color::ZERO,
                    throughput: Color::ONE,
                    bounce: 0,
                    active: true,
                    pixel,
                    sample,
                };
            });

        // Bounce generations. Each parallel sweep completing is the barrier
        // before the next generation.
        for generation in 0..max_bounces {
            buffers.paths.par_iter_mut().for_each(|lane| {
                if !lane.active {
                    return;
                }
                // Generation g draws from stream g + 1 (0 is camera jitter)
                let mut rng = lane_rng(frame, lane.pixel, lane.sample, generation + 1);
                match scene.hit(&lane.ray, Interval::new(T_MIN, f32::INFINITY)) {
                    None => {
                        lane.radiance += lane.throughput * sky_color(&lane.ray, sky);
                        lane.active = false;
                    }
                    Some(rec) => {
                        // The lattice seeds each slot's first-generation
                        // diffuse direction; indexing is by sample slot only,
                        // deeper generations draw from the lane stream
                        let seed = (generation == 0).then(|| {
                            sampler::orient(lattice[lane.sample as usize], rec.normal)
                        });
                        match scene
                            .material(rec.material)
                            .scatter(&lane.ray, &rec, &mut rng, seed)
                        {
                            Some(scatter) => {
                                lane.throughput *= scatter.attenuation;
                                lane.ray = scatter.scattered;
                                lane.bounce += 1;
                            }
                            None => lane.active = false,
                        }
                    }
                }
            });
        }

        // Accumulate: each pixel's sum is owned exclusively by its slot
        // range, so the fold needs no locking.
        let accum = &mut buffers.accum;
        accum
            .sum
            .par_iter_mut()
            .zip(buffers.paths.par_chunks(spf as usize))
            .for_each(|(sum, lanes)| {
                for lane in lanes {
                    *sum += lane.radiance;
                }
            });
        accum.samples += spf;
        self.frame += 1;

        Ok(FrameReport {
            frame,
            state,
            samples: accum.samples,
        })
    }

    /// Normalize the accumulation buffer for presentation.
    pub fn resolve(&self) -> Result<ResolvedImage, TracerError> {
        self.buffers
            .as_ref()
            .map(|b| b.accum.resolve())
            .ok_or(TracerError::NotActivated)
    }

    /// Pack the per-lane transport records into the external layout.
    pub fn packed_paths(&self) -> Result<Vec<PackedPathState>, TracerError> {
        self.buffers
            .as_ref()
            .map(|b| b.paths.iter().map(PathState::pack).collect())
            .ok_or(TracerError::NotActivated)
    }
}

impl Drop for ProgressiveTracer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Miss-term color for a ray leaving the scene.
fn sky_color(ray: &Ray, mode: SkyMode) -> Color {
    match mode {
        SkyMode::Solid(color) => color,
        SkyMode::Gradient => {
            let unit_direction = ray.direction().normalize();
            let a = 0.5 * (unit_direction.y + 1.0);
            let white = Color::new(1.0, 1.0, 1.0);
            let blue = Color::new(0.5, 0.7, 1.0);
            white * (1.0 - a) + blue * a
        }
    }
}
