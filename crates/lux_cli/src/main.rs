//! Command-line front end for the LUX progressive path tracer.
//!
//! Accumulates a fixed number of progressive frames and writes the resolved
//! image to a PNG file.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use lux_renderer::{
    Camera, Color, Material, ProgressiveTracer, RenderSettings, Scene, SkyMode, Vec3,
};

#[derive(Parser)]
#[command(name = "lux", about = "Progressive path tracer for sphere scenes")]
struct Args {
    /// Image width in pixels
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = 360)]
    height: u32,

    /// Number of progressive frames to accumulate
    #[arg(long, default_value_t = 32)]
    frames: u32,

    /// Sample slots per pixel per frame
    #[arg(long, default_value_t = 4)]
    samples: u32,

    /// Maximum bounce generations per frame
    #[arg(long, default_value_t = 8)]
    bounces: u32,

    /// Lens aperture (diameter); 0 disables depth of field
    #[arg(long, default_value_t = 0.0)]
    aperture: f32,

    /// JSON scene description; the built-in demo scene is used when omitted
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Output PNG path
    #[arg(long, default_value = "render.png")]
    output: PathBuf,
}

/// Three spheres on a matte ground: diffuse, glass, and metal.
fn demo_scene() -> Scene {
    let mut scene = Scene::new();

    let ground = scene.add_material(Material::lambertian(Color::new(0.8, 0.8, 0.0)));
    let matte = scene.add_material(Material::lambertian(Color::new(0.1, 0.2, 0.5)));
    let glass = scene.add_material(Material::dielectric(1.5));
    let gold = scene.add_material(Material::metal(Color::new(0.8, 0.6, 0.2), 0.1));

    scene.add_sphere(Vec3::new(0.0, -100.5, -1.0), 100.0, ground);
    scene.add_sphere(Vec3::new(0.0, 0.0, -1.0), 0.5, matte);
    scene.add_sphere(Vec3::new(-1.0, 0.0, -1.0), 0.5, glass);
    scene.add_sphere(Vec3::new(1.0, 0.0, -1.0), 0.5, gold);

    scene
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let scene = match &args.scene {
        Some(path) => Scene::from_file(path)
            .with_context(|| format!("failed to load scene {}", path.display()))?,
        None => demo_scene(),
    };
    log::info!(
        "scene: {} spheres, {} materials",
        scene.spheres().len(),
        scene.materials().len()
    );

    let look_from = Vec3::new(-2.0, 2.0, 1.0);
    let look_at = Vec3::new(0.0, 0.0, -1.0);
    let camera = Camera::new()
        .with_resolution(args.width, args.height)
        .with_position(look_from, look_at, Vec3::Y)
        .with_lens(20.0, args.aperture, (look_at - look_from).length());

    let settings = RenderSettings {
        width: args.width,
        height: args.height,
        samples_per_frame: args.samples,
        max_bounces: args.bounces,
        sky: SkyMode::Gradient,
    };

    let mut tracer = ProgressiveTracer::new(camera, settings);
    tracer.activate();

    let start = Instant::now();
    for _ in 0..args.frames {
        let report = tracer.advance_frame(&scene)?;
        log::debug!(
            "frame {} done, {} samples/pixel accumulated",
            report.frame,
            report.samples
        );
    }
    log::info!(
        "accumulated {} samples/pixel over {} frames in {:.2?}",
        tracer.samples_accumulated(),
        args.frames,
        start.elapsed()
    );

    let image = tracer.resolve()?;
    image
        .save_png(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    log::info!("wrote {}", args.output.display());

    Ok(())
}
