use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use glam::Vec3;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use worldview::{SceneFile, Worldview};
use worldview_camera::{CameraCommand, CameraState, PartialCameraState, ray_from_click, selectors};
use worldview_common::Dimensions;
use worldview_input::{MouseButton, MouseEvent, MouseEventKind};
use worldview_render::{Gpu, HeadlessGpu};
use worldview_tools::{InstrumentedGpu, StatsReport};

#[derive(Parser)]
#[command(name = "worldview-cli", about = "Headless tools for worldview scenes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Render a scene headlessly and report what lies under a pixel
    Pick {
        /// YAML scene file
        #[arg(short, long)]
        scene: PathBuf,
        /// Canvas x, pixels from the left
        #[arg(short, long)]
        x: f32,
        /// Canvas y, pixels from the top
        #[arg(short, long)]
        y: f32,
        /// Report every object under the pixel, front to back
        #[arg(long)]
        stacked: bool,
        #[arg(long, default_value = "800")]
        width: f32,
        #[arg(long, default_value = "600")]
        height: f32,
        /// Count draws per command and print a report
        #[arg(long)]
        profile: bool,
    },
    /// Print values derived from a camera state
    Camera {
        #[command(flatten)]
        camera: CameraArgs,
    },
    /// Project a world point to screen coordinates
    Project {
        #[command(flatten)]
        camera: CameraArgs,
        /// World point as three numbers
        #[arg(long, num_args = 3, allow_hyphen_values = true, value_names = ["X", "Y", "Z"])]
        point: Vec<f32>,
    },
}

/// Camera fields left out fall back to the defaults.
#[derive(Args)]
struct CameraArgs {
    #[arg(long)]
    distance: Option<f32>,
    #[arg(long)]
    phi: Option<f32>,
    #[arg(long, allow_hyphen_values = true)]
    theta_offset: Option<f32>,
    /// Top-down orthographic projection
    #[arg(long)]
    orthographic: bool,
    #[arg(long, default_value = "800")]
    width: f32,
    #[arg(long, default_value = "600")]
    height: f32,
}

impl CameraArgs {
    fn state(&self) -> CameraState {
        CameraState::from_partial(&PartialCameraState {
            distance: self.distance,
            phi: self.phi,
            theta_offset: self.theta_offset,
            perspective: self.orthographic.then_some(false),
            ..Default::default()
        })
    }

    fn command(&self) -> CameraCommand {
        let mut camera = CameraCommand::new();
        camera.update(&self.state());
        camera.set_viewport(Dimensions::new(self.width, self.height));
        camera
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("worldview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", worldview_common::crate_info());
            println!("camera: {}", worldview_camera::crate_info());
            println!("render: {}", worldview_render::crate_info());
            println!("input: {}", worldview_input::crate_info());
            println!("commands: {}", worldview_commands::crate_info());
            println!("assets: {}", worldview_assets::crate_info());
            println!("author: {}", worldview_author::crate_info());
            println!("tools: {}", worldview_tools::crate_info());
            println!("host: {}", worldview::crate_info());
        }
        Commands::Pick {
            scene,
            x,
            y,
            stacked,
            width,
            height,
            profile,
        } => {
            let mut file = SceneFile::read(&scene)
                .with_context(|| format!("loading scene {}", scene.display()))?;
            if stacked {
                file.config.enable_stacked_object_events = true;
            }
            let dimension = Dimensions::new(width, height);
            if profile {
                let wv = pick(&file, InstrumentedGpu::new(HeadlessGpu::new()), dimension, x, y)?;
                let stats = wv.context().debug_stats()?;
                if let Some(gpu) = wv.context().gpu() {
                    print!("{}", StatsReport::new(&stats).with_profile(gpu.profile()));
                }
            } else {
                pick(&file, HeadlessGpu::new(), dimension, x, y)?;
            }
        }
        Commands::Camera { camera } => {
            let state = camera.state();
            let command = camera.command();
            println!("state: {state:?}");
            println!("position: {}", selectors::position(&state));
            println!("orientation: {}", selectors::orientation(&state));
            println!("target heading: {}", selectors::target_heading(&state));
            println!("view: {}", command.view());
            println!("projection: {}", command.projection());
            let ray = ray_from_click(&command, camera.width / 2.0, camera.height / 2.0, camera.width, camera.height);
            println!("center ray: origin={} dir={}", ray.origin, ray.dir);
            match ray.plane_intersection(Vec3::ZERO, Vec3::Z) {
                Some(hit) => println!("center hits ground at {hit}"),
                None => println!("center ray runs parallel to the ground"),
            }
        }
        Commands::Project { camera, point } => {
            let command = camera.command();
            let point = Vec3::from_slice(&point);
            match command.to_screen_coord(&command.viewport(), point) {
                Some(screen) => println!("{point} -> x={:.2} y={:.2} depth={:.5}", screen.x, screen.y, screen.z),
                None => println!("{point} is not visible"),
            }
        }
    }

    Ok(())
}

/// Mount the scene on `gpu`, click at `(x, y)` and print the result.
fn pick<G: Gpu>(
    file: &SceneFile,
    gpu: G,
    dimension: Dimensions,
    x: f32,
    y: f32,
) -> anyhow::Result<Worldview<G>> {
    let mut wv = Worldview::new(file.config.clone(), dimension);
    wv.initialize(gpu)?;
    let loaded = wv.load_scene(file)?;
    if !loaded.wait_for_models() {
        tracing::warn!("some models failed to load; they are not pickable");
    }
    wv.paint();
    info!(x, y, "picking");

    let mut dispatched = Vec::new();
    for kind in [MouseEventKind::MouseDown, MouseEventKind::MouseUp] {
        let event = MouseEvent::new(kind, MouseButton::Left, x, y);
        dispatched.extend(pollster::block_on(wv.handle_mouse(&event))?);
    }
    let click = dispatched
        .into_iter()
        .find(|d| d.kind == MouseEventKind::Click)
        .context("release did not register as a click")?;

    println!("ray: origin={} dir={}", click.info.ray.origin, click.info.ray.dir);
    if click.info.objects.is_empty() {
        println!("nothing hit");
    }
    for (depth, object) in click.info.objects.iter().enumerate() {
        let marker = &object.object;
        let id = marker
            .id
            .map_or_else(|| "-".to_string(), |id| id.0.to_string());
        let instance = object
            .instance_index
            .map_or_else(|| "-".to_string(), |i| i.to_string());
        println!(
            "#{depth}: id={id} instance={instance} position={}",
            marker.pose.position
        );
    }
    for (key, text) in &loaded.texts {
        for label in text.labels() {
            println!("label {key}: {:?} at ({:.1}, {:.1})", label.text, label.x, label.y);
        }
    }
    Ok(wv)
}
