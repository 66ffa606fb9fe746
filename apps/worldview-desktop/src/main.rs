use anyhow::{Context, Result, anyhow};
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec3;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent as WinitKeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};
use worldview::{Element, LoadedScene, SceneFile, Worldview};
use worldview_author::PolygonBuilder;
use worldview_commands::{Lines, Spheres};
use worldview_common::{Color, Dimensions, LinePrimitive, Marker, MarkerRef};
use worldview_input::{
    CLICK_DISTANCE, DeltaMode, KeyEvent, Modifiers, MouseButton, MouseEvent, MouseEventKind,
    WheelEvent,
};
use worldview_render::{DrawableCommand, MouseEventObject, WorldviewError};
use worldview_render_wgpu::WgpuGpu;
use worldview_tools::StatsReport;

const DEMO_SCENE: &str = include_str!("../../../demos/stacked.yaml");
const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);
const HIGHLIGHT_COLOR: Color = Color::new(1.0, 0.85, 0.1, 1.0);

#[derive(Parser)]
#[command(name = "worldview-desktop", about = "Worldview desktop viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML scene file; a built-in demo scene when omitted
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Report every object under the pointer, not only the nearest
    #[arg(long)]
    stacked: bool,

    /// Ctrl-click draws polygons on the ground plane
    #[arg(long)]
    draw: bool,

    /// Show rendering counters
    #[arg(long)]
    debug: bool,
}

/// Objects under the last click, and the outline drawn around the nearest.
#[derive(Default)]
struct Picked {
    objects: Vec<MouseEventObject>,
    outline: Vec<MarkerRef>,
    changed: bool,
}

impl Picked {
    fn is_outline(&self, marker: &MarkerRef) -> bool {
        self.outline.iter().any(|m| Arc::ptr_eq(m, marker))
    }
}

/// Viewer state around the worldview host.
struct Viewer {
    wv: Worldview<WgpuGpu>,
    scene: LoadedScene,
    picked: Rc<RefCell<Picked>>,
    builder: Option<Rc<RefCell<PolygonBuilder>>>,
    shown_revision: Option<u64>,
    lines: Rc<dyn DrawableCommand>,
    spheres: Rc<dyn DrawableCommand>,
    cursor: (f32, f32),
    held: Option<MouseButton>,
    modifiers: Modifiers,
    last_click: Option<(Instant, f32, f32)>,
    started: Instant,
    show_panel: bool,
}

impl Viewer {
    fn new(wv: Worldview<WgpuGpu>, scene: LoadedScene, draw: bool) -> Self {
        let mut viewer = Self {
            wv,
            scene,
            picked: Rc::new(RefCell::new(Picked {
                changed: true,
                ..Picked::default()
            })),
            builder: draw.then(|| Rc::new(RefCell::new(PolygonBuilder::new()))),
            shown_revision: None,
            lines: Rc::new(Lines),
            spheres: Rc::new(Spheres),
            cursor: (0.0, 0.0),
            held: None,
            modifiers: Modifiers::NONE,
            last_click: None,
            started: Instant::now(),
            show_panel: true,
        };
        viewer.install_handlers();
        viewer
    }

    fn install_handlers(&mut self) {
        let picked = self.picked.clone();
        self.wv
            .set_global_handler(MouseEventKind::Click, move |_, info, _| {
                let mut picked = picked.borrow_mut();
                let objects: Vec<MouseEventObject> = info
                    .objects
                    .iter()
                    .filter(|o| !picked.is_outline(&o.object))
                    .cloned()
                    .collect();
                debug!(count = objects.len(), "picked");
                picked.objects = objects;
                picked.changed = true;
            });

        let Some(builder) = &self.builder else {
            return;
        };
        let b = builder.clone();
        self.wv
            .set_global_handler(MouseEventKind::MouseDown, move |event, info, _| {
                b.borrow_mut().on_mouse_down(event, &info.ray, &info.objects);
            });
        let b = builder.clone();
        self.wv
            .set_global_handler(MouseEventKind::MouseMove, move |_, info, propagation| {
                if b.borrow_mut().on_mouse_move(&info.ray) {
                    propagation.stop_propagation();
                }
            });
        let b = builder.clone();
        self.wv
            .set_global_handler(MouseEventKind::MouseUp, move |event, _, _| {
                b.borrow_mut().on_mouse_up(event);
            });
        let b = builder.clone();
        self.wv
            .set_global_handler(MouseEventKind::DoubleClick, move |_, info, _| {
                b.borrow_mut().on_double_click(&info.ray, &info.objects);
            });
    }

    /// Re-declare the elements when the selection or the polygons changed.
    fn sync_elements(&mut self) -> Result<(), WorldviewError> {
        let revision = self.builder.as_ref().map(|b| b.borrow().revision());
        let picked_changed = std::mem::take(&mut self.picked.borrow_mut().changed);
        if !picked_changed && revision == self.shown_revision {
            return Ok(());
        }
        self.shown_revision = revision;

        let mut elements = self.scene.elements.clone();
        if let Some(builder) = &self.builder {
            let markers = builder.borrow().markers();
            elements.push(Element::new("polygon-lines", self.lines.clone()).with_markers(markers.lines));
            elements.push(Element::new("polygon-points", self.spheres.clone()).with_markers(markers.points));
        }
        let highlight: Vec<MarkerRef> = {
            let picked = self.picked.borrow();
            picked.objects.first().map(outline).into_iter().collect()
        };
        self.picked.borrow_mut().outline = highlight.clone();
        elements.push(Element::new("selection", self.lines.clone()).with_markers(highlight));
        self.wv.render(elements)
    }

    fn mouse(&mut self, kind: MouseEventKind, button: MouseButton) {
        let (x, y) = self.cursor;
        let event = MouseEvent::new(kind, button, x, y).with_modifiers(self.modifiers);
        let dispatched = match pollster::block_on(self.wv.handle_mouse(&event)) {
            Ok(dispatched) => dispatched,
            Err(err) => {
                error!(%err, ?kind, "mouse event failed");
                return;
            }
        };
        if !dispatched.iter().any(|d| d.kind == MouseEventKind::Click) {
            return;
        }
        let now = Instant::now();
        let double = self.last_click.is_some_and(|(at, px, py)| {
            now.duration_since(at) <= DOUBLE_CLICK_WINDOW
                && (x - px).hypot(y - py) <= CLICK_DISTANCE
        });
        if double {
            self.last_click = None;
            let event = MouseEvent::new(MouseEventKind::DoubleClick, button, x, y)
                .with_modifiers(self.modifiers);
            if let Err(err) = pollster::block_on(self.wv.handle_mouse(&event)) {
                error!(%err, "double click failed");
            }
        } else {
            self.last_click = Some((now, x, y));
        }
    }

    fn key(&mut self, code: String, pressed: bool, repeat: bool) {
        let mut event = KeyEvent::new(code).with_modifiers(self.modifiers);
        if repeat {
            event = event.repeated();
        }
        if !pressed {
            self.wv.key_up(&event);
            return;
        }
        if let Some(builder) = &self.builder {
            if builder.borrow_mut().on_key_down(&event) {
                return;
            }
        }
        match event.code.as_str() {
            "F1" => self.show_panel = !self.show_panel,
            "Escape" => {
                let mut picked = self.picked.borrow_mut();
                picked.objects.clear();
                picked.changed = true;
            }
            _ => {
                self.wv.key_down(&event);
            }
        }
    }

    fn wheel(&mut self, delta: MouseScrollDelta, scale_factor: f64) {
        // winit reports scrolling up as positive; wheel deltas grow downward
        let event = match delta {
            MouseScrollDelta::LineDelta(x, y) => WheelEvent {
                delta_x: -x,
                delta_y: -y,
                delta_mode: DeltaMode::Line,
                modifiers: self.modifiers,
            },
            MouseScrollDelta::PixelDelta(p) => {
                let p = p.to_logical::<f32>(scale_factor);
                WheelEvent {
                    modifiers: self.modifiers,
                    ..WheelEvent::new(-p.x, -p.y)
                }
            }
        };
        self.wv.wheel(&event);
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        let painter = ctx.layer_painter(egui::LayerId::new(egui::Order::Background, egui::Id::new("labels")));
        for (_, text) in &self.scene.texts {
            for label in text.labels() {
                painter.text(
                    egui::pos2(label.x, label.y),
                    egui::Align2::CENTER_CENTER,
                    &label.text,
                    egui::FontId::proportional(label.font_size),
                    color32(label.color),
                );
            }
        }

        if !self.show_panel {
            return;
        }
        egui::Window::new("Worldview")
            .default_pos([10.0, 10.0])
            .show(ctx, |ui| {
                let state = self.wv.camera_state();
                ui.heading("Camera");
                ui.label(format!("distance: {:.2}", state.distance));
                ui.label(format!("phi: {:.3}  theta: {:.3}", state.phi, state.theta_offset));
                ui.label(format!(
                    "target: {:.2} {:.2} {:.2}",
                    state.target_offset.x, state.target_offset.y, state.target_offset.z
                ));

                ui.separator();
                ui.heading("Selection");
                let picked = self.picked.borrow();
                if picked.objects.is_empty() {
                    ui.label("nothing picked");
                }
                for (i, object) in picked.objects.iter().enumerate() {
                    let id = object
                        .object
                        .id
                        .map_or_else(|| "-".to_string(), |id| id.0.to_string());
                    let p = object.object.pose.position;
                    let instance = object
                        .instance_index
                        .map_or_else(String::new, |index| format!(" instance {index}"));
                    ui.label(format!("{i}: id {id} at {:.1} {:.1} {:.1}{instance}", p.x, p.y, p.z));
                }
                drop(picked);

                if let Some(builder) = &self.builder {
                    ui.separator();
                    ui.heading("Polygons");
                    let mut clicked = None;
                    for polygon in builder.borrow().polygons() {
                        let active = builder.borrow().active_polygon().is_some_and(|a| a.id == polygon.id);
                        let name = polygon.name.as_deref().unwrap_or("polygon");
                        let closed = if polygon.is_closed() { "closed" } else { "open" };
                        let text = format!("{name} #{}: {} points, {closed}", polygon.id.0, polygon.points.len());
                        if ui.selectable_label(active, text).clicked() {
                            clicked = Some(polygon.id);
                        }
                    }
                    if clicked.is_some() {
                        builder.borrow_mut().select_object(clicked);
                    }
                    ui.small("Ctrl+click: add point | Double-click: insert or delete | Del: remove");
                }

                if self.wv.config().show_debug {
                    ui.separator();
                    ui.heading("Debug");
                    match self.wv.context().debug_stats() {
                        Ok(stats) => {
                            egui::Grid::new("stats").striped(true).show(ui, |ui| {
                                for (name, value) in StatsReport::new(&stats).rows() {
                                    ui.label(name);
                                    ui.label(value);
                                    ui.end_row();
                                }
                            });
                        }
                        Err(err) => {
                            ui.label(format!("stats unavailable: {err}"));
                        }
                    }
                }

                ui.separator();
                ui.small("F1: Toggle panel | Drag: rotate | Right drag: pan | WASD/QE/ZX: camera | Esc: clear");
            });
    }
}

fn color32(c: Color) -> egui::Color32 {
    let [r, g, b, a] = c.to_array().map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8);
    egui::Color32::from_rgba_unmultiplied(r, g, b, a)
}

fn button(button: winit::event::MouseButton) -> MouseButton {
    match button {
        winit::event::MouseButton::Left => MouseButton::Left,
        winit::event::MouseButton::Right => MouseButton::Right,
        winit::event::MouseButton::Middle => MouseButton::Middle,
        winit::event::MouseButton::Back => MouseButton::Other(3),
        winit::event::MouseButton::Forward => MouseButton::Other(4),
        winit::event::MouseButton::Other(n) => MouseButton::Other(n),
    }
}

/// Wireframe box around a picked object, in the object's pose.
fn outline(object: &MouseEventObject) -> MarkerRef {
    let marker = &object.object;
    let (center, half) = match object.instance_index.and_then(|i| marker.points.get(i)) {
        Some(point) => (*point, Vec3::splat(marker.scale.x.max(0.1) / 2.0)),
        None if !marker.points.is_empty() => {
            let min = marker.points.iter().copied().fold(Vec3::MAX, Vec3::min);
            let max = marker.points.iter().copied().fold(Vec3::MIN, Vec3::max);
            ((min + max) / 2.0, (max - min) / 2.0)
        }
        None => (Vec3::ZERO, marker.scale / 2.0),
    };
    let half = half * 1.1 + Vec3::splat(0.05);
    let corner = |i: usize| {
        let sign = |bit: usize| if i & bit == 0 { -1.0 } else { 1.0 };
        center + half * Vec3::new(sign(1), sign(2), sign(4))
    };
    let mut points = Vec::with_capacity(24);
    for i in 0..8 {
        for bit in [1, 2, 4] {
            if i & bit == 0 {
                points.push(corner(i));
                points.push(corner(i | bit));
            }
        }
    }
    Marker {
        pose: marker.pose,
        primitive: LinePrimitive::Lines,
        ..Marker::new()
            .with_scale(Vec3::ZERO)
            .with_color(HIGHLIGHT_COLOR)
            .with_points(points)
    }
    .shared()
}

struct GpuApp {
    cli: Cli,
    viewer: Option<Viewer>,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    config: Option<wgpu::SurfaceConfiguration>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
}

impl GpuApp {
    fn new(cli: Cli) -> Self {
        Self {
            cli,
            viewer: None,
            window: None,
            surface: None,
            config: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            egui_renderer: None,
        }
    }

    fn scene_file(&self) -> Result<SceneFile> {
        let mut file = match &self.cli.scene {
            Some(path) => {
                SceneFile::read(path).with_context(|| format!("loading scene {}", path.display()))?
            }
            None => SceneFile::from_yaml(DEMO_SCENE)?,
        };
        if self.cli.stacked {
            file.config.enable_stacked_object_events = true;
        }
        if self.cli.debug {
            file.config.show_debug = true;
        }
        Ok(file)
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut file = self.scene_file()?;

        let attrs = Window::default_attributes()
            .with_title("Worldview")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no adapter can present to this window"))?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("worldview_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let scale = window.scale_factor();
        let size = window.inner_size();
        let logical = size.to_logical::<f32>(scale);
        file.config.resolution_scale = scale as f32;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no formats"))?;

        let mut wv = Worldview::new(file.config.clone(), Dimensions::new(logical.width, logical.height));
        let (width, height) = wv.surface_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or_default(),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(scale as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        info!(backend = adapter.get_info().backend.to_str(), width, height, "GPU initialized");
        wv.initialize(WgpuGpu::new(device, queue, surface_format, width, height))?;
        let scene = wv.load_scene(&file)?;
        let mut viewer = Viewer::new(wv, scene, self.cli.draw);
        viewer.sync_elements()?;

        self.window = Some(window);
        self.surface = Some(surface);
        self.config = Some(config);
        self.egui_winit = Some(egui_winit);
        self.egui_renderer = Some(egui_renderer);
        self.viewer = Some(viewer);
        Ok(())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        let (Some(window), Some(surface), Some(config), Some(viewer)) =
            (&self.window, &self.surface, &mut self.config, &mut self.viewer)
        else {
            return;
        };
        let logical = size.to_logical::<f32>(window.scale_factor());
        viewer.wv.set_dimension(Dimensions::new(logical.width, logical.height));
        let (width, height) = viewer.wv.surface_size();
        config.width = width;
        config.height = height;
        if let Some(gpu) = viewer.wv.context_mut().gpu_mut() {
            surface.configure(gpu.device(), config);
            gpu.resize_canvas(width, height);
        }
    }

    fn redraw(&mut self) {
        let (Some(window), Some(surface), Some(config), Some(viewer)) =
            (&self.window, &self.surface, &self.config, &mut self.viewer)
        else {
            return;
        };
        if let Err(err) = viewer.sync_elements() {
            error!(%err, "re-declaring elements failed");
        }

        let output = match surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                if let Some(gpu) = viewer.wv.context().gpu() {
                    surface.configure(gpu.device(), config);
                }
                return;
            }
            Err(e) => {
                error!("surface error: {e}");
                return;
            }
        };
        let scene_view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let overlay_view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(gpu) = viewer.wv.context_mut().gpu_mut() {
            gpu.set_canvas_view(scene_view);
        }
        let now = Instant::now();
        let timestamp_ms = now.duration_since(viewer.started).as_secs_f64() * 1000.0;
        // the surface texture is fresh every frame, so paint even when nothing changed
        if !viewer.wv.frame(timestamp_ms, now) {
            viewer.wv.paint();
        }

        let (Some(egui_winit), Some(egui_renderer)) = (&mut self.egui_winit, &mut self.egui_renderer)
        else {
            return;
        };
        let raw_input = egui_winit.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| viewer.draw_ui(ctx));
        egui_winit.handle_platform_output(window, full_output.platform_output);
        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [config.width, config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        let Some(gpu) = viewer.wv.context().gpu() else {
            return;
        };
        let (device, queue) = (gpu.device(), gpu.queue());
        for (id, image_delta) in &full_output.textures_delta.set {
            egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui_encoder"),
        });
        egui_renderer.update_buffers(device, queue, &mut encoder, &paint_jobs, &screen_descriptor);
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &overlay_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            egui_renderer.free_texture(id);
        }

        output.present();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            error!("startup failed: {err:#}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let (Some(egui_winit), Some(window)) = (&mut self.egui_winit, &self.window) {
            if egui_winit.on_window_event(window, &event).consumed {
                return;
            }
        }
        let scale_factor = self.window.as_ref().map_or(1.0, |w| w.scale_factor());

        match event {
            WindowEvent::CloseRequested => {
                if let Some(viewer) = &mut self.viewer {
                    viewer.wv.destroy();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.resize(size),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {
                let Some(viewer) = &mut self.viewer else {
                    return;
                };
                match event {
                    WindowEvent::ModifiersChanged(modifiers) => {
                        let state = modifiers.state();
                        viewer.modifiers = Modifiers {
                            shift: state.shift_key(),
                            ctrl: state.control_key(),
                            alt: state.alt_key(),
                            meta: state.super_key(),
                        };
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            WinitKeyEvent {
                                physical_key: PhysicalKey::Code(code),
                                state,
                                repeat,
                                ..
                            },
                        ..
                    } => {
                        // winit key codes print as the web-style names the key map uses
                        viewer.key(format!("{code:?}"), state == ElementState::Pressed, repeat);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let p = position.to_logical::<f32>(scale_factor);
                        viewer.cursor = (p.x, p.y);
                        let b = viewer.held.unwrap_or(MouseButton::Left);
                        viewer.mouse(MouseEventKind::MouseMove, b);
                    }
                    WindowEvent::MouseInput { state, button: b, .. } => {
                        let b = button(b);
                        match state {
                            ElementState::Pressed => {
                                viewer.held = Some(b);
                                viewer.mouse(MouseEventKind::MouseDown, b);
                            }
                            ElementState::Released => {
                                viewer.held = None;
                                viewer.mouse(MouseEventKind::MouseUp, b);
                            }
                        }
                    }
                    WindowEvent::MouseWheel { delta, .. } => viewer.wheel(delta, scale_factor),
                    WindowEvent::CursorLeft { .. } if viewer.held.is_none() => {
                        viewer.wv.window_mouse_up(false);
                    }
                    WindowEvent::Focused(false) => {
                        viewer.held = None;
                        viewer.wv.blur();
                    }
                    _ => {}
                }
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    info!("worldview-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(cli);
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_scene_parses() {
        let file = SceneFile::from_yaml(DEMO_SCENE).unwrap();
        assert!(!file.elements.is_empty());
    }

    #[test]
    fn outline_has_twelve_edges_around_the_shape() {
        let marker = Marker::at(Vec3::new(1.0, 2.0, 3.0))
            .with_scale(Vec3::splat(2.0))
            .shared();
        let outline = outline(&MouseEventObject::new(marker, None));
        assert_eq!(outline.points.len(), 24);
        assert_eq!(outline.pose.position, Vec3::new(1.0, 2.0, 3.0));
        let extent = outline.points.iter().fold(0.0f32, |m, p| m.max(p.abs().max_element()));
        assert!(extent > 1.0 && extent < 1.5);
    }

    #[test]
    fn outline_of_an_instance_wraps_that_point() {
        let marker = Marker::new()
            .with_points(vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)])
            .with_scale(Vec3::splat(1.0))
            .shared();
        let outline = outline(&MouseEventObject::new(marker, Some(1)));
        assert!(outline.points.iter().all(|p| (p.x - 10.0).abs() < 1.0));
    }

    #[test]
    fn winit_buttons_map_to_worldview_buttons() {
        assert_eq!(button(winit::event::MouseButton::Left), MouseButton::Left);
        assert_eq!(button(winit::event::MouseButton::Back), MouseButton::Other(3));
    }

    #[test]
    fn colors_convert_to_bytes() {
        assert_eq!(color32(Color::WHITE), egui::Color32::WHITE);
    }
}
