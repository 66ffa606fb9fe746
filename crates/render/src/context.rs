use crate::command::{CommandDefinition, DrawContext, DrawableCommand, InstanceId};
use crate::error::{GpuError, WorldviewError};
use crate::gpu::{Gpu, GpuStats, RenderTarget};
use crate::hitmap::{HitmapObjectIdManager, MouseEventObject, get_id_from_pixel, int_to_rgb};
use crate::scheduler::{DirtyFlag, PaintScheduler};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use worldview_camera::{CameraCommand, CameraInfo, CameraStore, Ray, ray_from_click};
use worldview_common::{Color, Dimensions, MarkerRef};

/// Buffer count above which [`WorldviewContext::debug_stats`] reports a leak.
pub const MAX_BUFFER_COUNT: usize = 1000;

/// Default bound on objects returned by one stacked hitmap read.
pub const DEFAULT_MAX_STACKED_OBJECTS: usize = 100;

/// A registered draw or hitmap call.
#[derive(Clone)]
pub struct DrawInput {
    pub instance: InstanceId,
    pub command: Rc<dyn DrawableCommand>,
    /// `None` skips the call this frame.
    pub markers: Option<Vec<MarkerRef>>,
    /// Lower layers draw first. Defaults to 0.
    pub layer_index: Option<i32>,
}

impl fmt::Debug for DrawInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawInput")
            .field("instance", &self.instance)
            .field("command", &self.command.definition().label)
            .field("markers", &self.markers.as_ref().map(Vec::len))
            .field("layer_index", &self.layer_index)
            .finish()
    }
}

/// A picked object and the draw call that drew it.
pub type HitmapHit = (MouseEventObject, InstanceId);

/// What paint callbacks see after the scene is drawn.
pub struct PaintContext<'a> {
    pub camera: &'a CameraCommand,
    pub dimension: Dimensions,
}

pub type PaintCallback = Box<dyn FnMut(&PaintContext<'_>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaintCallbackId(u64);

/// Timing of the most recent paint.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Counters {
    pub paints: u64,
    pub paint_ms: f64,
    pub render_ms: f64,
    /// Backend draws issued by the last paint.
    pub draws: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DebugStats {
    pub counters: Counters,
    pub gpu: GpuStats,
    pub draw_calls: usize,
    pub hitmap_calls: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HitmapArgs {
    x: f32,
    y: f32,
    enable_stacked: bool,
    max_stacked: usize,
}

#[derive(Debug, Clone)]
struct CachedHitmap {
    args: HitmapArgs,
    hits: Vec<HitmapHit>,
}

struct Initialized<G> {
    gpu: G,
    camera: CameraCommand,
}

enum Lifecycle<G> {
    Uninitialized,
    Initialized(Initialized<G>),
    Destroyed,
}

/// Owns the GPU handle, the registered draw and hitmap calls, the camera and
/// the picking machinery.
///
/// # Invariants
/// - A command definition is compiled at most once per context.
/// - Draw calls run in ascending layer order; ties keep mount order.
/// - Hitmap IDs are only meaningful within the pass that assigned them.
pub struct WorldviewContext<G: Gpu> {
    lifecycle: Lifecycle<G>,
    dimension: Dimensions,
    background: Color,
    camera_store: CameraStore,
    compiled: HashMap<&'static str, G::Command>,
    pending: HashMap<&'static str, CommandDefinition>,
    draw_calls: BTreeMap<InstanceId, DrawInput>,
    hitmap_calls: BTreeMap<InstanceId, DrawInput>,
    paint_callbacks: BTreeMap<PaintCallbackId, PaintCallback>,
    id_manager: HitmapObjectIdManager,
    cached_hitmap: Option<CachedHitmap>,
    scheduler: PaintScheduler,
    dirty: DirtyFlag,
    counters: Counters,
    next_instance: u64,
    next_callback: u64,
}

impl<G: Gpu> WorldviewContext<G> {
    pub fn new(dimension: Dimensions, background: Color, camera_store: CameraStore) -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            dimension,
            background,
            camera_store,
            compiled: HashMap::new(),
            pending: HashMap::new(),
            draw_calls: BTreeMap::new(),
            hitmap_calls: BTreeMap::new(),
            paint_callbacks: BTreeMap::new(),
            id_manager: HitmapObjectIdManager::new(),
            cached_hitmap: None,
            scheduler: PaintScheduler::default(),
            dirty: DirtyFlag::new(),
            counters: Counters::default(),
            next_instance: 0,
            next_callback: 0,
        }
    }

    /// Take ownership of `gpu`, compile everything mounted so far and size
    /// the hitmap framebuffer.
    pub fn initialize(&mut self, mut gpu: G) -> Result<(), WorldviewError> {
        match self.lifecycle {
            Lifecycle::Initialized(_) => {
                error!("initialize called on an initialized context");
                return Err(WorldviewError::AlreadyInitialized);
            }
            Lifecycle::Destroyed => return Err(WorldviewError::Destroyed),
            Lifecycle::Uninitialized => {}
        }
        for (label, definition) in self.pending.drain() {
            let program = gpu.compile(&definition)?;
            self.compiled.insert(label, program);
        }
        let (width, height) = floored(self.dimension);
        gpu.resize_hitmap(width, height)?;
        let mut camera = CameraCommand::new();
        camera.update(self.camera_store.state());
        camera.set_viewport(self.dimension);
        info!(width, height, commands = self.compiled.len(), "rendering context initialized");
        self.lifecycle = Lifecycle::Initialized(Initialized { gpu, camera });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Initialized(_))
    }

    /// Release the GPU context. Later paints are skipped and reads fail.
    pub fn destroy(&mut self) {
        if let Lifecycle::Initialized(mut init) =
            std::mem::replace(&mut self.lifecycle, Lifecycle::Destroyed)
        {
            init.gpu.destroy();
            info!("rendering context destroyed");
        }
        self.lifecycle = Lifecycle::Destroyed;
        self.compiled.clear();
        self.pending.clear();
        self.cached_hitmap = None;
        self.scheduler.cancel();
    }

    /// Allocate a key for a new draw call.
    pub fn create_instance(&mut self) -> InstanceId {
        self.next_instance += 1;
        InstanceId(self.next_instance)
    }

    /// Make sure `command`'s program is compiled, deferring until
    /// initialization if needed.
    pub fn on_mount(&mut self, command: &dyn DrawableCommand) -> Result<(), WorldviewError> {
        let definition = command.definition();
        if self.compiled.contains_key(definition.label) {
            return Ok(());
        }
        match &mut self.lifecycle {
            Lifecycle::Uninitialized => {
                self.pending.insert(definition.label, definition);
            }
            Lifecycle::Initialized(init) => {
                let program = init.gpu.compile(&definition)?;
                self.compiled.insert(definition.label, program);
            }
            Lifecycle::Destroyed => debug!(command = definition.label, "mount after destroy ignored"),
        }
        Ok(())
    }

    pub fn register_draw_call(&mut self, input: DrawInput) {
        self.draw_calls.insert(input.instance, input);
    }

    pub fn register_hitmap_call(&mut self, input: DrawInput) {
        self.hitmap_calls.insert(input.instance, input);
    }

    /// Drop both calls registered under `instance`.
    pub fn on_unmount(&mut self, instance: InstanceId) {
        self.draw_calls.remove(&instance);
        self.hitmap_calls.remove(&instance);
    }

    pub fn register_paint_callback(
        &mut self,
        callback: impl FnMut(&PaintContext<'_>) + 'static,
    ) -> PaintCallbackId {
        self.next_callback += 1;
        let id = PaintCallbackId(self.next_callback);
        self.paint_callbacks.insert(id, Box::new(callback));
        id
    }

    pub fn unregister_paint_callback(&mut self, id: PaintCallbackId) {
        self.paint_callbacks.remove(&id);
    }

    pub fn dimension(&self) -> Dimensions {
        self.dimension
    }

    pub fn set_dimension(&mut self, dimension: Dimensions) {
        if self.dimension != dimension {
            self.dimension = dimension;
            self.cached_hitmap = None;
            self.on_dirty();
        }
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, background: Color) {
        self.background = background;
    }

    pub fn camera_store(&self) -> &CameraStore {
        &self.camera_store
    }

    pub fn camera_store_mut(&mut self) -> &mut CameraStore {
        &mut self.camera_store
    }

    pub fn gpu(&self) -> Option<&G> {
        match &self.lifecycle {
            Lifecycle::Initialized(init) => Some(&init.gpu),
            _ => None,
        }
    }

    pub fn gpu_mut(&mut self) -> Option<&mut G> {
        match &mut self.lifecycle {
            Lifecycle::Initialized(init) => Some(&mut init.gpu),
            _ => None,
        }
    }

    /// Camera matrices for the current state and viewport.
    pub fn camera_info(&mut self) -> Option<CameraInfo> {
        self.synced_camera().map(|camera| camera.info())
    }

    /// World ray under a canvas position, measured from the top-left.
    pub fn raycast(&mut self, canvas_x: f32, canvas_y: f32) -> Option<Ray> {
        let Dimensions { width, height, .. } = self.dimension;
        let camera = self.synced_camera()?;
        Some(ray_from_click(camera, canvas_x, canvas_y, width, height))
    }

    pub fn to_screen_coord(&mut self, point: glam::Vec3) -> Option<glam::Vec3> {
        let dimension = self.dimension;
        self.synced_camera()?.to_screen_coord(&dimension, point)
    }

    fn synced_camera(&mut self) -> Option<&CameraCommand> {
        let Lifecycle::Initialized(init) = &mut self.lifecycle else {
            return None;
        };
        init.camera.update(self.camera_store.state());
        init.camera.set_viewport(self.dimension);
        Some(&init.camera)
    }

    /// Flag shared with camera handlers and loader threads; a set flag is
    /// turned into a scheduled paint on the next [`tick`](Self::tick).
    pub fn dirty_flag(&self) -> DirtyFlag {
        self.dirty.clone()
    }

    /// Request a repaint shortly.
    pub fn on_dirty(&mut self) {
        self.on_dirty_at(Instant::now());
    }

    pub fn on_dirty_at(&mut self, now: Instant) {
        self.scheduler.request(now);
    }

    pub fn is_paint_pending(&self) -> bool {
        self.scheduler.is_pending() || self.dirty.is_set()
    }

    /// Time until the pending paint is due.
    pub fn next_paint_in(&self, now: Instant) -> Option<Duration> {
        self.scheduler.due().map(|due| due.saturating_duration_since(now))
    }

    /// Run the pending paint if it is due. Returns whether a paint ran.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.dirty.take() {
            self.scheduler.request(now);
        }
        if self.scheduler.take_due(now) {
            self.paint();
            return true;
        }
        false
    }

    /// Draw one frame to the canvas, then run paint callbacks.
    pub fn paint(&mut self) {
        match self.try_paint() {
            Ok(()) => {}
            Err(WorldviewError::Gpu(GpuError::ContextLost)) => {
                warn!("rendering context lost; paint skipped")
            }
            Err(err) => error!(%err, "paint failed"),
        }
    }

    fn try_paint(&mut self) -> Result<(), WorldviewError> {
        let start = Instant::now();
        let Lifecycle::Initialized(init) = &mut self.lifecycle else {
            debug!("paint skipped: rendering context not initialized");
            return Ok(());
        };
        self.cached_hitmap = None;
        self.scheduler.cancel();

        let Initialized { gpu, camera } = init;
        gpu.poll();
        gpu.begin_frame(RenderTarget::Canvas, self.background)?;
        let state = *self.camera_store.state();
        let render_start = Instant::now();
        let draws = camera.draw(&state, self.dimension, |info| {
            run_draw_calls(gpu, &self.compiled, &self.draw_calls, info, None)
        })?;
        gpu.end_frame()?;
        let render_ms = millis(render_start.elapsed());

        let paint_context = PaintContext {
            camera: &*camera,
            dimension: self.dimension,
        };
        for callback in self.paint_callbacks.values_mut() {
            callback(&paint_context);
        }

        self.counters = Counters {
            paints: self.counters.paints + 1,
            paint_ms: millis(start.elapsed()),
            render_ms,
            draws,
        };
        Ok(())
    }

    /// Objects under the canvas position `(canvas_x, canvas_y)`, measured
    /// from the top-left, front to back.
    ///
    /// Without stacked events at most one object is returned. Otherwise the
    /// read repeats with every found object excluded until nothing is hit or
    /// `max_stacked` passes have run. Results are cached until the next paint.
    pub async fn read_hitmap(
        &mut self,
        canvas_x: f32,
        canvas_y: f32,
        enable_stacked: bool,
        max_stacked: usize,
    ) -> Result<Vec<HitmapHit>, WorldviewError> {
        let Lifecycle::Initialized(init) = &mut self.lifecycle else {
            return Err(WorldviewError::NotInitialized);
        };
        let args = HitmapArgs {
            x: canvas_x,
            y: canvas_y,
            enable_stacked,
            max_stacked,
        };
        if let Some(cached) = &self.cached_hitmap {
            if cached.args == args {
                return Ok(cached.hits.clone());
            }
        }

        let Initialized { gpu, camera } = init;
        let (width, height) = floored(self.dimension);
        gpu.resize_hitmap(width, height)?;
        camera.update(self.camera_store.state());
        camera.set_viewport(self.dimension);
        let info = camera.info();

        let x = canvas_x;
        let y = self.dimension.height - canvas_y;
        let inside = x >= 0.0 && y >= 0.0 && x < width as f32 && y < height as f32;

        let mut excluded: Vec<MouseEventObject> = Vec::new();
        let mut hits: Vec<HitmapHit> = Vec::new();
        let mut passes = 0;
        loop {
            if passes >= max_stacked {
                error!(max_stacked, "stacked hitmap read stopped at the object limit");
                break;
            }
            passes += 1;

            gpu.begin_frame(RenderTarget::Hitmap, int_to_rgb(0))?;
            self.id_manager.reset();
            run_draw_calls(
                gpu,
                &self.compiled,
                &self.hitmap_calls,
                &info,
                Some((&mut self.id_manager, excluded.as_slice())),
            )?;
            gpu.end_frame()?;

            let mut current = 0;
            if inside {
                let pixel = gpu.read_pixels(x as u32, y as u32, 1, 1).await?;
                current = get_id_from_pixel(&pixel);
                let object = self.id_manager.get_object_by_id(current);
                let owner = self.id_manager.get_owner(current);
                match (object, owner) {
                    (Some(object), Some(owner)) => {
                        if excluded.contains(&object) {
                            error!(
                                id = current,
                                "object picked twice; its command does not honor excluded objects"
                            );
                            break;
                        }
                        excluded.push(object.clone());
                        hits.push((object, owner));
                    }
                    _ if current != 0 => {
                        error!(id = current, "hitmap pixel holds an id no command assigned");
                        break;
                    }
                    _ => {}
                }
            }
            if current == 0 || !enable_stacked {
                break;
            }
        }

        self.cached_hitmap = Some(CachedHitmap {
            args,
            hits: hits.clone(),
        });
        Ok(hits)
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Timing and resource counters. Fails when the backend holds more than
    /// [`MAX_BUFFER_COUNT`] buffers.
    pub fn debug_stats(&self) -> Result<DebugStats, WorldviewError> {
        let gpu = self.gpu().map(|g| g.stats()).unwrap_or_default();
        if gpu.buffer_count > MAX_BUFFER_COUNT {
            return Err(WorldviewError::ResourceLeak {
                buffers: gpu.buffer_count,
                limit: MAX_BUFFER_COUNT,
            });
        }
        Ok(DebugStats {
            counters: self.counters,
            gpu,
            draw_calls: self.draw_calls.len(),
            hitmap_calls: self.hitmap_calls.len(),
        })
    }
}

impl<G: Gpu> fmt::Debug for WorldviewContext<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldviewContext")
            .field("initialized", &self.is_initialized())
            .field("dimension", &self.dimension)
            .field("draw_calls", &self.draw_calls.len())
            .field("hitmap_calls", &self.hitmap_calls.len())
            .field("compiled", &self.compiled.len())
            .finish()
    }
}

fn floored(dimension: Dimensions) -> (u32, u32) {
    (
        dimension.width.max(0.0).floor() as u32,
        dimension.height.max(0.0).floor() as u32,
    )
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Issue `calls` in layer order. With `hitmap` set, each command's markers are
/// first converted to ID-colored hitmap markers. Returns the number of
/// backend draws.
fn run_draw_calls<G: Gpu>(
    gpu: &mut G,
    compiled: &HashMap<&'static str, G::Command>,
    calls: &BTreeMap<InstanceId, DrawInput>,
    camera: &CameraInfo,
    mut hitmap: Option<(&mut HitmapObjectIdManager, &[MouseEventObject])>,
) -> Result<usize, GpuError> {
    let mut ordered: Vec<&DrawInput> = calls.values().collect();
    ordered.sort_by_key(|call| call.layer_index.unwrap_or(0));

    let mut draws = 0;
    for call in ordered {
        let Some(markers) = call.markers.as_deref() else {
            debug!(instance = ?call.instance, "draw call without markers skipped");
            continue;
        };
        let label = call.command.definition().label;
        let Some(program) = compiled.get(label) else {
            warn!(command = label, "no compiled program for draw call; was the command mounted?");
            continue;
        };

        let mut ctx = DrawContext::new(camera, hitmap.is_some());
        match hitmap.as_mut() {
            Some((ids, excluded)) => {
                let instance = call.instance;
                let mut assign = |callback| ids.assign_next_colors(instance, callback);
                let Some(hitmap_markers) =
                    call.command.hitmap_markers(markers, &mut assign, excluded)
                else {
                    continue;
                };
                call.command.draw(&hitmap_markers, &mut ctx);
            }
            None => call.command.draw(markers, &mut ctx),
        }
        if ctx.batches().is_empty() {
            continue;
        }
        gpu.draw(program, camera, ctx.batches())?;
        draws += 1;
    }
    Ok(draws)
}
